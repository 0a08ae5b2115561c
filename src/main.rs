use anyhow::{bail, Context, Result};
use cash_ledger::data_quality::sort_issues;
use cash_ledger::{
    fetch_all, normalize_all, FetchRange, FileSource, LedgerConfig, LedgerReport, QualitySummary,
    RecordSet, ReconciliationEngine, Severity,
};
use chrono::{Local, NaiveDate};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage:
  cash-ledger reconcile [--data-dir DIR] [--today YYYY-MM-DD] [--config FILE] [--json]
  cash-ledger check     [--data-dir DIR] [--today YYYY-MM-DD] [--config FILE] [--json]";

/// Parsed command-line options shared by both commands
#[derive(Debug, Default)]
struct Options {
    data_dir: Option<PathBuf>,
    today: Option<NaiveDate>,
    config: Option<PathBuf>,
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("reconcile") => run_reconcile(parse_options(&args[2..])?),
        Some("check") => run_check(parse_options(&args[2..])?),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--data-dir" => {
                let value = iter.next().context("--data-dir needs a directory")?;
                options.data_dir = Some(PathBuf::from(value));
            }
            "--today" => {
                let value = iter.next().context("--today needs a date")?;
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .with_context(|| format!("Invalid --today date: {}", value))?;
                options.today = Some(date);
            }
            "--config" => {
                let value = iter.next().context("--config needs a file")?;
                options.config = Some(PathBuf::from(value));
            }
            "--json" => options.json = true,
            other => bail!("Unknown option: {}\n{}", other, USAGE),
        }
    }

    Ok(options)
}

fn load_config(options: &Options) -> Result<LedgerConfig> {
    let config = LedgerConfig::load_or_default(options.config.as_deref())?;
    Ok(match &options.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn load_records(config: &LedgerConfig) -> Result<RecordSet> {
    let source = FileSource::new(&config.data_dir);
    let range = FetchRange {
        from: config.history_start,
        to: None,
    };
    fetch_all(&source, &range)
}

/// Load config and records, then run the engine once
fn build_report(options: &Options) -> Result<LedgerReport> {
    let config = load_config(options)?;
    let records = load_records(&config)?;
    let today = options.today.unwrap_or_else(|| Local::now().date_naive());

    let engine = ReconciliationEngine::with_config(config);
    Ok(engine.reconcile_set(&records, today))
}

fn run_reconcile(options: Options) -> Result<()> {
    let report = build_report(&options)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let info = &report.cash_info;

    println!("💰 Cash Ledger - {}", report.period.label());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Opening balance:  {:>14}", info.opening_balance);
    println!("Income:           {:>14}", info.total_income);
    println!("Expense:          {:>14}", info.total_expense);
    println!("Net change:       {:>14}", info.net_change);
    println!("Closing balance:  {:>14}", info.closing_balance);
    println!("Pending:          {:>14}", info.total_pending);

    println!("\n📒 Entries ({})", report.transactions.len());
    for entry in &report.transactions {
        let tx = &entry.transaction;
        let date = tx.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<10} {:<8} {:>12} {:>12} {:>14}  {}",
            date,
            tx.kind.name(),
            tx.credit,
            tx.debit,
            entry.running_balance,
            tx.particulars
        );
    }

    if !report.category_summary.is_empty() {
        println!("\n🏷️  Top expense categories");
        for category in &report.category_summary {
            println!("  {:<24} {:>14}", category.category, category.total);
        }
    }

    if !report.monthly_summary.is_empty() {
        println!("\n📅 Monthly summary");
        for month in &report.monthly_summary {
            println!(
                "  {:<10} income {:>12}  expense {:>12}  pending {:>12}  net {:>12}",
                month.month_label, month.income, month.expense, month.pending, month.net
            );
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.quality.is_clean() {
        println!("✅ Data quality: {}", report.quality.summary());
    } else {
        println!("⚠️  Data quality: {}", report.quality.summary());
        println!("   Run `cash-ledger check` for details");
    }

    let verdict = report.verify();
    if verdict.is_balanced() {
        println!("✅ Books balance");
    } else {
        for discrepancy in verdict.discrepancies() {
            println!("❌ {}", discrepancy.description);
        }
        bail!("Ledger failed self-verification");
    }

    Ok(())
}

/// Normalization and data quality only; no ledger is built
fn run_check(options: Options) -> Result<()> {
    let config = load_config(&options)?;
    let records = load_records(&config)?;

    let mut issues =
        normalize_all(&records.tokens, &records.expenses, &records.adjustments, &config).issues;
    sort_issues(&mut issues);
    let quality = QualitySummary::from_issues(records.len(), &issues);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }

    println!("🔍 Data quality - {}", quality.summary());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if issues.is_empty() {
        println!("✅ No issues found");
        return Ok(());
    }

    for issue in &issues {
        let marker = match issue.severity {
            Severity::Critical => "❌",
            Severity::Warning => "⚠️ ",
        };
        println!(
            "{} [{}] {} {}: {}",
            marker, issue.source, issue.record_id, issue.field, issue.message
        );
    }

    Ok(())
}
