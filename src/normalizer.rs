// 🔄 Source Normalizer - three raw shapes → one Transaction
//
// Token    → Income when paid, Pending otherwise
// Expense  → Expense, particulars "<expense_type> - <paid_to|N/A>"
// Adjustment → Income for "addition", Expense for "deduction"
//
// Missing or broken fields are coerced (zero amount, no time, undated) and
// reported as QualityIssues; normalization itself never fails.

use crate::config::LedgerConfig;
use crate::data_quality::{find_duplicate_ids, QualityIssue, RecordProblem};
use crate::records::{AdjustmentRecord, ExpenseRecord, SourceRecord, TokenRecord};
use crate::transaction::{Particulars, Source, Transaction};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// One normalized record plus whatever was wrong with it
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub transaction: Transaction,
    pub issues: Vec<QualityIssue>,
}

/// All three sources, normalized
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub transactions: Vec<Transaction>,
    pub issues: Vec<QualityIssue>,
}

// ============================================================================
// SOURCE NORMALIZER TRAIT
// ============================================================================

/// Implemented by each raw shape
pub trait SourceNormalizer: SourceRecord + Serialize {
    /// `occurrence` counts earlier id-less records in the same source with
    /// exactly this content; it only tells exact copies apart
    fn normalize(&self, occurrence: usize, config: &LedgerConfig) -> NormalizedRecord;
}

/// Id for a record that arrived without one, derived from its content so it
/// does not depend on where the record sits in its array
pub fn missing_id<R: SourceRecord + Serialize>(record: &R, occurrence: usize) -> String {
    let bytes = serde_json::to_vec(record).unwrap_or_default();
    let digest: String = Sha256::digest(&bytes)
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect();

    match occurrence {
        0 => format!("{}-missing-{}", R::source().code(), digest),
        n => format!("{}-missing-{}-{}", R::source().code(), digest, n),
    }
}

/// Collects problems for one record while it is being normalized
struct Findings {
    source: Source,
    record_id: String,
    issues: Vec<QualityIssue>,
}

impl Findings {
    fn start<R: SourceRecord + Serialize>(record: &R, occurrence: usize) -> Self {
        let source = R::source();
        let (record_id, missing) = match record.raw_id() {
            Some(raw) => (format!("{}-{}", source.code(), raw), false),
            None => (missing_id(record, occurrence), true),
        };

        let mut findings = Findings {
            source,
            record_id,
            issues: Vec::new(),
        };
        if missing {
            findings.push("id", RecordProblem::MissingId);
        }
        findings
    }

    fn push(&mut self, field: &str, problem: RecordProblem) {
        warn!(source = %self.source, id = %self.record_id, field, "{}", problem);
        self.issues.push(QualityIssue::new(self.source, &self.record_id, field, problem));
    }

    fn finish(self, transaction: Transaction) -> NormalizedRecord {
        NormalizedRecord {
            transaction,
            issues: self.issues,
        }
    }
}

// ============================================================================
// FIELD PARSING
// ============================================================================

/// Parse a money amount: tolerates whitespace, thousands separators and a
/// leading currency sign
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['₹', '$'])
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parse a calendar date, picking up a time-of-day when the text carries one
pub fn parse_date(raw: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let s = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some((date, None));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        let local = dt.naive_local();
        return Some((local.date(), Some(local.time())));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some((dt.date(), Some(dt.time())));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some((date, None));
    }

    None
}

/// Parse a time-of-day: `HH:MM:SS[.fff]` or `HH:MM`
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn resolve_amount(raw: Option<&str>, findings: &mut Findings) -> Decimal {
    let Some(raw) = raw else {
        findings.push("amount", RecordProblem::MissingAmount);
        return Decimal::ZERO;
    };

    match parse_amount(raw) {
        Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
            findings.push("amount", RecordProblem::NegativeAmount(amount));
            amount.abs()
        }
        Some(amount) => amount,
        None => {
            findings.push("amount", RecordProblem::MalformedAmount(raw.to_string()));
            Decimal::ZERO
        }
    }
}

fn resolve_date(
    raw_date: Option<&str>,
    raw_time: Option<&str>,
    findings: &mut Findings,
) -> (Option<NaiveDate>, Option<NaiveTime>) {
    let (date, embedded_time) = match raw_date {
        None => {
            findings.push("date", RecordProblem::MissingDate);
            (None, None)
        }
        Some(raw) => match parse_date(raw) {
            Some((date, time)) => (Some(date), time),
            None => {
                findings.push("date", RecordProblem::MalformedDate(raw.to_string()));
                (None, None)
            }
        },
    };

    // An explicit time field wins over one embedded in the date
    let time = match raw_time {
        None => embedded_time,
        Some(raw) => match parse_time(raw) {
            Some(time) => Some(time),
            None => {
                findings.push("time", RecordProblem::MalformedTime(raw.to_string()));
                embedded_time
            }
        },
    };

    (date, time)
}

// ============================================================================
// PER-SOURCE NORMALIZERS
// ============================================================================

impl SourceNormalizer for TokenRecord {
    fn normalize(&self, occurrence: usize, _config: &LedgerConfig) -> NormalizedRecord {
        let mut findings = Findings::start(self, occurrence);
        let amount = resolve_amount(self.amount.as_deref(), &mut findings);
        let (date, time) = resolve_date(self.date.as_deref(), None, &mut findings);

        let particulars = Particulars::Token {
            test: self.test.clone().unwrap_or_default(),
            token_no: self.token_no.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
        };

        let paid = self.is_paid.unwrap_or(false);
        let id = findings.record_id.clone();
        let mut tx = if paid {
            Transaction::income(id, amount, particulars, Source::Token)
        } else {
            Transaction::pending(id, amount, particulars, Source::Token)
        };
        tx.is_paid = Some(paid);

        findings.finish(tx.on(date, time))
    }
}

impl SourceNormalizer for ExpenseRecord {
    fn normalize(&self, occurrence: usize, config: &LedgerConfig) -> NormalizedRecord {
        let mut findings = Findings::start(self, occurrence);
        let amount = resolve_amount(self.amount.as_deref(), &mut findings);
        let (date, time) = resolve_date(self.date.as_deref(), None, &mut findings);

        let particulars = Particulars::text(format!(
            "{}{}{}",
            self.expense_type.as_deref().unwrap_or(&config.fallback_category),
            config.category_separator,
            self.paid_to.as_deref().unwrap_or(&config.missing_payee),
        ));

        let id = findings.record_id.clone();
        let tx = Transaction::expense(id, amount, particulars, Source::Expense);

        findings.finish(tx.on(date, time))
    }
}

impl SourceNormalizer for AdjustmentRecord {
    fn normalize(&self, occurrence: usize, _config: &LedgerConfig) -> NormalizedRecord {
        let mut findings = Findings::start(self, occurrence);
        let amount = resolve_amount(self.amount.as_deref(), &mut findings);
        let (date, time) = resolve_date(self.date.as_deref(), self.time.as_deref(), &mut findings);

        let reason = self.reason.as_deref().unwrap_or_default();
        let mut text = if reason.is_empty() {
            "Cash Adjustment".to_string()
        } else {
            format!("Cash Adjustment: {}", reason)
        };
        if let Some(reference) = &self.reference_number {
            text.push_str(&format!(" (Ref: {})", reference));
        }
        let particulars = Particulars::text(text);

        let id = findings.record_id.clone();
        let kind = self
            .adjustment_type
            .as_deref()
            .map(|k| k.trim().to_lowercase())
            .unwrap_or_default();

        let mut tx = match kind.as_str() {
            "addition" => Transaction::income(id, amount, particulars, Source::Adjustment),
            "deduction" => Transaction::expense(id, amount, particulars, Source::Adjustment),
            _ => {
                findings.push(
                    "adjustment_type",
                    RecordProblem::UnknownAdjustmentType(kind.clone()),
                );
                Transaction::flagged(id, amount, particulars, Source::Adjustment)
            }
        };
        tx.remarks = self.remarks.clone();

        findings.finish(tx.on(date, time))
    }
}

// ============================================================================
// BATCH NORMALIZATION
// ============================================================================

fn normalize_source<R: SourceNormalizer>(
    records: &[R],
    config: &LedgerConfig,
    out: &mut Normalized,
) {
    let mut copies: HashMap<String, usize> = HashMap::new();

    for record in records {
        let occurrence = match record.raw_id() {
            Some(_) => 0,
            None => {
                let seen = copies.entry(missing_id(record, 0)).or_insert(0);
                *seen += 1;
                *seen - 1
            }
        };
        let normalized = record.normalize(occurrence, config);
        out.transactions.push(normalized.transaction);
        out.issues.extend(normalized.issues);
    }
}

/// Normalize all three sources into one transaction list
pub fn normalize_all(
    tokens: &[TokenRecord],
    expenses: &[ExpenseRecord],
    adjustments: &[AdjustmentRecord],
    config: &LedgerConfig,
) -> Normalized {
    let mut out = Normalized::default();

    normalize_source(tokens, config, &mut out);
    normalize_source(expenses, config, &mut out);
    normalize_source(adjustments, config, &mut out);

    let duplicates = find_duplicate_ids(&out.transactions);
    for issue in &duplicates {
        warn!(id = %issue.record_id, "{}", issue.message);
    }
    out.issues.extend(duplicates);

    debug!(
        tokens = tokens.len(),
        expenses = expenses.len(),
        adjustments = adjustments.len(),
        issues = out.issues.len(),
        "normalized source records"
    );

    out
}

// ============================================================================
// TESTS
// ============================================================================
