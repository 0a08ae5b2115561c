// 📊 Analytics Aggregator - top expense categories and month-by-month totals

use crate::config::LedgerConfig;
use crate::period::month_label;
use crate::transaction::{Transaction, TransactionType};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const UNDATED_LABEL: &str = "Undated";

// ============================================================================
// CATEGORY SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Descending by total, at most `top_categories` long
pub type CategorySummary = Vec<CategoryTotal>;

/// Label an expense line by the part of its particulars before the separator
pub fn category_of(tx: &Transaction, config: &LedgerConfig) -> String {
    let label = tx
        .particulars
        .as_text()
        .and_then(|text| text.split(config.category_separator.as_str()).next())
        .map(str::trim)
        .unwrap_or_default();

    if label.is_empty() {
        config.fallback_category.clone()
    } else {
        label.to_string()
    }
}

/// Break current-month expenses down by category
///
/// Adjustment deductions are pooled into one synthetic category that
/// competes for the same top-N slots as ordinary expense categories.
pub fn category_summary<'a, I>(current: I, config: &LedgerConfig) -> CategorySummary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut totals: HashMap<String, Decimal> = HashMap::new();
    let mut adjustments: Option<Decimal> = None;

    for tx in current {
        if !tx.is_expense() || tx.flagged {
            continue;
        }
        if tx.is_adjustment {
            *adjustments.get_or_insert(Decimal::ZERO) += tx.debit;
        } else {
            *totals.entry(category_of(tx, config)).or_insert(Decimal::ZERO) += tx.debit;
        }
    }

    if let Some(total) = adjustments {
        *totals
            .entry(config.adjustment_category.clone())
            .or_insert(Decimal::ZERO) += total;
    }

    let mut summary: CategorySummary = totals
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    summary.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    summary.truncate(config.top_categories);
    summary
}

// ============================================================================
// MONTHLY SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthTotals {
    pub month_label: String,

    /// `None` for the undated bucket
    #[serde(skip)]
    pub month: Option<YearMonth>,

    pub income: Decimal,
    pub expense: Decimal,
    pub pending: Decimal,
    pub net: Decimal,
}

impl MonthTotals {
    fn empty(month: Option<YearMonth>) -> Self {
        let month_label = match month {
            Some(ym) => month_label(ym.year, ym.month),
            None => UNDATED_LABEL.to_string(),
        };
        MonthTotals {
            month_label,
            month,
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
            pending: Decimal::ZERO,
            net: Decimal::ZERO,
        }
    }

    fn add(&mut self, tx: &Transaction) {
        if tx.flagged {
            return;
        }
        match tx.kind {
            TransactionType::Income => self.income += tx.credit,
            TransactionType::Expense => self.expense += tx.debit,
            TransactionType::Pending => self.pending += tx.debit,
        }
        self.net = self.income - self.expense;
    }
}

/// Most recent month first; the undated bucket, if any, comes last
pub type MonthlySummary = Vec<MonthTotals>;

/// Bucket the full history (not just the current month) by calendar month
pub fn monthly_summary<'a, I>(history: I) -> MonthlySummary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut months: BTreeMap<YearMonth, MonthTotals> = BTreeMap::new();
    let mut undated: Option<MonthTotals> = None;

    for tx in history {
        match tx.date {
            Some(date) => {
                let key = YearMonth {
                    year: date.year(),
                    month: date.month(),
                };
                months
                    .entry(key)
                    .or_insert_with(|| MonthTotals::empty(Some(key)))
                    .add(tx);
            }
            None => undated.get_or_insert_with(|| MonthTotals::empty(None)).add(tx),
        }
    }

    let mut summary: MonthlySummary = months.into_values().rev().collect();
    summary.extend(undated);
    summary
}

// ============================================================================
// TESTS
// ============================================================================
