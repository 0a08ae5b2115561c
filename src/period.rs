// 📅 Period Partitioner - prior history vs the current calendar month
//
// Opening position is re-derived from the full prior history on every run.
// There is no carried-forward store: upstream records can be edited
// retroactively, so only a full re-scan is correct.

use crate::transaction::{Transaction, TransactionType};
use chrono::{Datelike, Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// "<Mon> <Year>" label, e.g. "Oct 2026"
pub fn month_label(year: i32, month: u32) -> String {
    let index = (month.clamp(1, 12) - 1) as usize;
    format!("{} {}", MONTH_ABBREVIATIONS[index], year)
}

// ============================================================================
// MONTH WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPosition {
    Prior,
    Current,
    Future,
}

/// First and last day of the reference date's calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthWindow {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl MonthWindow {
    pub fn containing(today: NaiveDate) -> Self {
        let first_day = today - Duration::days(i64::from(today.day0()));
        let last_day = first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);

        MonthWindow {
            first_day,
            last_day,
        }
    }

    pub fn position(&self, date: NaiveDate) -> PeriodPosition {
        if date < self.first_day {
            PeriodPosition::Prior
        } else if date <= self.last_day {
            PeriodPosition::Current
        } else {
            PeriodPosition::Future
        }
    }

    pub fn label(&self) -> String {
        month_label(self.first_day.year(), self.first_day.month())
    }
}

// ============================================================================
// PARTITION
// ============================================================================

#[derive(Debug, Clone)]
pub struct Partition {
    pub window: MonthWindow,

    /// Dated before the current month
    pub prior: Vec<Transaction>,

    /// Inside the current month; the only set that reaches the ledger
    pub current: Vec<Transaction>,

    /// Dated after the current month; analytics only
    pub future: Vec<Transaction>,

    /// Unparseable date; analytics only
    pub undated: Vec<Transaction>,

    pub opening_balance: Decimal,
    pub opening_pending: Decimal,
}

impl Partition {
    /// Full history, every set, in no particular order
    pub fn history(&self) -> impl Iterator<Item = &Transaction> {
        self.prior
            .iter()
            .chain(self.current.iter())
            .chain(self.future.iter())
            .chain(self.undated.iter())
    }
}

/// Opening balance and opening pending total over prior history
///
/// `balance = Σ credit (Income) − Σ debit (Expense)`, `pending = Σ debit (Pending)`.
/// Adjustments already carry their direction through their type.
pub fn opening_position(prior: &[Transaction]) -> (Decimal, Decimal) {
    prior
        .iter()
        .filter(|tx| !tx.flagged)
        .fold((Decimal::ZERO, Decimal::ZERO), |(balance, pending), tx| match tx.kind {
            TransactionType::Income => (balance + tx.credit, pending),
            TransactionType::Expense => (balance - tx.debit, pending),
            TransactionType::Pending => (balance, pending + tx.debit),
        })
}

/// Split normalized transactions around the reference date's month
pub fn partition(transactions: Vec<Transaction>, today: NaiveDate) -> Partition {
    let window = MonthWindow::containing(today);

    let mut prior = Vec::new();
    let mut current = Vec::new();
    let mut future = Vec::new();
    let mut undated = Vec::new();

    for tx in transactions {
        match tx.date.map(|d| window.position(d)) {
            Some(PeriodPosition::Prior) => prior.push(tx),
            Some(PeriodPosition::Current) => current.push(tx),
            Some(PeriodPosition::Future) => future.push(tx),
            None => undated.push(tx),
        }
    }

    let (opening_balance, opening_pending) = opening_position(&prior);

    debug!(
        month = %window.label(),
        prior = prior.len(),
        current = current.len(),
        future = future.len(),
        undated = undated.len(),
        %opening_balance,
        "partitioned transactions"
    );

    Partition {
        window,
        prior,
        current,
        future,
        undated,
        opening_balance,
        opening_pending,
    }
}

// ============================================================================
// TESTS
// ============================================================================
