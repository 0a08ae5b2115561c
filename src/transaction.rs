// 🧾 Unified Transaction - one shape for tokens, expenses and adjustments
//
// Values are immutable once the normalizer hands them out. The running and
// pending balances live on `LedgerEntry`, which only the accumulator builds.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SOURCE
// ============================================================================

/// Which upstream table a transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Token,
    Expense,
    Adjustment,
}

impl Source {
    /// Short code used as the id prefix
    pub fn code(&self) -> &'static str {
        match self {
            Source::Token => "token",
            Source::Expense => "expense",
            Source::Adjustment => "adjustment",
        }
    }

    /// Last-resort tie-break rank in the ledger order
    pub fn rank(&self) -> u8 {
        match self {
            Source::Token => 1,
            Source::Expense => 2,
            Source::Adjustment => 3,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Income,
    Expense,
    Pending,
}

impl TransactionType {
    /// Same-instant ordering: income first, pending last
    pub fn priority(&self) -> u8 {
        match self {
            TransactionType::Income => 1,
            TransactionType::Expense => 2,
            TransactionType::Pending => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
            TransactionType::Pending => "Pending",
        }
    }
}

// ============================================================================
// PARTICULARS
// ============================================================================

/// What the ledger line says: a token descriptor for sales, free text otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Particulars {
    Token {
        test: String,
        #[serde(rename = "tokenNo")]
        token_no: String,
        name: String,
    },
    Text {
        value: String,
    },
}

impl Particulars {
    pub fn text(value: impl Into<String>) -> Self {
        Particulars::Text {
            value: value.into(),
        }
    }

    /// Free-text form, `None` for token descriptors
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Particulars::Text { value } => Some(value),
            Particulars::Token { .. } => None,
        }
    }
}

impl fmt::Display for Particulars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Particulars::Token {
                test,
                token_no,
                name,
            } => write!(f, "{} #{} ({})", test, token_no, name),
            Particulars::Text { value } => f.write_str(value),
        }
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// Normalized ledger line
///
/// Exactly one of `debit` / `credit` is non-zero, except:
/// - `Pending`: `debit` holds the unsettled amount, `credit` is zero
/// - `flagged`: both are zero, the line is kept but moves nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,

    /// `None` when the upstream date could not be parsed
    pub date: Option<NaiveDate>,

    pub time: Option<NaiveTime>,

    #[serde(rename = "type")]
    pub kind: TransactionType,

    pub amount: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,

    pub particulars: Particulars,
    pub source: Source,
    pub is_adjustment: bool,

    /// Tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,

    /// Record could not be classified; retained with no balance effect
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flagged: bool,
}

impl Transaction {
    fn base(
        id: String,
        kind: TransactionType,
        amount: Decimal,
        particulars: Particulars,
        source: Source,
    ) -> Self {
        Transaction {
            id,
            date: None,
            time: None,
            kind,
            amount,
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            particulars,
            source,
            is_adjustment: source == Source::Adjustment,
            is_paid: None,
            remarks: None,
            flagged: false,
        }
    }

    /// Cash in: `credit = amount`
    pub fn income(id: String, amount: Decimal, particulars: Particulars, source: Source) -> Self {
        let mut tx = Self::base(id, TransactionType::Income, amount, particulars, source);
        tx.credit = amount;
        tx
    }

    /// Cash out: `debit = amount`
    pub fn expense(id: String, amount: Decimal, particulars: Particulars, source: Source) -> Self {
        let mut tx = Self::base(id, TransactionType::Expense, amount, particulars, source);
        tx.debit = amount;
        tx
    }

    /// Unsettled: `debit` carries the amount, the cash balance ignores it
    pub fn pending(id: String, amount: Decimal, particulars: Particulars, source: Source) -> Self {
        let mut tx = Self::base(id, TransactionType::Pending, amount, particulars, source);
        tx.debit = amount;
        tx
    }

    /// Retained line with no balance effect
    pub fn flagged(id: String, amount: Decimal, particulars: Particulars, source: Source) -> Self {
        let mut tx = Self::base(id, TransactionType::Expense, amount, particulars, source);
        tx.flagged = true;
        tx
    }

    /// Builder pattern: set date and optional time-of-day
    pub fn on(mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) -> Self {
        self.date = date;
        self.time = time;
        self
    }

    /// Effect on the cash balance (pending and flagged lines move nothing)
    pub fn cash_effect(&self) -> Decimal {
        if self.flagged {
            return Decimal::ZERO;
        }
        match self.kind {
            TransactionType::Income => self.credit,
            TransactionType::Expense => -self.debit,
            TransactionType::Pending => Decimal::ZERO,
        }
    }

    /// Time used for ordering: missing time sorts as midnight
    pub fn sort_time(&self) -> NaiveTime {
        self.time.unwrap_or(NaiveTime::MIN)
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }
}

// ============================================================================
// LEDGER ENTRY
// ============================================================================

/// A sequenced transaction with the balances the accumulator derived for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: Transaction,

    /// Cash balance after this line
    pub running_balance: Decimal,

    /// Unsettled amount carried by this line (pending tokens only)
    pub pending_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_constructors_respect_debit_credit_rule() {
        let income = Transaction::income(
            "token-1".into(),
            dec!(500),
            Particulars::text("x"),
            Source::Token,
        );
        assert_eq!((income.credit, income.debit), (dec!(500), dec!(0)));

        let expense = Transaction::expense(
            "expense-1".into(),
            dec!(200),
            Particulars::text("x"),
            Source::Expense,
        );
        assert_eq!((expense.credit, expense.debit), (dec!(0), dec!(200)));

        let pending = Transaction::pending(
            "token-2".into(),
            dec!(300),
            Particulars::text("x"),
            Source::Token,
        );
        assert_eq!((pending.credit, pending.debit), (dec!(0), dec!(300)));

        let flagged = Transaction::flagged(
            "adjustment-1".into(),
            dec!(70),
            Particulars::text("x"),
            Source::Adjustment,
        );
        assert_eq!((flagged.credit, flagged.debit), (dec!(0), dec!(0)));
        assert!(flagged.is_adjustment);
    }

    #[test]
    fn test_cash_effect() {
        let income = Transaction::income(
            "a".into(),
            dec!(10),
            Particulars::text("x"),
            Source::Token,
        );
        let expense = Transaction::expense(
            "b".into(),
            dec!(4),
            Particulars::text("x"),
            Source::Expense,
        );
        let pending = Transaction::pending(
            "c".into(),
            dec!(9),
            Particulars::text("x"),
            Source::Token,
        );

        assert_eq!(income.cash_effect(), dec!(10));
        assert_eq!(expense.cash_effect(), dec!(-4));
        assert_eq!(pending.cash_effect(), dec!(0));
    }

    #[test]
    fn test_particulars_serialize_as_tagged_variant() {
        let token = Particulars::Token {
            test: "Gold".into(),
            token_no: "42".into(),
            name: "Asha".into(),
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["kind"], "token");
        assert_eq!(json["tokenNo"], "42");

        let text = serde_json::to_value(Particulars::text("Rent - Landlord")).unwrap();
        assert_eq!(text["kind"], "text");
        assert_eq!(text["value"], "Rent - Landlord");
        assert_eq!(Particulars::text("Rent").as_text(), Some("Rent"));
        assert_eq!(token.as_text(), None);
    }

    #[test]
    fn test_missing_time_sorts_as_midnight() {
        let tx = Transaction::income("a".into(), dec!(1), Particulars::text("x"), Source::Token);
        assert_eq!(tx.sort_time(), NaiveTime::MIN);
    }
}
