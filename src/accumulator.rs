// 💰 Balance Accumulator - one left-to-right scan over the sequenced month
//
//   Income:  running += credit
//   Expense: running -= debit
//   Pending: running unchanged, tracked separately
//
// Each entry carries the balance *after* its own effect. Never fails: flagged
// lines are kept in sequence and move nothing.

use crate::transaction::{LedgerEntry, Transaction, TransactionType};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

// ============================================================================
// CASH INFO
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashInfo {
    pub opening_balance: Decimal,
    pub opening_pending: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub total_pending: Decimal,
    pub net_change: Decimal,
    pub closing_balance: Decimal,
}

impl CashInfo {
    /// `closing == opening + income − expense`
    pub fn is_conserved(&self) -> bool {
        self.closing_balance == self.opening_balance + self.total_income - self.total_expense
            && self.net_change == self.total_income - self.total_expense
    }
}

/// Output of one accumulation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub entries: Vec<LedgerEntry>,
    pub cash_info: CashInfo,
}

/// Walk already-sequenced transactions once, seeded with the opening position
pub fn accumulate(
    ordered: Vec<Transaction>,
    opening_balance: Decimal,
    opening_pending: Decimal,
) -> Ledger {
    let mut running_balance = opening_balance;
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    let mut period_pending = Decimal::ZERO;

    let mut entries = Vec::with_capacity(ordered.len());

    for transaction in ordered {
        let mut pending_balance = Decimal::ZERO;

        if transaction.flagged {
            warn!(id = %transaction.id, "flagged entry kept with no balance effect");
        } else {
            match transaction.kind {
                TransactionType::Income => {
                    running_balance += transaction.credit;
                    total_income += transaction.credit;
                }
                TransactionType::Expense => {
                    running_balance -= transaction.debit;
                    total_expense += transaction.debit;
                }
                TransactionType::Pending => {
                    pending_balance = transaction.debit;
                    period_pending += transaction.debit;
                }
            }
        }

        entries.push(LedgerEntry {
            transaction,
            running_balance,
            pending_balance,
        });
    }

    let net_change = total_income - total_expense;

    Ledger {
        entries,
        cash_info: CashInfo {
            opening_balance,
            opening_pending,
            total_income,
            total_expense,
            total_pending: opening_pending + period_pending,
            net_change,
            closing_balance: opening_balance + net_change,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Particulars, Source};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 3, d)
    }

    fn income(id: &str, d: u32, amount: Decimal) -> Transaction {
        Transaction::income(id.into(), amount, Particulars::text("sale"), Source::Token)
            .on(day(d), None)
    }

    fn expense(id: &str, d: u32, amount: Decimal) -> Transaction {
        Transaction::expense(id.into(), amount, Particulars::text("Rent - X"), Source::Expense)
            .on(day(d), None)
    }

    fn pending(id: &str, d: u32, amount: Decimal) -> Transaction {
        Transaction::pending(id.into(), amount, Particulars::text("sale"), Source::Token)
            .on(day(d), None)
    }

    fn balances(ledger: &Ledger) -> Vec<Decimal> {
        ledger.entries.iter().map(|e| e.running_balance).collect()
    }

    #[test]
    fn test_income_then_expense_running_balance() {
        let ledger = accumulate(
            vec![income("token-1", 1, dec!(500)), expense("expense-1", 2, dec!(200))],
            dec!(1000),
            dec!(0),
        );

        assert_eq!(balances(&ledger), vec![dec!(1500), dec!(1300)]);
        assert_eq!(ledger.cash_info.total_income, dec!(500));
        assert_eq!(ledger.cash_info.total_expense, dec!(200));
        assert_eq!(ledger.cash_info.net_change, dec!(300));
        assert_eq!(ledger.cash_info.closing_balance, dec!(1300));
        assert!(ledger.cash_info.is_conserved());

        println!("✅ Running balances: {:?}", balances(&ledger));
    }

    #[test]
    fn test_pending_moves_nothing_but_pending_total() {
        let ledger = accumulate(
            vec![income("token-1", 1, dec!(100)), pending("token-2", 2, dec!(300))],
            dec!(1000),
            dec!(50),
        );

        assert_eq!(balances(&ledger), vec![dec!(1100), dec!(1100)]);
        assert_eq!(ledger.entries[1].pending_balance, dec!(300));
        assert_eq!(ledger.entries[0].pending_balance, dec!(0));
        assert_eq!(ledger.cash_info.total_pending, dec!(350));
        assert_eq!(ledger.cash_info.closing_balance, dec!(1100));
    }

    #[test]
    fn test_flagged_entry_is_kept_as_no_op() {
        let flagged = Transaction::flagged(
            "adjustment-1".into(),
            dec!(70),
            Particulars::text("Cash Adjustment"),
            Source::Adjustment,
        )
        .on(day(2), None);

        let ledger = accumulate(vec![income("token-1", 1, dec!(100)), flagged], dec!(0), dec!(0));

        assert_eq!(ledger.entries.len(), 2);
        assert_eq!(balances(&ledger), vec![dec!(100), dec!(100)]);
        assert_eq!(ledger.cash_info.total_expense, dec!(0));
        assert_eq!(ledger.cash_info.closing_balance, dec!(100));
    }

    #[test]
    fn test_empty_month_is_zeroed_around_opening() {
        let ledger = accumulate(vec![], dec!(0), dec!(0));

        assert!(ledger.entries.is_empty());
        assert_eq!(ledger.cash_info, CashInfo::default());

        let carried = accumulate(vec![], dec!(420), dec!(30));
        assert_eq!(carried.cash_info.closing_balance, dec!(420));
        assert_eq!(carried.cash_info.total_pending, dec!(30));
    }

    #[test]
    fn test_decimal_accumulation_has_no_drift() {
        let many: Vec<Transaction> = (0..1000)
            .map(|i| income(&format!("token-{}", i), 1, dec!(0.1)))
            .collect();

        let ledger = accumulate(many, dec!(0), dec!(0));

        assert_eq!(ledger.cash_info.closing_balance, dec!(100.0));
    }

    #[test]
    fn test_balance_can_go_negative() {
        let ledger = accumulate(vec![expense("expense-1", 1, dec!(75))], dec!(50), dec!(0));

        assert_eq!(balances(&ledger), vec![dec!(-25)]);
        assert!(ledger.cash_info.is_conserved());
    }
}
