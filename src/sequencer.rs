// 🔢 Ledger Sequencer - deterministic total order for the current month
//
// Keys, in priority order:
//   1. date ascending
//   2. time ascending (no time = 00:00:00)
//   3. type priority: Income, Expense, Pending
//   4. digits of the id, compared numerically
// then source rank, full id and amount so distinct records never tie.

use crate::transaction::Transaction;
use std::cmp::Ordering;

/// Digits of an id with leading zeros stripped ("token-007" → "7")
fn id_digits(id: &str) -> String {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').to_string()
}

/// Numeric comparison of digit strings of any length
fn compare_id_numbers(a: &str, b: &str) -> Ordering {
    let a = id_digits(a);
    let b = id_digits(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(&b))
}

/// Ledger order between two transactions
pub fn compare(a: &Transaction, b: &Transaction) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.sort_time().cmp(&b.sort_time()))
        .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
        .then_with(|| compare_id_numbers(&a.id, &b.id))
        .then_with(|| a.source.rank().cmp(&b.source.rank()))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.amount.cmp(&b.amount))
}

/// Put transactions into ledger order
pub fn sequence(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by(compare);
    transactions
}
