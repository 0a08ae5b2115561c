// ⚖️ Reconciliation Engine - raw records in, computed cash ledger out
//
// Pipeline (strictly forward, nothing mutated in place):
//   normalize → partition → sequence → accumulate → aggregate
//
// Pure: the same three arrays and the same `today` always yield the same
// report, byte for byte. The report re-checks its own books with `verify()`:
//   opening_balance + total_income - total_expense = closing_balance

use crate::accumulator::{accumulate, CashInfo};
use crate::analytics::{category_summary, monthly_summary, CategorySummary, MonthlySummary};
use crate::config::LedgerConfig;
use crate::data_quality::{sort_issues, QualityIssue, QualitySummary};
use crate::normalizer::normalize_all;
use crate::period::{partition, MonthWindow};
use crate::records::{AdjustmentRecord, ExpenseRecord, RecordSet, TokenRecord};
use crate::sequencer::sequence;
use crate::transaction::{LedgerEntry, TransactionType};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconciliationResult {
    /// Every invariant holds
    Balanced {
        opening_balance: Decimal,
        total_income: Decimal,
        total_expense: Decimal,
        closing_balance: Decimal,
    },

    /// At least one invariant is broken
    Discrepancy { discrepancies: Vec<Discrepancy> },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn has_discrepancy(&self) -> bool {
        !self.is_balanced()
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        match self {
            ReconciliationResult::Balanced { .. } => &[],
            ReconciliationResult::Discrepancy { discrepancies } => discrepancies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub description: String,
    pub amount: Decimal,
    pub category: DiscrepancyCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscrepancyCategory {
    ClosingBalanceMismatch,
    NetChangeMismatch,
    RunningBalanceMismatch,
    TotalsMismatch,
    PendingMismatch,
}

// ============================================================================
// LEDGER REPORT
// ============================================================================

/// Everything a ledger view needs for one reference date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReport {
    pub today: NaiveDate,
    pub period: MonthWindow,
    pub transactions: Vec<LedgerEntry>,
    pub cash_info: CashInfo,
    pub category_summary: CategorySummary,
    pub monthly_summary: MonthlySummary,
    pub quality: QualitySummary,
    pub issues: Vec<QualityIssue>,
}

impl LedgerReport {
    /// Re-derive the books from the entries and compare with `cash_info`
    pub fn verify(&self) -> ReconciliationResult {
        let info = &self.cash_info;
        let mut discrepancies = Vec::new();

        let expected_closing = info.opening_balance + info.total_income - info.total_expense;
        if expected_closing != info.closing_balance {
            discrepancies.push(Discrepancy {
                description: format!(
                    "Closing balance {} != opening {} + income {} - expense {}",
                    info.closing_balance,
                    info.opening_balance,
                    info.total_income,
                    info.total_expense
                ),
                amount: info.closing_balance - expected_closing,
                category: DiscrepancyCategory::ClosingBalanceMismatch,
            });
        }

        if info.net_change != info.total_income - info.total_expense {
            discrepancies.push(Discrepancy {
                description: format!("Net change {} != income - expense", info.net_change),
                amount: info.net_change - (info.total_income - info.total_expense),
                category: DiscrepancyCategory::NetChangeMismatch,
            });
        }

        let mut running = info.opening_balance;
        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        let mut pending = Decimal::ZERO;
        for entry in &self.transactions {
            let tx = &entry.transaction;
            running += tx.cash_effect();
            if !tx.flagged {
                match tx.kind {
                    TransactionType::Income => income += tx.credit,
                    TransactionType::Expense => expense += tx.debit,
                    TransactionType::Pending => pending += tx.debit,
                }
            }
            if entry.running_balance != running {
                discrepancies.push(Discrepancy {
                    description: format!(
                        "Entry {} carries {} but the scan gives {}",
                        tx.id, entry.running_balance, running
                    ),
                    amount: entry.running_balance - running,
                    category: DiscrepancyCategory::RunningBalanceMismatch,
                });
            }
        }

        if running != info.closing_balance {
            discrepancies.push(Discrepancy {
                description: format!(
                    "Last running balance {} != closing {}",
                    running, info.closing_balance
                ),
                amount: info.closing_balance - running,
                category: DiscrepancyCategory::RunningBalanceMismatch,
            });
        }

        if income != info.total_income || expense != info.total_expense {
            discrepancies.push(Discrepancy {
                description: format!(
                    "Entry totals income {} / expense {} differ from summary {} / {}",
                    income, expense, info.total_income, info.total_expense
                ),
                amount: (info.total_income - income) - (info.total_expense - expense),
                category: DiscrepancyCategory::TotalsMismatch,
            });
        }

        if info.total_pending != info.opening_pending + pending {
            discrepancies.push(Discrepancy {
                description: format!(
                    "Pending total {} != opening pending {} + period pending {}",
                    info.total_pending, info.opening_pending, pending
                ),
                amount: info.total_pending - (info.opening_pending + pending),
                category: DiscrepancyCategory::PendingMismatch,
            });
        }

        if discrepancies.is_empty() {
            ReconciliationResult::Balanced {
                opening_balance: info.opening_balance,
                total_income: info.total_income,
                total_expense: info.total_expense,
                closing_balance: info.closing_balance,
            }
        } else {
            ReconciliationResult::Discrepancy { discrepancies }
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.verify().is_balanced()
    }

    /// SHA-256 of the report's JSON form
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).context("Failed to serialize ledger report")?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn summary(&self) -> String {
        format!(
            "Ledger for {}: {} entries, opening {}, income {}, expense {}, closing {}, pending {}",
            self.period.label(),
            self.transactions.len(),
            self.cash_info.opening_balance,
            self.cash_info.total_income,
            self.cash_info.total_expense,
            self.cash_info.closing_balance,
            self.cash_info.total_pending,
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    pub config: LedgerConfig,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            config: LedgerConfig::default(),
        }
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        ReconciliationEngine { config }
    }

    /// Build the ledger for the calendar month containing `today`
    ///
    /// Example:
    /// ```
    /// use cash_ledger::{ReconciliationEngine, TokenRecord, ExpenseRecord};
    /// use chrono::NaiveDate;
    ///
    /// let engine = ReconciliationEngine::new();
    /// let tokens = vec![TokenRecord::new("1", "2025-03-01", "500", true)];
    /// let expenses =
    ///     vec![ExpenseRecord::new("1", "2025-03-02", "200", "Rent").with_payee("Landlord")];
    /// let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    ///
    /// let report = engine.reconcile(&tokens, &expenses, &[], today);
    /// assert_eq!(report.cash_info.closing_balance.to_string(), "300");
    /// assert!(report.is_balanced());
    /// ```
    pub fn reconcile(
        &self,
        tokens: &[TokenRecord],
        expenses: &[ExpenseRecord],
        adjustments: &[AdjustmentRecord],
        today: NaiveDate,
    ) -> LedgerReport {
        let normalized = normalize_all(tokens, expenses, adjustments, &self.config);
        let mut issues = normalized.issues;
        sort_issues(&mut issues);

        let parts = partition(normalized.transactions, today);
        let monthly = monthly_summary(parts.history());

        let ordered = sequence(parts.current);
        let ledger = accumulate(ordered, parts.opening_balance, parts.opening_pending);
        let categories = category_summary(
            ledger.entries.iter().map(|e| &e.transaction),
            &self.config,
        );

        let quality = QualitySummary::from_issues(
            tokens.len() + expenses.len() + adjustments.len(),
            &issues,
        );

        info!(
            month = %parts.window.label(),
            entries = ledger.entries.len(),
            closing = %ledger.cash_info.closing_balance,
            pending = %ledger.cash_info.total_pending,
            issues = issues.len(),
            "reconciled cash ledger"
        );

        LedgerReport {
            today,
            period: parts.window,
            transactions: ledger.entries,
            cash_info: ledger.cash_info,
            category_summary: categories,
            monthly_summary: monthly,
            quality,
            issues,
        }
    }

    pub fn reconcile_set(&self, records: &RecordSet, today: NaiveDate) -> LedgerReport {
        self.reconcile(&records.tokens, &records.expenses, &records.adjustments, today)
    }
}

/// `ReconciliationEngine::new().reconcile(..)` with default configuration
pub fn reconcile(
    tokens: &[TokenRecord],
    expenses: &[ExpenseRecord],
    adjustments: &[AdjustmentRecord],
    today: NaiveDate,
) -> LedgerReport {
    ReconciliationEngine::new().reconcile(tokens, expenses, adjustments, today)
}

// ============================================================================
// TESTS
// ============================================================================
