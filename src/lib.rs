// Cash Ledger - Core Library
// Exposes the reconciliation pipeline for the CLI, the API server, and tests

pub mod records;        // Raw source records + JSON/CSV loading
pub mod transaction;    // Unified transaction model
pub mod data_quality;   // Per-record problems and summary
pub mod config;         // Tunables (top-N, labels, polling)
pub mod normalizer;     // Stage 1: raw records → transactions
pub mod period;         // Stage 2: prior / current / future split
pub mod sequencer;      // Stage 3: deterministic total order
pub mod accumulator;    // Stage 4: running + pending balances
pub mod analytics;      // Stage 5: categories + monthly totals
pub mod reconciliation; // Pipeline entry point + self-verification
pub mod refresh;        // Stateful shell with generation counter

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use records::{
    AdjustmentRecord, ExpenseRecord, RecordSet, SourceRecord, TokenRecord,
    load_records,
};
pub use transaction::{LedgerEntry, Particulars, Source, Transaction, TransactionType};
pub use data_quality::{QualityIssue, QualitySummary, RecordProblem, Severity};
pub use config::LedgerConfig;
pub use normalizer::{normalize_all, Normalized, SourceNormalizer};
pub use period::{partition, MonthWindow, Partition};
pub use sequencer::sequence;
pub use accumulator::{accumulate, CashInfo, Ledger};
pub use analytics::{
    category_summary, monthly_summary, CategorySummary, CategoryTotal, MonthTotals,
    MonthlySummary,
};
pub use reconciliation::{
    reconcile, Discrepancy, DiscrepancyCategory, LedgerReport, ReconciliationEngine,
    ReconciliationResult,
};
pub use refresh::{
    fetch_all, Applied, FetchRange, FileSource, Generation, LedgerShell, LedgerSnapshot,
    RecordSource, RefreshCoordinator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
