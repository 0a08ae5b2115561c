// 🔁 Refresh Shell - fetch, recompute, publish (latest request wins)
//
// The engine is pure and cannot tell a stale result from a fresh one, so the
// shell tags every refresh with a generation. A completion is published only
// if no newer refresh was started in the meantime.

use crate::config::LedgerConfig;
use crate::normalizer::parse_date;
use crate::records::{
    load_records, AdjustmentRecord, ExpenseRecord, RecordSet, SourceRecord, TokenRecord,
};
use crate::reconciliation::{LedgerReport, ReconciliationEngine};
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// FETCH RANGE
// ============================================================================

/// `[from, to]` in calendar dates, either side open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FetchRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// Records with a missing or unparseable date always pass, so the
    /// monthly summary can still account for them
    pub fn admits<R: SourceRecord>(&self, record: &R) -> bool {
        match record.raw_date().and_then(parse_date) {
            Some((date, _)) => self.contains(date),
            None => true,
        }
    }
}

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// Where the three raw arrays come from
pub trait RecordSource: Send + Sync {
    fn fetch_tokens(&self, range: &FetchRange) -> Result<Vec<TokenRecord>>;
    fn fetch_expenses(&self, range: &FetchRange) -> Result<Vec<ExpenseRecord>>;
    fn fetch_adjustments(&self, range: &FetchRange) -> Result<Vec<AdjustmentRecord>>;
}

/// Reads `tokens`, `expenses` and `adjustments` (`.json` or `.csv`) from a directory
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn locate(&self, stem: &str) -> Option<PathBuf> {
        ["json", "csv"]
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", stem, ext)))
            .find(|path| path.exists())
    }

    fn load<R>(&self, stem: &str, range: &FetchRange) -> Result<Vec<R>>
    where
        R: DeserializeOwned + SourceRecord,
    {
        let Some(path) = self.locate(stem) else {
            warn!(dir = %self.dir.display(), stem, "no record file found, treating as empty");
            return Ok(Vec::new());
        };

        let records: Vec<R> = load_records(&path)?;
        let total = records.len();
        let kept: Vec<R> = records.into_iter().filter(|r| range.admits(r)).collect();
        debug!(file = %path.display(), total, kept = kept.len(), "loaded records");
        Ok(kept)
    }
}

impl RecordSource for FileSource {
    fn fetch_tokens(&self, range: &FetchRange) -> Result<Vec<TokenRecord>> {
        self.load("tokens", range)
    }

    fn fetch_expenses(&self, range: &FetchRange) -> Result<Vec<ExpenseRecord>> {
        self.load("expenses", range)
    }

    fn fetch_adjustments(&self, range: &FetchRange) -> Result<Vec<AdjustmentRecord>> {
        self.load("adjustments", range)
    }
}

/// Fetch the three sets concurrently
pub fn fetch_all(source: &dyn RecordSource, range: &FetchRange) -> Result<RecordSet> {
    std::thread::scope(|scope| {
        let tokens = scope.spawn(|| source.fetch_tokens(range));
        let expenses = scope.spawn(|| source.fetch_expenses(range));
        let adjustments = source.fetch_adjustments(range);

        let tokens = tokens.join().map_err(|_| anyhow!("token fetch panicked"))??;
        let expenses = expenses.join().map_err(|_| anyhow!("expense fetch panicked"))??;

        Ok(RecordSet {
            tokens,
            expenses,
            adjustments: adjustments?,
        })
    })
}

// ============================================================================
// GENERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

/// A published computation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub generation: Generation,
    pub computed_at: DateTime<Utc>,
    pub fingerprint: String,
    pub report: LedgerReport,
}

#[derive(Debug, Clone)]
pub enum Applied {
    /// New snapshot is now current
    Published(Arc<LedgerSnapshot>),
    /// Same report as the current snapshot; nothing replaced
    Unchanged,
    /// A newer refresh was started before this one finished; result dropped
    Stale,
}

impl Applied {
    pub fn is_published(&self) -> bool {
        matches!(self, Applied::Published(_))
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    issued: u64,
    /// Generations whose refresh failed before producing a report
    abandoned: BTreeSet<u64>,
    current: Option<Arc<LedgerSnapshot>>,
}

impl CoordinatorState {
    /// Newest generation that may still deliver a report
    fn newest_live(&self) -> u64 {
        let mut generation = self.issued;
        while generation > 0 && self.abandoned.contains(&generation) {
            generation -= 1;
        }
        generation
    }
}

/// Hands out generations and keeps the newest completed snapshot
///
/// Issuing, abandoning and publishing all happen under one lock, so a
/// generation started before a completion takes the lock always wins.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: RwLock<CoordinatorState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh; every later `begin` makes this one stale
    pub fn begin(&self) -> Generation {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.issued += 1;
        Generation(state.issued)
    }

    pub fn latest_issued(&self) -> Generation {
        Generation(self.state.read().unwrap_or_else(PoisonError::into_inner).issued)
    }

    /// Give up a generation that will never complete
    ///
    /// Older refreshes still in flight are judged against the newest
    /// generation that has not been abandoned. A result already dropped as
    /// stale stays dropped.
    pub fn abandon(&self, generation: Generation) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.abandoned.insert(generation.0);
        debug!(?generation, "refresh abandoned");
    }

    pub fn complete(&self, generation: Generation, report: LedgerReport) -> Result<Applied> {
        let fingerprint = match report.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                self.abandon(generation);
                return Err(e);
            }
        };
        Ok(self.publish(generation, fingerprint, report))
    }

    fn publish(
        &self,
        generation: Generation,
        fingerprint: String,
        report: LedgerReport,
    ) -> Applied {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let newest = state.newest_live();
        if generation.0 != newest {
            debug!(?generation, newest, "dropping stale refresh");
            return Applied::Stale;
        }

        if let Some(existing) = state.current.as_ref() {
            if existing.generation > generation {
                return Applied::Stale;
            }
            if existing.fingerprint == fingerprint {
                debug!(?generation, "ledger unchanged");
                return Applied::Unchanged;
            }
        }

        let snapshot = Arc::new(LedgerSnapshot {
            generation,
            computed_at: Utc::now(),
            fingerprint,
            report,
        });
        state.current = Some(Arc::clone(&snapshot));
        state.abandoned.retain(|g| *g > generation.0);
        info!(?generation, "published ledger snapshot");
        Applied::Published(snapshot)
    }

    pub fn current(&self) -> Option<Arc<LedgerSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }
}

// ============================================================================
// LEDGER SHELL
// ============================================================================

/// Thin stateful wrapper around the pure engine
pub struct LedgerShell {
    source: Box<dyn RecordSource>,
    engine: ReconciliationEngine,
    coordinator: RefreshCoordinator,
}

impl LedgerShell {
    pub fn new(source: impl RecordSource + 'static, config: LedgerConfig) -> Self {
        LedgerShell {
            source: Box::new(source),
            engine: ReconciliationEngine::with_config(config),
            coordinator: RefreshCoordinator::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.engine.config
    }

    pub fn fetch_range(&self) -> FetchRange {
        FetchRange {
            from: self.engine.config.history_start,
            to: None,
        }
    }

    /// Fetch everything, recompute, publish unless superseded
    ///
    /// A failed fetch leaves the current snapshot in place and abandons its
    /// generation, so an older refresh still in flight can publish.
    pub fn refresh(&self, today: NaiveDate) -> Result<Applied> {
        let generation = self.coordinator.begin();
        let records = match fetch_all(self.source.as_ref(), &self.fetch_range()) {
            Ok(records) => records,
            Err(e) => {
                self.coordinator.abandon(generation);
                warn!(?generation, "fetch failed: {:#}", e);
                return Err(e);
            }
        };
        let report = self.engine.reconcile_set(&records, today);
        self.coordinator.complete(generation, report)
    }

    pub fn current(&self) -> Option<Arc<LedgerSnapshot>> {
        self.coordinator.current()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    /// In-memory source whose contents the test can swap
    struct MemorySource {
        records: Mutex<RecordSet>,
        fail: AtomicBool,
    }

    impl MemorySource {
        fn new(records: RecordSet) -> Self {
            MemorySource {
                records: Mutex::new(records),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl RecordSource for Arc<MemorySource> {
        fn fetch_tokens(&self, _range: &FetchRange) -> Result<Vec<TokenRecord>> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("network down");
            }
            Ok(self.records.lock().unwrap().tokens.clone())
        }

        fn fetch_expenses(&self, _range: &FetchRange) -> Result<Vec<ExpenseRecord>> {
            Ok(self.records.lock().unwrap().expenses.clone())
        }

        fn fetch_adjustments(&self, _range: &FetchRange) -> Result<Vec<AdjustmentRecord>> {
            Ok(self.records.lock().unwrap().adjustments.clone())
        }
    }

    fn report_for(tokens: Vec<TokenRecord>) -> LedgerReport {
        ReconciliationEngine::new().reconcile(&tokens, &[], &[], today())
    }

    #[test]
    fn test_latest_generation_wins() {
        let coordinator = RefreshCoordinator::new();

        let older = coordinator.begin();
        let newer = coordinator.begin();

        let newer_report = report_for(vec![TokenRecord::new("2", "2025-03-02", "20", true)]);
        let older_report = report_for(vec![TokenRecord::new("1", "2025-03-02", "10", true)]);

        assert!(coordinator.complete(newer, newer_report).unwrap().is_published());
        assert!(matches!(coordinator.complete(older, older_report).unwrap(), Applied::Stale));

        let current = coordinator.current().unwrap();
        assert_eq!(current.generation, newer);
        assert_eq!(current.report.cash_info.closing_balance, dec!(20));
    }

    #[test]
    fn test_older_completion_is_dropped_even_before_newer_finishes() {
        let coordinator = RefreshCoordinator::new();

        let older = coordinator.begin();
        let _newer = coordinator.begin();

        let applied = coordinator.complete(older, report_for(vec![])).unwrap();

        assert!(matches!(applied, Applied::Stale));
        assert!(coordinator.current().is_none());
    }

    #[test]
    fn test_unchanged_report_is_not_republished() {
        let coordinator = RefreshCoordinator::new();

        let first = coordinator.begin();
        assert!(coordinator.complete(first, report_for(vec![])).unwrap().is_published());

        let second = coordinator.begin();
        assert!(matches!(
            coordinator.complete(second, report_for(vec![])).unwrap(),
            Applied::Unchanged
        ));
        assert_eq!(coordinator.current().unwrap().generation, first);
    }

    #[test]
    fn test_shell_refresh_publishes_and_tracks_source_edits() {
        let source = Arc::new(MemorySource::new(RecordSet {
            tokens: vec![TokenRecord::new("1", "2025-03-02", "500", true)],
            expenses: vec![ExpenseRecord::new("1", "2025-03-03", "200", "Rent")],
            adjustments: vec![],
        }));
        let shell = LedgerShell::new(Arc::clone(&source), LedgerConfig::default());

        assert!(shell.refresh(today()).unwrap().is_published());
        assert_eq!(shell.current().unwrap().report.cash_info.closing_balance, dec!(300));

        // Retroactive edit in a prior month changes the opening balance
        source
            .records
            .lock()
            .unwrap()
            .tokens
            .push(TokenRecord::new("0", "2025-01-05", "1000", true));

        assert!(shell.refresh(today()).unwrap().is_published());
        let snapshot = shell.current().unwrap();
        assert_eq!(snapshot.report.cash_info.opening_balance, dec!(1000));
        assert_eq!(snapshot.report.cash_info.closing_balance, dec!(1300));
        assert_eq!(snapshot.generation, Generation(2));
    }

    #[test]
    fn test_failed_fetch_keeps_previous_snapshot() {
        let source = Arc::new(MemorySource::new(RecordSet {
            tokens: vec![TokenRecord::new("1", "2025-03-02", "500", true)],
            ..Default::default()
        }));
        let shell = LedgerShell::new(Arc::clone(&source), LedgerConfig::default());
        assert!(shell.refresh(today()).unwrap().is_published());

        source.fail.store(true, Ordering::SeqCst);

        assert!(shell.refresh(today()).is_err());
        let snapshot = shell.current().unwrap();
        assert_eq!(snapshot.generation, Generation(1));
        assert_eq!(snapshot.report.cash_info.closing_balance, dec!(500));
    }

    #[test]
    fn test_newer_failed_refresh_does_not_discard_older_result() {
        let source = Arc::new(MemorySource::new(RecordSet::default()));
        let shell = LedgerShell::new(Arc::clone(&source), LedgerConfig::default());

        // Older refresh still computing when a newer one starts and fails
        let older = shell.coordinator().begin();
        let older_report = report_for(vec![TokenRecord::new("1", "2025-03-02", "500", true)]);

        source.fail.store(true, Ordering::SeqCst);
        assert!(shell.refresh(today()).is_err());
        assert_eq!(shell.coordinator().latest_issued(), Generation(2));

        let applied = shell.coordinator().complete(older, older_report).unwrap();

        assert!(applied.is_published());
        assert_eq!(shell.current().unwrap().generation, older);
        println!("✅ Older result survived a failed newer refresh");
    }

    #[test]
    fn test_result_dropped_before_newer_failure_stays_dropped() {
        let coordinator = RefreshCoordinator::new();

        let older = coordinator.begin();
        let newer = coordinator.begin();

        let applied = coordinator.complete(older, report_for(vec![])).unwrap();
        coordinator.abandon(newer);

        assert!(matches!(applied, Applied::Stale));
        assert!(coordinator.current().is_none());
        println!("✅ Dropped result not revived by a later failure");
    }

    #[test]
    fn test_begin_during_completion_makes_it_stale() {
        let coordinator = RefreshCoordinator::new();

        let older = coordinator.begin();
        let report = report_for(vec![TokenRecord::new("1", "2025-03-02", "10", true)]);
        let fingerprint = report.fingerprint().unwrap();

        // A newer refresh starts after fingerprinting but before publication
        let newer = coordinator.begin();

        assert!(matches!(coordinator.publish(older, fingerprint, report), Applied::Stale));
        assert!(coordinator.current().is_none());
        assert_eq!(coordinator.latest_issued(), newer);
        println!("✅ Completion racing a new begin is stale");
    }

    #[test]
    fn test_file_source_reads_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tokens.json"),
            r#"[{"id": 1, "date": "2025-03-02", "amount": 500, "isPaid": true},
                {"id": 2, "date": "2024-01-02", "amount": 70, "isPaid": true},
                {"id": 3, "date": "someday", "amount": 5, "isPaid": true}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("expenses.csv"),
            "id,date,amount,expense_type,paid_to\n1,2025-03-03,200,Rent,Landlord\n",
        )
        .unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(source.dir(), dir.path());
        let range = FetchRange {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: None,
        };

        let records = fetch_all(&source, &range).unwrap();

        let ids: Vec<&str> = records.tokens.iter().filter_map(|t| t.id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(records.expenses.len(), 1);
        assert!(records.adjustments.is_empty());
    }

    #[test]
    fn test_fetch_range_contains() {
        let range = FetchRange {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: NaiveDate::from_ymd_opt(2025, 1, 31),
        };

        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
        assert!(FetchRange::default().contains(NaiveDate::MIN));
    }
}
