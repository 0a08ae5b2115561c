// ✅ Data Quality - per-record problems that never abort a reconciliation
//
// A bad record is coerced (zero amount, no-op type, undated) and reported
// here instead of raising, so one broken row cannot take the whole ledger down.

use crate::transaction::{Source, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// RECORD PROBLEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "problem", content = "detail", rename_all = "snake_case")]
pub enum RecordProblem {
    #[error("record has no id")]
    MissingId,

    #[error("id {0} appears more than once")]
    DuplicateId(String),

    #[error("record has no date")]
    MissingDate,

    #[error("unparseable date '{0}'")]
    MalformedDate(String),

    #[error("unparseable time '{0}'")]
    MalformedTime(String),

    #[error("record has no amount, treated as 0")]
    MissingAmount,

    #[error("unparseable amount '{0}', treated as 0")]
    MalformedAmount(String),

    #[error("negative amount {0}, absolute value used")]
    NegativeAmount(Decimal),

    #[error("unknown adjustment type '{0}', entry has no balance effect")]
    UnknownAdjustmentType(String),
}

impl RecordProblem {
    pub fn severity(&self) -> Severity {
        match self {
            RecordProblem::MissingDate
            | RecordProblem::MalformedDate(_)
            | RecordProblem::MalformedAmount(_)
            | RecordProblem::UnknownAdjustmentType(_) => Severity::Critical,
            RecordProblem::MissingId
            | RecordProblem::DuplicateId(_)
            | RecordProblem::MalformedTime(_)
            | RecordProblem::MissingAmount
            | RecordProblem::NegativeAmount(_) => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Critical, // Record does not contribute to the ledger as entered
    Warning,  // Record contributes, but something was coerced
}

// ============================================================================
// QUALITY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub severity: Severity,
    pub source: Source,
    pub record_id: String,
    pub field: String,
    pub message: String,
    #[serde(flatten)]
    pub problem: RecordProblem,
}

impl QualityIssue {
    pub fn new(source: Source, record_id: &str, field: &str, problem: RecordProblem) -> Self {
        QualityIssue {
            severity: problem.severity(),
            source,
            record_id: record_id.to_string(),
            field: field.to_string(),
            message: problem.to_string(),
            problem,
        }
    }
}

/// Deterministic issue order, independent of input array order
pub fn sort_issues(issues: &mut [QualityIssue]) {
    issues.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.record_id.cmp(&b.record_id))
            .then_with(|| a.field.cmp(&b.field))
            .then_with(|| a.message.cmp(&b.message))
    });
}

/// Flag ids used by more than one normalized transaction (both are kept)
pub fn find_duplicate_ids(transactions: &[Transaction]) -> Vec<QualityIssue> {
    let mut seen: BTreeMap<&str, (Source, usize)> = BTreeMap::new();
    for tx in transactions {
        seen.entry(tx.id.as_str()).or_insert((tx.source, 0)).1 += 1;
    }

    seen.into_iter()
        .filter(|(_, (_, count))| *count > 1)
        .map(|(id, (source, _))| {
            QualityIssue::new(source, id, "id", RecordProblem::DuplicateId(id.to_string()))
        })
        .collect()
}

// ============================================================================
// QUALITY SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub total_records: usize,
    pub records_with_issues: usize,
    pub critical_count: usize,
    pub warning_count: usize,
}

impl QualitySummary {
    pub fn from_issues(total_records: usize, issues: &[QualityIssue]) -> Self {
        let records_with_issues = issues
            .iter()
            .map(|i| (i.source, i.record_id.as_str()))
            .collect::<BTreeSet<_>>()
            .len();

        QualitySummary {
            total_records,
            records_with_issues,
            critical_count: issues.iter().filter(|i| i.severity == Severity::Critical).count(),
            warning_count: issues.iter().filter(|i| i.severity == Severity::Warning).count(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.critical_count == 0 && self.warning_count == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} records, {} with issues ({} critical, {} warnings)",
            self.total_records, self.records_with_issues, self.critical_count, self.warning_count
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
