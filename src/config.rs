// ⚙️ Ledger Configuration - labels, limits and shell cadence
//
// Every field has a default, so an empty `{}` (or no file at all) is valid.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Length cap of the category breakdown
    pub top_categories: usize,

    /// Split token between category and payee in expense particulars
    pub category_separator: String,

    /// Category for expenses with no usable label
    pub fallback_category: String,

    /// Synthetic category collecting cash-adjustment deductions
    pub adjustment_category: String,

    /// Placeholder payee in expense particulars
    pub missing_payee: String,

    /// How often the shell re-fetches and recomputes
    pub poll_interval_secs: u64,

    /// Lower bound of the fetch range (None = full history)
    pub history_start: Option<NaiveDate>,

    /// Directory holding tokens/expenses/adjustments files
    pub data_dir: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            top_categories: 5,
            category_separator: " - ".to_string(),
            fallback_category: "Other".to_string(),
            adjustment_category: "Cash Adjustments".to_string(),
            missing_payee: "N/A".to_string(),
            poll_interval_secs: 300,
            history_start: None,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl LedgerConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: LedgerConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when one is given, otherwise defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_categories == 0 {
            anyhow::bail!("top_categories must be at least 1");
        }
        if self.category_separator.is_empty() {
            anyhow::bail!("category_separator must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }

    /// Builder pattern: point at a data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();

        assert_eq!(config.top_categories, 5);
        assert_eq!(config.category_separator, " - ");
        assert_eq!(config.fallback_category, "Other");
        assert_eq!(config.adjustment_category, "Cash Adjustments");
        assert_eq!(config.poll_interval_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"top_categories": 3, "history_start": "2024-04-01"}"#).unwrap();

        let config = LedgerConfig::load(&path).unwrap();

        assert_eq!(config.top_categories, 3);
        assert_eq!(config.history_start, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(config.missing_payee, "N/A");
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = LedgerConfig {
            top_categories: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LedgerConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LedgerConfig {
            category_separator: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let result = LedgerConfig::load(Path::new("/definitely/not/here.json"));
        assert!(result.is_err());
        assert_eq!(LedgerConfig::load_or_default(None).unwrap(), LedgerConfig::default());
    }
}
