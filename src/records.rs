// 📥 Raw Source Records - what the three upstream tables hand us
// Tokens (sales), expenses and manual cash adjustments, decoded leniently
//
// Upstream data is loosely typed: ids arrive as numbers or strings, amounts as
// numbers, numeric strings or nothing at all. Every field is kept as text here
// and interpreted later by the normalizer, so a bad field never fails a load.

use crate::transaction::Source;
use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

// ============================================================================
// TEXT FIELD DECODING
// ============================================================================

// Fields are read as text and never through a binary number, so "007" stays
// "007" and long amounts keep every digit.

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn loose_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_text(deserializer)?.map(|s| {
        matches!(
            s.to_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "paid"
        )
    }))
}

/// Rewrite one JSON row so every scalar is carried as its literal text
///
/// Needs serde_json's `arbitrary_precision`: a number's `to_string()` is then
/// the exact literal from the file.
fn scalars_as_text(row: Value) -> Value {
    match row {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .filter_map(|(key, value)| {
                    let text = match value {
                        Value::Null => return None,
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        nested => nested.to_string(),
                    };
                    Some((key, Value::String(text)))
                })
                .collect(),
        ),
        other => other,
    }
}

/// Decode a JSON array of raw records
pub fn parse_json_records<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let rows: Vec<Value> = serde_json::from_str(text).context("Records must be a JSON array")?;

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(scalars_as_text(row))
                .with_context(|| format!("Failed to decode record #{}", index))
        })
        .collect()
}

// ============================================================================
// SOURCE RECORD TRAIT
// ============================================================================

/// Provenance accessors shared by the three raw shapes
pub trait SourceRecord {
    /// Which upstream table this shape comes from
    fn source() -> Source;

    /// Raw id as delivered (not yet prefixed with the source)
    fn raw_id(&self) -> Option<&str>;

    /// Raw date text as delivered
    fn raw_date(&self) -> Option<&str>;
}

// ============================================================================
// TOKEN RECORD
// ============================================================================

/// Sales token: one test performed for a customer, paid or not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, deserialize_with = "loose_text")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub amount: Option<String>,

    #[serde(default, rename = "isPaid", deserialize_with = "loose_flag")]
    pub is_paid: Option<bool>,

    #[serde(default, deserialize_with = "loose_text")]
    pub test: Option<String>,

    #[serde(default, rename = "tokenNo", deserialize_with = "loose_text")]
    pub token_no: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub name: Option<String>,
}

impl TokenRecord {
    pub fn new(id: &str, date: &str, amount: &str, is_paid: bool) -> Self {
        TokenRecord {
            id: Some(id.to_string()),
            date: Some(date.to_string()),
            amount: Some(amount.to_string()),
            is_paid: Some(is_paid),
            ..Default::default()
        }
    }

    /// Builder pattern: attach the test / token number / customer triple
    pub fn with_descriptor(mut self, test: &str, token_no: &str, name: &str) -> Self {
        self.test = Some(test.to_string());
        self.token_no = Some(token_no.to_string());
        self.name = Some(name.to_string());
        self
    }
}

impl SourceRecord for TokenRecord {
    fn source() -> Source {
        Source::Token
    }

    fn raw_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn raw_date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

// ============================================================================
// EXPENSE RECORD
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(default, deserialize_with = "loose_text")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub amount: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub expense_type: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub paid_to: Option<String>,
}

impl ExpenseRecord {
    pub fn new(id: &str, date: &str, amount: &str, expense_type: &str) -> Self {
        ExpenseRecord {
            id: Some(id.to_string()),
            date: Some(date.to_string()),
            amount: Some(amount.to_string()),
            expense_type: Some(expense_type.to_string()),
            paid_to: None,
        }
    }

    /// Builder pattern: add payee
    pub fn with_payee(mut self, paid_to: &str) -> Self {
        self.paid_to = Some(paid_to.to_string());
        self
    }
}

impl SourceRecord for ExpenseRecord {
    fn source() -> Source {
        Source::Expense
    }

    fn raw_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn raw_date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

// ============================================================================
// ADJUSTMENT RECORD
// ============================================================================

/// Manual cash correction, `adjustment_type` is "addition" or "deduction"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    #[serde(default, deserialize_with = "loose_text")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub time: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub adjustment_type: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub amount: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub reason: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub reference_number: Option<String>,

    #[serde(default, deserialize_with = "loose_text")]
    pub remarks: Option<String>,
}

impl AdjustmentRecord {
    pub fn new(id: &str, date: &str, adjustment_type: &str, amount: &str, reason: &str) -> Self {
        AdjustmentRecord {
            id: Some(id.to_string()),
            date: Some(date.to_string()),
            adjustment_type: Some(adjustment_type.to_string()),
            amount: Some(amount.to_string()),
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }

    pub fn with_reference(mut self, reference_number: &str) -> Self {
        self.reference_number = Some(reference_number.to_string());
        self
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        self.remarks = Some(remarks.to_string());
        self
    }
}

impl SourceRecord for AdjustmentRecord {
    fn source() -> Source {
        Source::Adjustment
    }

    fn raw_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn raw_date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

// ============================================================================
// RECORD SET
// ============================================================================

/// The three raw arrays one reconciliation run consumes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub tokens: Vec<TokenRecord>,
    pub expenses: Vec<ExpenseRecord>,
    pub adjustments: Vec<AdjustmentRecord>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.tokens.len() + self.expenses.len() + self.adjustments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// FILE LOADING
// ============================================================================

/// Load raw records from a `.json` array or a headered `.csv` file
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?;
            parse_json_records(&text)
                .with_context(|| format!("Failed to parse JSON records in {}", path.display()))
        }
        "csv" => {
            let mut reader = csv::Reader::from_path(path)
                .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

            let mut records = Vec::new();
            for (line_num, result) in reader.deserialize().enumerate() {
                let record: T = result.with_context(|| {
                    format!("Failed to parse CSV line {} in {}", line_num + 2, path.display())
                })?;
                records.push(record);
            }
            Ok(records)
        }
        other => Err(anyhow::anyhow!(
            "Unsupported record file extension '{}' for {}",
            other,
            path.display()
        )),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_token_json_accepts_numbers_and_strings() {
        let json = r#"[
            {"id": 17, "date": "2025-03-02", "amount": 500, "isPaid": true,
             "test": "Gold", "tokenNo": 42, "name": "Asha"},
            {"id": "18", "date": "2025-03-02", "amount": "250.50", "isPaid": "false"},
            {"id": 19, "date": "2025-03-03", "amount": null}
        ]"#;

        let tokens: Vec<TokenRecord> = parse_json_records(json).unwrap();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].id.as_deref(), Some("17"));
        assert_eq!(tokens[0].amount.as_deref(), Some("500"));
        assert_eq!(tokens[0].is_paid, Some(true));
        assert_eq!(tokens[0].token_no.as_deref(), Some("42"));
        assert_eq!(tokens[1].amount.as_deref(), Some("250.50"));
        assert_eq!(tokens[1].is_paid, Some(false));
        assert_eq!(tokens[2].amount, None);
        assert_eq!(tokens[2].is_paid, None);
        assert_eq!(tokens[2].test, None);
    }

    #[test]
    fn test_float_amount_keeps_short_form() {
        let json = r#"[{"id": 1, "date": "2025-03-02", "amount": 0.1}]"#;
        let expenses: Vec<ExpenseRecord> = parse_json_records(json).unwrap();

        assert_eq!(expenses[0].amount.as_deref(), Some("0.1"));
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let json = r#"[{"id": 3, "date": "2025-03-02", "adjustment_type": "addition",
                        "amount": "100", "reason": "Float", "reference_number": "  "}]"#;
        let adjustments: Vec<AdjustmentRecord> = parse_json_records(json).unwrap();

        assert_eq!(adjustments[0].reference_number, None);
        assert_eq!(adjustments[0].reason.as_deref(), Some("Float"));
    }

    #[test]
    fn test_load_csv_expenses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id,date,amount,expense_type,paid_to").unwrap();
        writeln!(file, "5,2025-03-04,1200.00,Rent,Landlord").unwrap();
        writeln!(file, "6,2025-03-05,80,Tea,").unwrap();
        drop(file);

        let expenses: Vec<ExpenseRecord> = load_records(&path).unwrap();

        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].id.as_deref(), Some("5"));
        assert_eq!(expenses[0].expense_type.as_deref(), Some("Rent"));
        assert_eq!(expenses[0].paid_to.as_deref(), Some("Landlord"));
        assert_eq!(expenses[1].paid_to, None);

        println!("✅ CSV expenses loaded: {}", expenses.len());
    }

    #[test]
    fn test_load_json_adjustments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adjustments.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "date": "2025-03-04", "time": "10:30:00",
                 "adjustment_type": "deduction", "amount": 50, "reason": "Petty cash"}]"#,
        )
        .unwrap();

        let adjustments: Vec<AdjustmentRecord> = load_records(&path).unwrap();

        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].time.as_deref(), Some("10:30:00"));
        assert_eq!(adjustments[0].adjustment_type.as_deref(), Some("deduction"));
    }

    #[test]
    fn test_csv_keeps_leading_zeros_and_long_amounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id,date,amount,isPaid,test,tokenNo,name").unwrap();
        writeln!(file, "007,2025-03-02,12345678901234567.89,true,Gold,0042,Asha").unwrap();
        writeln!(file, "7,2025-03-02,10,false,Gold,42,Ravi").unwrap();
        drop(file);

        let tokens: Vec<TokenRecord> = load_records(&path).unwrap();

        assert_eq!(tokens[0].id.as_deref(), Some("007"));
        assert_eq!(tokens[1].id.as_deref(), Some("7"));
        assert_eq!(tokens[0].token_no.as_deref(), Some("0042"));
        assert_eq!(tokens[0].amount.as_deref(), Some("12345678901234567.89"));
        assert_eq!(tokens[0].is_paid, Some(true));
        assert_eq!(tokens[1].is_paid, Some(false));
    }

    #[test]
    fn test_json_numbers_keep_their_literal_text() {
        let json = r#"[{"id": 7, "date": "2025-03-02", "amount": 12345678901234567.89,
                        "isPaid": true, "tokenNo": "0042"},
                       {"id": "007", "date": "2025-03-02", "amount": 1200.00}]"#;

        let tokens: Vec<TokenRecord> = parse_json_records(json).unwrap();

        assert_eq!(tokens[0].amount.as_deref(), Some("12345678901234567.89"));
        assert_eq!(tokens[0].token_no.as_deref(), Some("0042"));
        assert_eq!(tokens[1].id.as_deref(), Some("007"));
        assert_eq!(tokens[1].amount.as_deref(), Some("1200.00"));
    }

    #[test]
    fn test_unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.xml");
        std::fs::write(&path, "<tokens/>").unwrap();

        let result: Result<Vec<TokenRecord>> = load_records(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_set_len() {
        let set = RecordSet {
            tokens: vec![TokenRecord::new("1", "2025-03-01", "100", true)],
            expenses: vec![ExpenseRecord::new("1", "2025-03-01", "40", "Tea")],
            adjustments: vec![],
        };

        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert!(RecordSet::default().is_empty());
    }
}
