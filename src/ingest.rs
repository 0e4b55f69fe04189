//! Row ingestion for ride exports.
//!
//! Uploads arrive either as CSV or as a JSON array of objects. Both are
//! loaded into a [`RowBatch`]: one header list shared by every row, and
//! loosely-typed cell values that the field extractor interprets later.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

/// A single loosely-typed cell from an uploaded row.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY: RawValue = RawValue::Empty;

impl RawValue {
    /// Builds a value from CSV text, mapping blank cells to [`RawValue::Empty`].
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    /// Textual form of the value. Whole numbers render without a fraction so
    /// spreadsheet serials and hour columns read the same as their CSV form.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Empty => None,
            RawValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(Cow::Owned(format!("{}", *n as i64)))
            }
            RawValue::Number(n) => Some(Cow::Owned(n.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Empty => None,
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Empty,
            Value::Bool(true) => RawValue::Text("yes".to_string()),
            Value::Bool(false) => RawValue::Text("no".to_string()),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
            Value::String(s) => RawValue::from_text(s),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// One uploaded batch of ride rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RowBatch {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `column` for `row`, or [`RawValue::Empty`] for ragged rows.
    pub fn cell<'a>(row: &'a [RawValue], column: usize) -> &'a RawValue {
        row.get(column).unwrap_or(&EMPTY)
    }
}

/// Parses a CSV export. Short rows are accepted and padded on access.
pub fn parse_csv(bytes: &[u8]) -> Result<RowBatch> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()
        .context("CSV export has no header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV record {}", line + 1))?;
        rows.push(record.iter().map(RawValue::from_text).collect());
    }

    debug!(columns = headers.len(), rows = rows.len(), "Parsed CSV rows");
    Ok(RowBatch::new(headers, rows))
}

/// Parses a JSON array of row objects. Headers are the union of keys in
/// first-seen order.
pub fn parse_json(bytes: &[u8]) -> Result<RowBatch> {
    let objects: Vec<serde_json::Map<String, Value>> =
        serde_json::from_slice(bytes).context("JSON export must be an array of objects")?;

    let mut headers: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for obj in &objects {
        for key in obj.keys() {
            if !index.contains_key(key) {
                index.insert(key.clone(), headers.len());
                headers.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|obj| {
            let mut row = vec![RawValue::Empty; headers.len()];
            for (key, value) in obj {
                if let Some(&i) = index.get(key) {
                    row[i] = RawValue::from(value);
                }
            }
            row
        })
        .collect::<Vec<_>>();

    debug!(columns = headers.len(), rows = rows.len(), "Parsed JSON rows");
    Ok(RowBatch::new(headers, rows))
}

/// Picks the parser from the source name, falling back to sniffing the
/// first non-whitespace byte.
pub fn parse_rows(bytes: &[u8], source: &str) -> Result<RowBatch> {
    let lower = source.to_ascii_lowercase();
    let looks_json = lower.ends_with(".json")
        || bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'[');

    if looks_json {
        parse_json(bytes)
    } else {
        parse_csv(bytes)
    }
}
