//! Raw tabular input: cell values, records and batches

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cell spellings treated as missing when reading delimited text
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

/// A single raw cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

/// Largest magnitude below which every integral f64 is exact
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

static MISSING: Value = Value::Missing;

impl Value {
    /// Interpret a delimited-text cell
    pub fn from_cell(cell: &str) -> Self {
        if MISSING_MARKERS.contains(&cell) {
            Value::Missing
        } else {
            Value::Text(cell.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Text form used for categorical lookup.
    ///
    /// Missing cells become `"nan"`. Integral numbers render without a
    /// fractional part (`14`), as spreadsheet integer columns do; other
    /// numbers use their shortest round-trip form (`0.25`).
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) if n.is_nan() => "nan".to_string(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                format!("{}", *n as i64)
            }
            Value::Number(n) => format!("{:?}", n),
            Value::Missing => "nan".to_string(),
        }
    }

    /// Numeric coercion; `None` for missing or unparseable cells
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            Value::Missing => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

/// One row of input data, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of a column, `Missing` when the column is absent
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&MISSING)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// An ordered batch of records sharing one column set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Column names in upload order
    pub columns: Vec<String>,
    /// Records in upload order
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build a batch from records, collecting columns in first-seen order.
    ///
    /// Within a record the map has no order, so new columns of one record
    /// are appended sorted by name.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            let mut fresh: Vec<&str> = record
                .columns()
                .filter(|c| !columns.iter().any(|known| known.as_str() == *c))
                .collect();
            fresh.sort_unstable();
            columns.extend(fresh.into_iter().map(str::to_string));
        }
        Self { columns, records }
    }

    /// Build a batch from positional rows aligned with `columns`
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| {
                let mut record = Record::new();
                for (column, value) in columns.iter().zip(row) {
                    record.insert(column.clone(), value);
                }
                record
            })
            .collect();
        Self { columns, records }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Values of one column, in record order
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().map(move |r| r.get(column))
    }
}
