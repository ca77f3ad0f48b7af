//! CSV export of a scored batch

use crate::types::record::Value;
use crate::types::scored::ScoredBatch;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::io::Write;

/// Columns appended after the original ones
pub const PREDICTION_COLUMNS: [&str; 3] = ["Prediction", "Fraud_Probability", "Legit_Probability"];
pub const RULE_COLUMN: &str = "Rule_Fraud";

fn cell(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_nan() => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Text(s) => s.clone(),
        Value::Missing => String::new(),
    }
}

/// Write the scored batch as CSV: original columns in upload order, then
/// the model columns and, when the overlay ran, `Rule_Fraud`.
pub fn write_csv<W: Write>(scored: &ScoredBatch, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    let with_rules = scored.has_rule_flags();

    let mut header: Vec<&str> = scored.columns.iter().map(String::as_str).collect();
    header.extend(PREDICTION_COLUMNS);
    if with_rules {
        header.push(RULE_COLUMN);
    }
    out.write_record(&header).context("Failed to write CSV header")?;

    for (i, record) in scored.records.iter().enumerate() {
        let mut row: Vec<String> = scored
            .columns
            .iter()
            .map(|column| cell(record.record.get(column)))
            .collect();
        row.push(record.model_prediction.to_string());
        row.push(record.fraud_probability.to_string());
        row.push(record.legit_probability.to_string());
        if with_rules {
            row.push(record.rule_fraud.unwrap_or(0).to_string());
        }
        out.write_record(&row)
            .with_context(|| format!("Failed to write CSV row {}", i))?;
    }

    out.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Export as an in-memory CSV payload
pub fn to_csv_bytes(scored: &ScoredBatch) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(scored, &mut buf)?;
    Ok(buf)
}

/// `predictions_YYYYMMDD_HHMMSS.csv` for the given time
pub fn file_name_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("predictions_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Export file name stamped with the current local time
pub fn default_file_name() -> String {
    file_name_at(&Local::now())
}
