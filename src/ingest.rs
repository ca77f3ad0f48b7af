//! Batch ingestion from CSV and spreadsheet uploads

use crate::error::{PipelineError, Result};
use crate::types::record::{Batch, Value};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

fn unreadable(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::UnreadableInput(e.to_string())
}

/// Read an uploaded file, dispatching on its extension
pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Batch> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let batch = match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).map_err(unreadable)?;
            read_csv(file)?
        }
        "xlsx" | "xls" => read_spreadsheet(path)?,
        other => {
            return Err(PipelineError::UnreadableInput(format!(
                "unsupported file type '{}'",
                other
            )))
        }
    };

    debug!(
        path = %path.display(),
        rows = batch.len(),
        columns = batch.columns.len(),
        "File ingested"
    );
    non_empty(batch)
}

/// Parse a CSV payload
pub fn read_csv_bytes(bytes: &[u8]) -> Result<Batch> {
    non_empty(read_csv(bytes)?)
}

/// Zip container signature (xlsx)
const XLSX_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE compound document signature (xls)
const XLS_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Upload formats recognised from payload contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Spreadsheet,
}

impl UploadFormat {
    /// Spreadsheets are recognised by signature; anything else is CSV
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(XLSX_MAGIC) || bytes.starts_with(XLS_MAGIC) {
            UploadFormat::Spreadsheet
        } else {
            UploadFormat::Csv
        }
    }
}

/// Parse an uploaded payload, detecting CSV or xlsx/xls from its contents
pub fn read_bytes(bytes: &[u8]) -> Result<Batch> {
    let format = UploadFormat::detect(bytes);
    let batch = match format {
        UploadFormat::Csv => read_csv(bytes)?,
        UploadFormat::Spreadsheet => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(unreadable)?;
            read_workbook(workbook)?
        }
    };

    debug!(
        format = ?format,
        bytes = bytes.len(),
        rows = batch.len(),
        "Payload ingested"
    );
    non_empty(batch)
}

fn non_empty(batch: Batch) -> Result<Batch> {
    if batch.is_empty() {
        Err(PipelineError::EmptyBatch)
    } else {
        Ok(batch)
    }
}

/// Parse CSV with a header row. Short rows are padded with missing cells.
pub fn read_csv<R: Read>(reader: R) -> Result<Batch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = header_names(reader.headers().map_err(unreadable)?.iter());

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(unreadable)?;
        if record.len() > columns.len() {
            return Err(PipelineError::UnreadableInput(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<Value> = record.iter().map(Value::from_cell).collect();
        row.resize(columns.len(), Value::Missing);
        rows.push(row);
    }

    Ok(Batch::from_rows(columns, rows))
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) if s.is_empty() => Value::Missing,
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Text(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) | Data::Empty => Value::Missing,
    }
}

/// Read the first worksheet of a workbook file
fn read_spreadsheet(path: &Path) -> Result<Batch> {
    read_workbook(open_workbook_auto(path).map_err(unreadable)?)
}

/// First worksheet; its first row is the header
fn read_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<Batch> {
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::UnreadableInput("workbook has no sheets".to_string()))?
        .map_err(unreadable)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Batch::default());
    };
    let columns = header_names(header.iter().map(|c| c.to_string()));

    let rows: Vec<Vec<Value>> = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(Batch::from_rows(columns, rows))
}

/// Clean header cells into unique column names.
///
/// Blank headers become `Unnamed: <index>`; a repeated name gets the first
/// free `.1`, `.2`, ... suffix so no column shadows another.
fn header_names<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();

    for (i, name) in raw.into_iter().enumerate() {
        let base = match name.as_ref().trim() {
            "" => format!("Unnamed: {}", i),
            trimmed => trimmed.to_string(),
        };

        let mut column = base.clone();
        if seen.contains(&column) {
            let suffix = next_suffix.entry(base.clone()).or_insert(1);
            loop {
                column = format!("{}.{}", base, suffix);
                *suffix += 1;
                if !seen.contains(&column) {
                    break;
                }
            }
        }

        seen.insert(column.clone());
        columns.push(column);
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoricalEncoding, LabelEncoder, PerColumnEncoders, UnseenCategoryPolicy};
    use std::io::Write;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    fn assert_fixture_batch(batch: &Batch) {
        assert_eq!(
            batch.columns,
            vec![
                "TransactionID",
                "Amount",
                "Country",
                "PaymentType",
                "Currency",
                "MerchantCategory",
                "Hour",
                "CustomerAge"
            ]
        );
        // The blank row between the two transactions is skipped
        assert_eq!(batch.len(), 2);

        let first = &batch.records[0];
        assert_eq!(first.get("TransactionID"), &Value::from("tx_1"));
        assert_eq!(first.get("Amount"), &Value::Number(20000.0));
        assert_eq!(first.get("Hour"), &Value::Number(14.0));

        let second = &batch.records[1];
        assert_eq!(second.get("TransactionID"), &Value::from("tx_2"));
        assert_eq!(second.get("Amount"), &Value::Number(5000.5));
        assert_eq!(second.get("Country"), &Value::from("Morocco"));
        assert_eq!(second.get("PaymentType"), &Value::Missing);
    }

    const SAMPLE: &str = "\
Amount,Country,PaymentType,Currency
20000,France,Cash,EUR
5000,Morocco,,EUR
100,France,Check,NA
";

    #[test]
    fn test_read_csv_bytes() {
        let batch = read_csv_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(batch.columns, vec!["Amount", "Country", "PaymentType", "Currency"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records[0].get("Amount"), &Value::Text("20000".to_string()));
        assert_eq!(batch.records[1].get("PaymentType"), &Value::Missing);
        assert_eq!(batch.records[2].get("Currency"), &Value::Missing);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let batch = read_csv_bytes(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(batch.records[0].get("c"), &Value::Missing);
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let err = read_csv_bytes(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableInput(_)));
    }

    #[test]
    fn test_header_only_is_empty_batch() {
        assert!(matches!(
            read_csv_bytes(b"Amount,Country\n").unwrap_err(),
            PipelineError::EmptyBatch
        ));
        assert!(matches!(
            read_csv_bytes(b"").unwrap_err(),
            PipelineError::EmptyBatch
        ));
    }

    #[test]
    fn test_read_path_csv_case_insensitive() {
        let mut file = tempfile::Builder::new().suffix(".CSV").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let batch = read_path(file.path()).unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_read_path_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let err = read_path(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableInput(_)));
        assert!(err.to_string().starts_with("Error reading file"));
    }

    #[test]
    fn test_read_path_corrupt_workbook() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"not a zip archive").unwrap();
        assert!(matches!(
            read_path(file.path()).unwrap_err(),
            PipelineError::UnreadableInput(_)
        ));
    }

    #[test]
    fn test_spreadsheet_cells() {
        assert_eq!(cell_value(&Data::Int(3)), Value::Number(3.0));
        assert_eq!(cell_value(&Data::Float(2.5)), Value::Number(2.5));
        assert_eq!(cell_value(&Data::String("Spain".into())), Value::from("Spain"));
        assert_eq!(cell_value(&Data::Empty), Value::Missing);
    }

    #[test]
    fn test_read_path_workbook() {
        let batch = read_path(fixture("batch.xlsx")).unwrap();
        assert_fixture_batch(&batch);
    }

    #[test]
    fn test_read_bytes_detects_workbook() {
        let bytes = std::fs::read(fixture("batch.xlsx")).unwrap();
        assert_eq!(UploadFormat::detect(&bytes), UploadFormat::Spreadsheet);

        let batch = read_bytes(&bytes).unwrap();
        assert_fixture_batch(&batch);
    }

    #[test]
    fn test_read_bytes_falls_back_to_csv() {
        assert_eq!(UploadFormat::detect(SAMPLE.as_bytes()), UploadFormat::Csv);
        assert_eq!(read_bytes(SAMPLE.as_bytes()).unwrap().len(), 3);

        let mut truncated = XLSX_MAGIC.to_vec();
        truncated.extend_from_slice(b"garbage");
        assert!(matches!(
            read_bytes(&truncated).unwrap_err(),
            PipelineError::UnreadableInput(_)
        ));
    }

    #[test]
    fn test_spreadsheet_integer_cell_matches_vocabulary() {
        let encoders = PerColumnEncoders::new(vec![(
            "Segment".to_string(),
            LabelEncoder::new(vec!["13".to_string(), "14".to_string()]).unwrap(),
        )]);
        let texts: Vec<String> = [Data::Float(14.0), Data::Int(13)]
            .iter()
            .map(|c| cell_value(c).to_text())
            .collect();

        let encoded = encoders
            .encode("Segment", &texts, UnseenCategoryPolicy::FirstEntry)
            .unwrap()
            .unwrap();
        assert_eq!(encoded.codes, vec![1, 0]);
        assert!(encoded.fallbacks.is_empty());
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let batch = read_csv_bytes(b"Amount,Amount,Amount.1,Amount\n1,2,3,4\n").unwrap();
        assert_eq!(batch.columns, vec!["Amount", "Amount.1", "Amount.1.1", "Amount.2"]);

        let cells: Vec<&Value> = batch.columns.iter().map(|c| batch.records[0].get(c)).collect();
        assert_eq!(
            cells,
            vec![&Value::from("1"), &Value::from("2"), &Value::from("3"), &Value::from("4")]
        );
    }

    #[test]
    fn test_blank_headers_are_named() {
        assert_eq!(
            header_names(["Amount", " ", "Amount "]),
            vec!["Amount", "Unnamed: 1", "Amount.1"]
        );
    }
}
