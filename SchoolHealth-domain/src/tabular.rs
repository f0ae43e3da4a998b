//! Spreadsheet import and export
//!
//! Uploaded sheets may be `.xlsx` (first worksheet) or `.csv`. Both are read
//! into [`TabularRow`]s keyed by lower-cased header so column lookup is
//! case-insensitive. Exports are written as CSV.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use csv::{ReaderBuilder, Writer};
use serde::Serialize;
use tracing::debug;

use crate::errors::{invalid, ServiceError};

/// One data row of an uploaded sheet
#[derive(Debug, Clone, Default)]
pub struct TabularRow {
    line: usize,
    values: HashMap<String, String>,
}

impl TabularRow {
    pub fn new(line: usize, values: HashMap<String, String>) -> Self {
        let values = values.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect();
        Self { line, values }
    }

    /// 1-based line in the sheet, counting the header as line 1
    pub fn line(&self) -> usize {
        self.line
    }

    /// Trimmed cell value; empty cells read as `None`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(&column.to_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Cell value as a string, empty when missing
    pub fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or_default().to_string()
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.parse::<f64>().ok())
    }
}

/// Read every data row of an uploaded sheet
pub fn read_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<TabularRow>, ServiceError> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".xlsx") {
        read_xlsx(bytes)
    } else if lower.ends_with(".csv") {
        read_csv(bytes)
    } else {
        Err(invalid("Only .xlsx and .csv files are supported"))
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<TabularRow>, ServiceError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| invalid(format!("Unreadable spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| invalid("Spreadsheet has no worksheet"))?
        .map_err(|e| invalid(format!("Unreadable worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let parsed: Vec<TabularRow> = rows
        .enumerate()
        .map(|(index, cells)| {
            let values = headers
                .iter()
                .zip(cells.iter())
                .map(|(header, cell)| (header.clone(), cell.to_string()))
                .collect();
            TabularRow::new(index + 2, values)
        })
        .filter(|row| !row.values.values().all(|v| v.trim().is_empty()))
        .collect();

    debug!("Read {} rows from xlsx upload", parsed.len());
    Ok(parsed)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<TabularRow>, ServiceError> {
    let mut reader = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| invalid(format!("Unreadable CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut parsed = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(format!("Unreadable CSV row {}: {}", index + 2, e)))?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        let values = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        parsed.push(TabularRow::new(index + 2, values));
    }

    debug!("Read {} rows from csv upload", parsed.len());
    Ok(parsed)
}

/// Parse `YYYY-MM-DD`, `DD/MM/YYYY` or an Excel serial day number
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(date);
    }

    let serial = value.parse::<f64>().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Serialize rows to CSV bytes, header first
pub fn write_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = Writer::from_writer(Vec::new());

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ServiceError::Internal(format!("Failed to write CSV record: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::Internal(format!("Failed to flush CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_are_case_insensitive_and_skip_blank_lines() {
        let data = b"StudentId,Height,Weight\n\"SV001\",170,60\n,,\nSV002, 165.5 ,\n";
        let rows = read_rows("fitness.CSV", data).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("studentid"), Some("SV001"));
        assert_eq!(rows[0].number("height"), Some(170.0));
        assert_eq!(rows[1].line(), 4);
        assert_eq!(rows[1].number("height"), Some(165.5));
        assert_eq!(rows[1].get("weight"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_rows("notes.txt", b"a,b").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_parse_flexible_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_flexible_date("2025-03-14"), Some(expected));
        assert_eq!(parse_flexible_date("14/03/2025"), Some(expected));
        assert_eq!(parse_flexible_date("45730"), Some(expected));
        assert_eq!(parse_flexible_date("soon"), None);
    }

    #[test]
    fn test_write_csv_has_header() {
        #[derive(Serialize)]
        struct Row {
            name: &'static str,
            count: u32,
        }

        let bytes = write_csv(&[Row { name: "a", count: 1 }]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "name,count\na,1\n");
    }
}
