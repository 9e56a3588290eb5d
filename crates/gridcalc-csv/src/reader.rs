//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use gridcalc_core::{CellError, CellValue, Worksheet, MAX_COLS};

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read CSV file into a worksheet
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading CSV");
        let file = File::open(path)?;
        Self::read(file, options)
    }

    /// Read CSV from a reader into a worksheet; every record is a row,
    /// including the first
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut worksheet = Worksheet::new(options.sheet_name.as_str());
        for (row, result) in csv_reader.records().enumerate() {
            let record = result?;
            if record.len() > usize::from(MAX_COLS) {
                return Err(CsvError::TooWide {
                    row: row + 1,
                    columns: record.len(),
                });
            }

            for (col, field) in record.iter().enumerate() {
                let (row, col) = (row as u32, col as u16);
                if options.formulas && field.len() > 1 && field.starts_with('=') {
                    worksheet.set_cell_formula_at(row, col, field)?;
                    continue;
                }
                let value = if options.auto_detect_types {
                    Self::detect_type(field)
                } else if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::string(field)
                };
                worksheet.set_cell_value_at(row, col, value)?;
            }
        }

        Ok(worksheet)
    }

    /// Detect the type of a field value
    fn detect_type(field: &str) -> CellValue {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.eq_ignore_ascii_case("TRUE") {
            return CellValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return CellValue::Boolean(false);
        }
        if let Some(error) = CellError::parse(trimmed) {
            return CellValue::Error(error);
        }

        // f64 parsing also accepts "inf" and "NaN"
        let numeric = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        if numeric {
            if let Ok(n) = trimmed.parse::<f64>() {
                return CellValue::Number(n);
            }
        }

        if let Some(serial) = Self::date_serial(trimmed) {
            return CellValue::Number(serial);
        }

        CellValue::string(field)
    }

    /// 1900-system serial of an ISO `yyyy-mm-dd` date from March 1900 on
    fn date_serial(text: &str) -> Option<f64> {
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
        let first = NaiveDate::from_ymd_opt(1900, 3, 1)?;
        if date < first {
            return None;
        }
        // Day 0 is 1899-12-30 once the phantom 1900-02-29 is counted
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        Some((date - epoch).num_days() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_type() {
        assert_eq!(CsvReader::detect_type(""), CellValue::Empty);
        assert_eq!(CsvReader::detect_type("42"), CellValue::Number(42.0));
        assert_eq!(CsvReader::detect_type(" -1.5e2 "), CellValue::Number(-150.0));
        assert_eq!(CsvReader::detect_type("true"), CellValue::Boolean(true));
        assert_eq!(CsvReader::detect_type("#N/A"), CellValue::Error(CellError::Na));
        assert_eq!(CsvReader::detect_type("2024-01-01"), CellValue::Number(45292.0));
        assert_eq!(CsvReader::detect_type("inf"), CellValue::string("inf"));
        assert_eq!(CsvReader::detect_type("1900-01-01"), CellValue::string("1900-01-01"));
        assert_eq!(CsvReader::detect_type("hello"), CellValue::string("hello"));
    }

    #[test]
    fn test_read_formulas_and_ragged_rows() {
        let data = "1,2\n3\n=A1+A2,\"=quoted\",x\n";
        let sheet = CsvReader::read(data.as_bytes(), &CsvReadOptions::default()).unwrap();
        assert_eq!(sheet.get_value_at(0, 1), CellValue::Number(2.0));
        assert_eq!(sheet.get_value_at(1, 0), CellValue::Number(3.0));
        assert_eq!(sheet.get_value_at(1, 1), CellValue::Empty);
        assert_eq!(sheet.get_formula_at(2, 0), Some("=A1+A2"));
        assert_eq!(sheet.get_formula_at(2, 1), Some("=quoted"));
        assert_eq!(sheet.get_value_at(2, 2), CellValue::string("x"));
    }

    #[test]
    fn test_read_without_detection() {
        let options = CsvReadOptions {
            auto_detect_types: false,
            formulas: false,
            sheet_name: "Raw".to_string(),
            delimiter: b';',
            ..Default::default()
        };
        let sheet = CsvReader::read("1;=A1".as_bytes(), &options).unwrap();
        assert_eq!(sheet.name(), "Raw");
        assert_eq!(sheet.get_value_at(0, 0), CellValue::string("1"));
        assert_eq!(sheet.get_value_at(0, 1), CellValue::string("=A1"));
    }
}
