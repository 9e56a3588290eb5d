//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use gridcalc_core::{CellValue, Worksheet};

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write a worksheet to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        worksheet: &Worksheet,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), sheet = worksheet.name(), "writing CSV");
        let file = File::create(path)?;
        Self::write(worksheet, file, options)
    }

    /// Write the used range of a worksheet, starting at A1
    ///
    /// Formula cells are written as their calculated value; one that was never
    /// calculated is written as its formula text.
    pub fn write<W: Write>(
        worksheet: &Worksheet,
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .flexible(true)
            .from_writer(writer);

        if let Some(range) = worksheet.used_range() {
            for row in 0..=range.end.row {
                let mut record = Vec::with_capacity(usize::from(range.end.col) + 1);
                for col in 0..=range.end.col {
                    record.push(Self::field(worksheet.cell_at(row, col), options));
                }
                csv_writer.write_record(&record)?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn field(cell: Option<&CellValue>, options: &CsvWriteOptions) -> String {
        match cell {
            None => String::new(),
            Some(CellValue::Formula { text, .. }) if options.write_formulas => text.clone(),
            Some(value) => value.effective_value().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::CellError;
    use pretty_assertions::assert_eq;

    fn write(sheet: &Worksheet, options: &CsvWriteOptions) -> String {
        let mut out = Vec::new();
        CsvWriter::write(sheet, &mut out, options).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_values() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_cell_value("A1", 1.5).unwrap();
        sheet.set_cell_value("B1", "a,b").unwrap();
        sheet.set_cell_value("B2", true).unwrap();
        sheet.set_cell_formula("A2", "=A1*2").unwrap();
        sheet.set_formula_result(1, 0, CellValue::Number(3.0)).unwrap();
        sheet.set_cell_formula("C2", "=1/0").unwrap();
        sheet.set_formula_result(1, 2, CellValue::Error(CellError::Div0)).unwrap();

        assert_eq!(
            write(&sheet, &CsvWriteOptions::default()),
            "1.5,\"a,b\",\n3,TRUE,#DIV/0!\n"
        );

        let formulas = CsvWriteOptions {
            write_formulas: true,
            line_terminator: LineTerminator::CRLF,
            ..Default::default()
        };
        assert_eq!(write(&sheet, &formulas), "1.5,\"a,b\",\r\n=A1*2,TRUE,=1/0\r\n");
    }

    #[test]
    fn test_write_empty_sheet() {
        assert_eq!(write(&Worksheet::new("Empty"), &CsvWriteOptions::default()), "");
    }
}
