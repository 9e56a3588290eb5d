//! Structured tables
//!
//! A table names a rectangular block of a sheet whose first row holds column
//! headers. Formulas address it as `Sales` (the data body) or `Sales[Amount]`
//! (one column of the body).

use crate::cell::CellRange;
use crate::error::{Error, Result};
use crate::named_range::NamedRange;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table {
    name: String,
    sheet: usize,
    /// Full extent including the header row
    range: CellRange,
    columns: Vec<String>,
}

impl Table {
    /// Create a table over `range` whose first row carries `columns` as headers
    pub fn new(
        name: impl Into<String>,
        sheet: usize,
        range: CellRange,
        columns: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        NamedRange::validate_name(&name).map_err(|_| {
            Error::InvalidTable(format!("'{}' is not a valid table name", name))
        })?;
        if columns.len() != range.col_count() as usize {
            return Err(Error::InvalidTable(format!(
                "table '{}' spans {} columns but has {} headers",
                name,
                range.col_count(),
                columns.len()
            )));
        }
        if range.row_count() < 2 {
            return Err(Error::InvalidTable(format!(
                "table '{}' needs a header row and at least one data row",
                name
            )));
        }
        Ok(Self {
            name,
            sheet,
            range,
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the sheet holding the table
    pub fn sheet(&self) -> usize {
        self.sheet
    }

    pub fn range(&self) -> CellRange {
        self.range
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The body of the table without its header row
    pub fn data_range(&self) -> CellRange {
        CellRange::from_indices(
            self.range.start.row + 1,
            self.range.start.col,
            self.range.end.row,
            self.range.end.col,
        )
    }

    /// Position of a header, matched case-insensitively
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Body cells of a single column
    pub fn column_range(&self, column: &str) -> Option<CellRange> {
        let offset = self.column_index(column)? as u16;
        let col = self.range.start.col + offset;
        let body = self.data_range();
        Some(CellRange::from_indices(body.start.row, col, body.end.row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::new(
            "Sales",
            0,
            CellRange::parse("B2:C5").unwrap(),
            vec!["Region".into(), "Amount".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_data_and_column_ranges() {
        let table = sales();
        assert_eq!(table.data_range(), CellRange::parse("B3:C5").unwrap());
        assert_eq!(table.column_range("amount"), Some(CellRange::parse("C3:C5").unwrap()));
        assert_eq!(table.column_range("Missing"), None);
    }

    #[test]
    fn test_rejects_mismatched_headers() {
        let err = Table::new("T", 0, CellRange::parse("A1:C3").unwrap(), vec!["x".into()]);
        assert!(err.is_err());
        let err = Table::new("T", 0, CellRange::parse("A1:A1").unwrap(), vec!["x".into()]);
        assert!(err.is_err());
    }
}
