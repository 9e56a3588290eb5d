//! Read access to sheet data during evaluation

use std::fmt;

use gridcalc_core::{CellAddress, CellValue, Table, Workbook};

/// Index of a sheet within its data source
pub type SheetId = usize;

/// A cell position across sheets: the key for cycle detection and dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellKey {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    pub fn new(sheet: SheetId, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}!{}", self.sheet, CellAddress::new(self.row, self.col))
    }
}

/// Everything the evaluator needs to know about the cells it reads
///
/// Implemented for [`Workbook`]; embedders with their own storage implement it
/// directly.
pub trait SheetDataSource {
    /// Resolve a sheet name (case-insensitive)
    fn sheet_id(&self, name: &str) -> Option<SheetId>;

    fn sheet_name(&self, sheet: SheetId) -> Option<&str>;

    /// Stored contents of a cell; `None` for blank cells and unknown sheets
    fn cell(&self, sheet: SheetId, row: u32, col: u16) -> Option<&CellValue>;

    /// (rows, columns) from A1 to the last used cell, used to bound whole-row
    /// and whole-column references
    fn range_bounds(&self, sheet: SheetId) -> (u32, u16);

    /// Expression behind a defined name as seen from `sheet`
    fn defined_name(&self, name: &str, sheet: SheetId) -> Option<&str>;

    fn table(&self, name: &str) -> Option<&Table>;

    /// Whether date serials count from 1904
    fn date_1904(&self) -> bool {
        false
    }
}

impl SheetDataSource for Workbook {
    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheet_index(name)
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.worksheet(sheet).map(|ws| ws.name())
    }

    fn cell(&self, sheet: SheetId, row: u32, col: u16) -> Option<&CellValue> {
        self.worksheet(sheet)?.cell_at(row, col)
    }

    fn range_bounds(&self, sheet: SheetId) -> (u32, u16) {
        self.worksheet(sheet)
            .and_then(|ws| ws.used_range())
            .map_or((0, 0), |range| (range.end.row + 1, range.end.col + 1))
    }

    fn defined_name(&self, name: &str, sheet: SheetId) -> Option<&str> {
        self.get_named_range(name, sheet).map(|n| n.expression())
    }

    fn table(&self, name: &str) -> Option<&Table> {
        Workbook::table(self, name)
    }

    fn date_1904(&self) -> bool {
        self.settings().date_1904
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_source() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(1).unwrap().set_cell_value("C4", 3.0).unwrap();
        wb.define_name("Rate", "=0.05").unwrap();

        assert_eq!(wb.sheet_id("DATA"), Some(1));
        assert_eq!(SheetDataSource::sheet_name(&wb, 1), Some("Data"));
        assert_eq!(wb.cell(1, 3, 2), Some(&CellValue::Number(3.0)));
        assert_eq!(wb.cell(0, 3, 2), None);
        assert_eq!(wb.range_bounds(1), (4, 3));
        assert_eq!(wb.range_bounds(0), (0, 0));
        assert_eq!(wb.defined_name("rate", 0), Some("0.05"));
        assert!(!SheetDataSource::date_1904(&wb));
    }

    #[test]
    fn test_cell_key_display() {
        assert_eq!(CellKey::new(2, 0, 27).to_string(), "#2!AB1");
    }
}
