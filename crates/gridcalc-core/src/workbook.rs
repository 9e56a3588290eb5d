//! Workbook type - the main document structure

use crate::cell::CellRange;
use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::table::Table;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets plus defined names and tables
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    settings: WorkbookSettings,
    named_ranges: NamedRangeCollection,
    tables: Vec<Table>,
}

impl Workbook {
    /// Create a new workbook with one worksheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: WorkbookSettings::default(),
            named_ranges: NamedRangeCollection::new(),
            tables: Vec::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Get a mutable worksheet by name (case-insensitive)
    pub fn worksheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get_mut(i))
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with a generated name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with the given name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an existing worksheet to the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name(), None)?;
        self.worksheets.push(worksheet);
        Ok(self.worksheets.len() - 1)
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    // ==================== Defined names ====================

    /// Define a workbook-scoped name
    ///
    /// ```
    /// use gridcalc_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.named_ranges
            .define(NamedRange::new(name, refers_to, NameScope::Workbook))
    }

    /// Define a name visible only from one sheet
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        if sheet_index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()));
        }
        self.named_ranges
            .define(NamedRange::new(name, refers_to, NameScope::Sheet(sheet_index)))
    }

    /// Resolve a name as seen from `current_sheet`
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// Remove a workbook-scoped name
    pub fn remove_name(&mut self, name: &str) -> Option<NamedRange> {
        self.named_ranges.remove(name, NameScope::Workbook)
    }

    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    // ==================== Tables ====================

    /// Register a table on `sheet_index` covering `range` (header row included)
    pub fn add_table(
        &mut self,
        name: &str,
        sheet_index: usize,
        range: CellRange,
        columns: Vec<String>,
    ) -> Result<()> {
        if sheet_index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()));
        }
        let taken_by_name = self.named_ranges.iter().any(|n| n.name.eq_ignore_ascii_case(name));
        if self.table(name).is_some() || taken_by_name {
            return Err(Error::InvalidTable(format!("name '{}' is already in use", name)));
        }
        self.tables.push(Table::new(name, sheet_index, range, columns)?);
        Ok(())
    }

    /// Look up a table by name (case-insensitive)
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot begin or end with an apostrophe".into(),
            ));
        }

        let duplicate = self
            .worksheets
            .iter()
            .enumerate()
            .any(|(i, ws)| Some(i) != exclude_index && ws.name().eq_ignore_ascii_case(name));
        if duplicate {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }

    fn generate_sheet_name(&self) -> String {
        (self.worksheets.len() + 1..)
            .map(|n| format!("Sheet{}", n))
            .find(|name| self.sheet_index(name).is_none())
            .unwrap_or_else(|| "Sheet".to_string())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Workbook-level settings
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookSettings {
    /// Date system: false = 1900, true = 1904
    pub date_1904: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_worksheet().unwrap(), 1);
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");
        assert_eq!(wb.add_worksheet_with_name("Data").unwrap(), 2);
        assert_eq!(wb.sheet_index("data"), Some(2));
    }

    #[test]
    fn test_invalid_sheet_names() {
        let mut wb = Workbook::new();
        assert!(wb.add_worksheet_with_name("SHEET1").is_err());
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("Sheet/1").is_err());
        assert!(wb.add_worksheet_with_name("Sheet[1]").is_err());
        assert!(wb.add_worksheet_with_name("'quoted").is_err());
        assert!(wb.add_worksheet_with_name(&"A".repeat(MAX_SHEET_NAME_LEN + 1)).is_err());
        assert!(wb.add_worksheet_with_name("My Sheet").is_ok());
    }

    #[test]
    fn test_rename_worksheet() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        assert!(wb.rename_worksheet(1, "sheet1").is_err());
        wb.rename_worksheet(1, "Inputs").unwrap();
        assert!(wb.worksheet_by_name("inputs").is_some());
        assert!(wb.rename_worksheet(5, "X").is_err());
    }

    #[test]
    fn test_tables_share_namespace_with_names() {
        let mut wb = Workbook::new();
        wb.define_name("Rate", "0.05").unwrap();
        let range = CellRange::parse("A1:B3").unwrap();
        let cols = vec!["Item".to_string(), "Qty".to_string()];
        assert!(wb.add_table("rate", 0, range, cols.clone()).is_err());
        wb.add_table("Orders", 0, range, cols.clone()).unwrap();
        assert!(wb.add_table("ORDERS", 0, range, cols).is_err());
        assert_eq!(wb.table("orders").unwrap().sheet(), 0);
    }
}
