//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet: a sparse grid of cell values keyed by (row, col)
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get a cell value by address string (e.g., "A1"); empty cells read as [`CellValue::Empty`]
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    /// Borrow a stored cell, if any
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices; storing `Empty` clears the cell
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by indices; a missing leading `=` is added
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        validate_cell_position(row, col)?;
        let text = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.cells.insert((row, col), CellValue::formula(text));
        Ok(())
    }

    /// Clear a cell
    pub fn clear_cell(&mut self, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.clear_cell_at(addr.row, addr.col);
        Ok(())
    }

    /// Clear a cell by indices
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(&(row, col));
    }

    /// Clear all cells in a range
    pub fn clear_range(&mut self, range: &CellRange) {
        self.cells
            .retain(|&(row, col), _| !range.contains(row, col));
    }

    // === Range Operations ===

    /// Bounds of all stored cells
    pub fn used_range(&self) -> Option<CellRange> {
        let mut keys = self.cells.keys();
        let &(first_row, first_col) = keys.next()?;
        let (mut min_col, mut max_col) = (first_col, first_col);
        let mut max_row = first_row;
        for &(row, col) in keys {
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            max_row = max_row.max(row);
        }
        Some(CellRange::from_indices(first_row, min_col, max_row, max_col))
    }

    /// Number of stored (non-empty) cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.cells.iter().map(|(&(row, col), value)| (row, col, value))
    }

    // === Formula calculation support ===

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells.iter().filter_map(|(&(row, col), value)| {
            value.formula_text().map(|text| (row, col, text))
        })
    }

    /// Get the formula text at a cell position (if it's a formula)
    pub fn get_formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells.get(&(row, col)).and_then(CellValue::formula_text)
    }

    /// Store the calculated result of a formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let (cached_value, array_result) = self.formula_slots(row, col)?;
        *cached_value = Some(Box::new(value));
        *array_result = None;
        Ok(())
    }

    /// Store an array result; the top-left element becomes the cached value
    pub fn set_array_formula_result(
        &mut self,
        row: u32,
        col: u16,
        array: Vec<Vec<CellValue>>,
    ) -> Result<()> {
        let top_left = array
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or_default();
        let (cached_value, array_result) = self.formula_slots(row, col)?;
        *cached_value = Some(Box::new(top_left));
        *array_result = Some(array);
        Ok(())
    }

    /// Forget the calculated result of a formula cell
    pub fn clear_formula_result(&mut self, row: u32, col: u16) -> Result<()> {
        let (cached_value, array_result) = self.formula_slots(row, col)?;
        *cached_value = None;
        *array_result = None;
        Ok(())
    }

    /// Get the cached value of a formula cell, or the stored value otherwise
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col)).map(CellValue::effective_value)
    }

    fn formula_slots(
        &mut self,
        row: u32,
        col: u16,
    ) -> Result<(&mut Option<Box<CellValue>>, &mut Option<Vec<Vec<CellValue>>>)> {
        match self.cells.get_mut(&(row, col)) {
            Some(CellValue::Formula {
                cached_value,
                array_result,
                ..
            }) => Ok((cached_value, array_result)),
            _ => Err(Error::NotAFormula(CellAddress::new(row, col).to_string())),
        }
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_cell_values() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_value("A1", "Hello").unwrap();
        ws.set_cell_value("B1", 42.0).unwrap();
        ws.set_cell_value("C1", true).unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_string(), Some("Hello"));
        assert_eq!(ws.get_value("B1").unwrap().as_number(), Some(42.0));
        assert_eq!(ws.get_value("C1").unwrap().as_bool(), Some(true));
        assert_eq!(ws.get_value("D1").unwrap(), CellValue::Empty);

        ws.set_cell_value("B1", CellValue::Empty).unwrap();
        assert_eq!(ws.cell_count(), 2);
    }

    #[test]
    fn test_set_cell_formula_adds_equals() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_formula("A1", "SUM(B1:B10)").unwrap();
        assert_eq!(ws.get_formula_at(0, 0), Some("=SUM(B1:B10)"));
        assert_eq!(ws.formula_cells().count(), 1);
    }

    #[test]
    fn test_formula_results() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_formula_at(0, 0, "=1+1").unwrap();
        ws.set_formula_result(0, 0, CellValue::Number(2.0)).unwrap();
        assert_eq!(ws.get_calculated_value_at(0, 0), Some(&CellValue::Number(2.0)));

        ws.set_array_formula_result(
            0,
            0,
            vec![vec![CellValue::Number(1.0), CellValue::Number(2.0)]],
        )
        .unwrap();
        assert_eq!(ws.get_calculated_value_at(0, 0), Some(&CellValue::Number(1.0)));

        ws.set_cell_value("B1", 5.0).unwrap();
        assert!(ws.set_formula_result(0, 1, CellValue::Empty).is_err());
    }

    #[test]
    fn test_used_range_and_clear() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.used_range().is_none());

        ws.set_cell_value_at(5, 3, "A").unwrap();
        ws.set_cell_value_at(10, 7, "B").unwrap();
        ws.set_cell_value_at(7, 1, "C").unwrap();
        assert_eq!(ws.used_range(), Some(CellRange::from_indices(5, 1, 10, 7)));

        ws.clear_range(&CellRange::from_indices(0, 0, 8, 8));
        assert_eq!(ws.used_range(), Some(CellRange::from_indices(10, 7, 10, 7)));
    }
}
