//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangular range of cells (e.g., "A1:B10")
//! - [`RowSpan`] / [`ColumnSpan`] - Whole rows ("1:3") and whole columns ("A:C")

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator, ColumnSpan, RowSpan};
pub use value::{CellError, CellValue, SharedString, StringPool};
