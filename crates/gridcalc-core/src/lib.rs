//! # gridcalc-core
//!
//! Sheet data model consumed by the gridcalc formula engine.
//!
//! - [`CellValue`] - Raw cell contents (numbers, strings, booleans, errors, formulas)
//! - [`CellAddress`], [`CellRange`], [`RowSpan`], [`ColumnSpan`] - A1-style addressing
//! - [`Workbook`], [`Worksheet`] - Sheets, defined names and tables
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::Number(2.0)).unwrap();
//! sheet.set_cell_formula("A3", "=SUM(A1:A2)").unwrap();
//! ```

pub mod cell;
pub mod error;
pub mod named_range;
pub mod table;
pub mod workbook;
pub mod worksheet;

pub use cell::{
    CellAddress, CellError, CellRange, CellValue, ColumnSpan, RowSpan, SharedString, StringPool,
};
pub use error::{Error, Result};
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use table::Table;
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
