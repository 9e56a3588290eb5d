//! # gridcalc
//!
//! A spreadsheet formula engine.
//!
//! gridcalc parses Excel-style formulas, evaluates them against workbook
//! data and keeps formula results current as cells change.
//!
//! ## Features
//!
//! - Formula lexer and parser with pluggable AST factories
//! - Post-order evaluation with Excel error semantics
//! - A case-insensitive registry of built-in functions
//! - Workbook calculation with dependency tracking and cycle detection
//! - Incremental recalculation after edits
//! - Read and write CSV files
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*21").unwrap();
//!
//! workbook.calculate().unwrap();
//! assert_eq!(
//!     workbook.worksheet(0).unwrap().get_calculated_value_at(0, 1),
//!     Some(&CellValue::Number(42.0))
//! );
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{
    CalculationFault, CalculationOptions, CalculationStats, Calculator, Mutation,
    WorkbookCalculationExt,
};

// Re-export core types
pub use gridcalc_core::{
    CellAddress, CellError, CellRange, CellValue, Error, NameScope, NamedRange, Result, Table,
    Workbook, WorkbookSettings, Worksheet,
};

// Re-export formula types
pub use gridcalc_formula::{
    tokenize, AstNode, AstNodeFactory, CellKey, EngineConfig, EngineFault, FormulaEngine,
    FormulaError, FormulaResult, FunctionDef, FunctionRegistry, Locale, Operand, ParseError,
    ReferenceObject, ReferenceTarget, RuntimeContext, SheetDataSource, Value,
};

// Re-export I/O types
#[cfg(feature = "csv")]
pub use gridcalc_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};

use std::path::Path;

/// Extension trait for Workbook to add file I/O
pub trait WorkbookExt {
    /// Open a workbook from a file
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook>;

    /// Save the workbook to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            #[cfg(feature = "csv")]
            Some("csv") => {
                let worksheet = CsvReader::read_file(path, &CsvReadOptions::default())
                    .map_err(|e| Error::other(e.to_string()))?;

                let mut workbook = Workbook::empty();
                workbook.add_existing_worksheet(worksheet)?;
                Ok(workbook)
            }
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            #[cfg(feature = "csv")]
            Some("csv") => {
                if let Some(sheet) = self.worksheet(0) {
                    CsvWriter::write_file(sheet, path, &CsvWriteOptions::default())
                        .map_err(|e| Error::other(e.to_string()))
                } else {
                    Err(Error::other("No worksheets to save"))
                }
            }
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }
}
