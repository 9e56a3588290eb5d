//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    Calculator,
    Mutation,

    // Cell types
    CellAddress,
    CellError,
    CellRange,
    CellValue,

    // Formula types
    CellKey,
    FormulaEngine,
    Value,

    // Error types
    Error,
    Result,

    // Main types
    Workbook,
    Worksheet,

    // Extension traits
    WorkbookCalculationExt,
    WorkbookExt,
};

#[cfg(feature = "csv")]
pub use crate::{CsvReader, CsvWriter};
