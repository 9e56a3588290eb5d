//! CSV error types

use thiserror::Error;

/// Result type for CSV operations
pub type CsvResult<T> = std::result::Result<T, CsvError>;

/// Errors that can occur during CSV operations
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A record does not fit on a worksheet
    #[error("record {row} has {columns} fields, more than a sheet holds")]
    TooWide { row: usize, columns: usize },

    #[error("Core error: {0}")]
    Core(#[from] gridcalc_core::Error),
}
