//! Formula error types
//!
//! Spreadsheet errors such as `#DIV/0!` are ordinary values
//! ([`Value::Error`](crate::Value::Error)) and never show up here. This module
//! only covers text that cannot be parsed and faults in the engine itself.

use thiserror::Error;

/// Result of evaluating a node or calling a function
pub type EvalResult<T> = std::result::Result<T, EngineFault>;

/// Result type for the convenience APIs that parse and evaluate in one step
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Formula text that cannot be turned into a tree
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("formula is empty")]
    EmptyFormula,

    #[error("unbalanced parenthesis at offset {position}")]
    UnbalancedParenthesis { position: usize },

    #[error("unbalanced '{bracket}' at offset {position}")]
    UnbalancedBracket { bracket: char, position: usize },

    #[error("unterminated string literal starting at offset {position}")]
    UnterminatedString { position: usize },

    #[error("unterminated quoted sheet name starting at offset {position}")]
    UnterminatedSheetName { position: usize },

    #[error("unexpected '{token}' at offset {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("formula ends unexpectedly")]
    UnexpectedEnd,

    #[error("array constants may only contain literals, found '{0}'")]
    InvalidArrayElement(String),

    #[error("array constant rows have different lengths")]
    RaggedArray,
}

/// A broken engine invariant
///
/// Faults point at a defect in node construction or registration, not at user
/// data, so they are never turned into a visible error value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineFault {
    #[error("{node} node executed without operand {index}")]
    MissingOperand { node: &'static str, index: usize },

    #[error("internal operator function {0} is not registered")]
    MissingOperatorFunction(String),

    #[error("formula evaluation nested deeper than {0} cells")]
    DepthExceeded(usize),
}

/// Either failure of a parse-and-evaluate call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("engine fault: {0}")]
    Fault(#[from] EngineFault),
}
