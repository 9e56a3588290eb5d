//! # gridcalc-formula
//!
//! Formula lexer, parser and evaluator for gridcalc.
//!
//! This crate provides:
//! - Tokenizing formula text into a tree of lexemes ([`lexer`])
//! - Building an AST from that tree with pluggable factories ([`ast`])
//! - Post-order evaluation against any [`SheetDataSource`] ([`interpreter`])
//! - Built-in functions in a case-insensitive registry ([`functions`])
//! - Dependency tracking for calculation chains ([`dependency`])
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::Workbook;
//! use gridcalc_formula::{CellKey, FormulaEngine, Value};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_value("A2", 2.0).unwrap();
//!
//! let engine = FormulaEngine::new();
//! let result = engine
//!     .evaluate_formula("=SUM(A1:A2)", &workbook, CellKey::new(0, 2, 0))
//!     .unwrap();
//! assert_eq!(result, Value::Number(3.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod locale;
pub mod reference;
pub mod runtime;
pub mod source;
pub mod token;
pub mod value;

pub use ast::{AstNode, AstNodeFactory};
pub use dependency::{collect_references, DependencyGraph, Precedent, RecalcOrder, References};
pub use engine::FormulaEngine;
pub use error::{EngineFault, EvalResult, FormulaError, FormulaResult, ParseError};
pub use functions::{FunctionDef, FunctionImpl, FunctionRegistry};
pub use lexer::{tokenize, LexerNode, LexerNodeKind};
pub use locale::{EngineConfig, Locale};
pub use reference::{ReferenceObject, ReferenceTarget};
pub use runtime::{CachedResults, RuntimeContext};
pub use source::{CellKey, SheetDataSource, SheetId};
pub use value::{Operand, Value};
