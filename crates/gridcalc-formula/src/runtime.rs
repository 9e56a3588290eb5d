//! Evaluation context
//!
//! A [`RuntimeContext`] carries everything one evaluation pass needs: the
//! engine, the data being read, the cell being computed, a fixed clock, the
//! stack of formula cells currently being evaluated (for cycle detection) and
//! a memo of cells already computed in this pass.
//!
//! It uses interior mutability and is meant for one thread at a time.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDateTime;
use gridcalc_core::{CellError, CellValue};

use crate::ast::AstNode;
use crate::engine::FormulaEngine;
use crate::error::{EngineFault, EvalResult};
use crate::interpreter;
use crate::locale::EngineConfig;
use crate::reference::ReferenceObject;
use crate::source::{CellKey, SheetDataSource, SheetId};
use crate::value::{Operand, Value};

/// Which stored formula results may be read instead of recomputing
#[derive(Debug, Clone, Default)]
pub enum CachedResults {
    /// Every formula cell that is read gets evaluated
    #[default]
    Recompute,
    /// Stored results are current except for these cells
    TrustExcept(AHashSet<CellKey>),
}

impl CachedResults {
    fn trusts(&self, key: &CellKey) -> bool {
        match self {
            CachedResults::Recompute => false,
            CachedResults::TrustExcept(dirty) => !dirty.contains(key),
        }
    }
}

#[derive(Debug, Default)]
struct EvalState {
    /// Formula cells being evaluated, outermost first
    active: Vec<CellKey>,
    /// Defined names being resolved
    names: Vec<String>,
    computed: AHashMap<CellKey, Value>,
    asts: AHashMap<CellKey, Arc<AstNode>>,
}

/// Per-pass evaluation state
pub struct RuntimeContext<'a> {
    engine: &'a FormulaEngine,
    data: &'a dyn SheetDataSource,
    position: Cell<CellKey>,
    now: NaiveDateTime,
    cached: CachedResults,
    state: RefCell<EvalState>,
}

impl<'a> RuntimeContext<'a> {
    pub fn new(
        engine: &'a FormulaEngine,
        data: &'a dyn SheetDataSource,
        position: CellKey,
    ) -> Self {
        Self {
            engine,
            data,
            position: Cell::new(position),
            now: chrono::Local::now().naive_local(),
            cached: CachedResults::default(),
            state: RefCell::new(EvalState::default()),
        }
    }

    /// Fix the clock seen by `NOW()` and `TODAY()`
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn with_cached_results(mut self, cached: CachedResults) -> Self {
        self.cached = cached;
        self
    }

    pub fn engine(&self) -> &'a FormulaEngine {
        self.engine
    }

    pub fn data(&self) -> &'a dyn SheetDataSource {
        self.data
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.engine.config()
    }

    /// The cell whose formula is being evaluated
    pub fn position(&self) -> CellKey {
        self.position.get()
    }

    pub fn set_position(&self, position: CellKey) {
        self.position.set(position);
    }

    pub fn current_sheet(&self) -> SheetId {
        self.position.get().sheet
    }

    pub fn current_row(&self) -> u32 {
        self.position.get().row
    }

    pub fn current_col(&self) -> u16 {
        self.position.get().col
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Whether serials count from 1904, per the data source or the locale
    pub fn date_1904(&self) -> bool {
        self.data.date_1904() || self.config().locale.date_1904
    }

    /// Value of a cell as seen by a formula
    ///
    /// Formula cells are evaluated on first read and memoized for the rest of
    /// the pass. An array result reads as its top-left element.
    pub fn cell_value(&self, key: CellKey) -> EvalResult<Value> {
        if let Some(value) = self.computed(key) {
            return Ok(value.top_left().clone());
        }
        let Some(cell) = self.data.cell(key.sheet, key.row, key.col) else {
            return Ok(Value::Empty);
        };
        match cell {
            CellValue::Formula {
                text, cached_value, ..
            } => {
                if self.cached.trusts(&key) {
                    if let Some(cached) = cached_value {
                        return Ok(Value::from_cell(cached));
                    }
                }
                Ok(self.evaluate_formula_cell(key, text)?.top_left().clone())
            }
            other => Ok(Value::from_cell(other)),
        }
    }

    fn evaluate_formula_cell(&self, key: CellKey, text: &str) -> EvalResult<Value> {
        if self.is_active(key) {
            tracing::debug!(cell = %key, "circular reference");
            return Ok(Value::Error(CellError::Ref));
        }
        let primed = self.state.borrow().asts.get(&key).cloned();
        let ast = match primed {
            Some(ast) => ast,
            None => match self.engine.parse(text) {
                Ok(ast) => Arc::new(ast),
                Err(e) => {
                    tracing::warn!(
                        cell = %key,
                        formula = text,
                        error = %e,
                        "formula does not parse"
                    );
                    let value = Value::Error(CellError::Name);
                    self.seed(key, value.clone());
                    return Ok(value);
                }
            },
        };
        self.evaluate_cell(key, &ast)
    }

    /// Evaluate `ast` as the formula of `key` and memoize the result
    pub fn evaluate_cell(&self, key: CellKey, ast: &AstNode) -> EvalResult<Value> {
        if let Some(value) = self.computed(key) {
            return Ok(value);
        }
        let value = self.run(key, ast)?;
        self.seed(key, value.clone());
        Ok(value)
    }

    /// Evaluate `ast` with `key` on the active stack
    pub(crate) fn run(&self, key: CellKey, ast: &AstNode) -> EvalResult<Value> {
        {
            let mut state = self.state.borrow_mut();
            if state.active.contains(&key) {
                tracing::debug!(cell = %key, "circular reference");
                return Ok(Value::Error(CellError::Ref));
            }
            let max_depth = self.config().max_depth;
            if state.active.len() >= max_depth {
                return Err(EngineFault::DepthExceeded(max_depth));
            }
            state.active.push(key);
        }

        let saved = self.position.replace(key);
        let result = interpreter::evaluate(ast, self);
        self.position.set(saved);
        self.state.borrow_mut().active.pop();
        result
    }

    fn is_active(&self, key: CellKey) -> bool {
        self.state.borrow().active.contains(&key)
    }

    /// Resolve a defined name (or a bare table name) in the current context
    pub fn resolve_name(&self, name: &str) -> EvalResult<Operand> {
        if let Some(expression) = self.data.defined_name(name, self.current_sheet()) {
            let circular = self
                .state
                .borrow()
                .names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(name));
            if circular {
                tracing::debug!(name, "circular name");
                return Ok(Value::Error(CellError::Ref).into());
            }
            let ast = match self.engine.parse(expression) {
                Ok(ast) => ast,
                Err(e) => {
                    tracing::warn!(name, expression, error = %e, "defined name does not parse");
                    return Ok(Value::Error(CellError::Name).into());
                }
            };

            self.state.borrow_mut().names.push(name.to_string());
            let result = interpreter::evaluate_operand(&ast, self);
            self.state.borrow_mut().names.pop();
            return result;
        }

        if self.data.table(name).is_some() {
            return Ok(Operand::Reference(ReferenceObject::table(name, None)));
        }
        tracing::debug!(name, "undefined name");
        Ok(Value::Error(CellError::Name).into())
    }

    /// Record a value for a cell, as if it had been computed in this pass
    pub fn seed(&self, key: CellKey, value: Value) {
        self.state.borrow_mut().computed.insert(key, value);
    }

    /// A value computed (or seeded) in this pass
    pub fn computed(&self, key: CellKey) -> Option<Value> {
        self.state.borrow().computed.get(&key).cloned()
    }

    pub fn forget(&self, key: CellKey) {
        self.state.borrow_mut().computed.remove(&key);
    }

    /// Supply an already parsed formula for a cell
    pub fn prime_ast(&self, key: CellKey, ast: Arc<AstNode>) {
        self.state.borrow_mut().asts.insert(key, ast);
    }
}
