//! Workbook calculation engine
//!
//! Provides workbook-level formula calculation with dependency tracking,
//! circular reference detection, volatile functions and incremental
//! recalculation after edits.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(
//!     workbook.worksheet(0).unwrap().get_calculated_value_at(2, 0),
//!     Some(&CellValue::Number(30.0))
//! );
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDateTime;
use gridcalc_formula::{
    collect_references, AstNode, CachedResults, CellKey, DependencyGraph, EngineFault,
    FormulaEngine, SheetId, Value,
};

use crate::{CellError, CellValue, Error, Result, Workbook};

/// Options for workbook calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Recalculate every formula, ignoring stored results
    pub force_full_calculation: bool,
    /// Recalculate volatile functions (NOW, TODAY, RAND, ...) on every pass
    pub calculate_volatile: bool,
    /// Checked between cells; once set the pass stops and keeps what it has
    pub cancel: Option<Arc<AtomicBool>>,
    /// Clock for NOW and TODAY; the local time when unset
    pub now: Option<NaiveDateTime>,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            force_full_calculation: true,
            calculate_volatile: true,
            cancel: None,
            now: None,
        }
    }
}

impl CalculationOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// A formula cell whose evaluation hit an engine fault
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationFault {
    pub cell: CellKey,
    pub fault: EngineFault,
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Calculated cells whose result is an error value
    pub errors: usize,
    /// Cells sitting on a reference cycle
    pub circular_references: usize,
    /// Number of volatile cells recalculated
    pub volatile_cells: usize,
    /// Formula cells whose text does not parse
    pub parse_failures: usize,
    pub faults: Vec<CalculationFault>,
    /// The pass stopped early on the cancel flag
    pub cancelled: bool,
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        Calculator::with_options(options.clone()).calculate_all(self)
    }
}

/// An edit made to a workbook since the last calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// A constant was stored (or a formula replaced by a constant)
    CellChanged(CellKey),
    /// A formula was stored or edited
    FormulaChanged(CellKey),
    CellCleared(CellKey),
    /// Anything on the sheet may have changed
    SheetRecalculated(SheetId),
}

/// Keeps parsed formulas and the dependency graph between passes
pub struct Calculator {
    engine: FormulaEngine,
    options: CalculationOptions,
    /// Parsed formula ASTs, keyed by CellKey
    formulas: AHashMap<CellKey, Arc<AstNode>>,
    /// Formula cells whose text does not parse
    invalid: AHashSet<CellKey>,
    dependency_graph: DependencyGraph,
    volatile_cells: AHashSet<CellKey>,
    /// Cells whose precedents are only known at run time
    dynamic_cells: AHashSet<CellKey>,
    loaded: bool,
}

impl Calculator {
    pub fn new() -> Self {
        Self::with_options(CalculationOptions::default())
    }

    pub fn with_options(options: CalculationOptions) -> Self {
        Self::with_engine(FormulaEngine::new(), options)
    }

    /// Calculate with a custom engine (registry, factories or configuration)
    pub fn with_engine(engine: FormulaEngine, options: CalculationOptions) -> Self {
        Self {
            engine,
            options,
            formulas: AHashMap::new(),
            invalid: AHashSet::new(),
            dependency_graph: DependencyGraph::new(),
            volatile_cells: AHashSet::new(),
            dynamic_cells: AHashSet::new(),
            loaded: false,
        }
    }

    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependency_graph
    }

    /// Parse every formula and calculate all of them
    pub fn calculate_all(&mut self, workbook: &mut Workbook) -> Result<CalculationStats> {
        let mut stats = CalculationStats::default();
        self.formulas.clear();
        self.invalid.clear();
        self.dependency_graph.clear();
        self.volatile_cells.clear();
        self.dynamic_cells.clear();

        for sheet in 0..workbook.sheet_count() {
            self.load_sheet(workbook, sheet, &mut stats)?;
        }
        self.loaded = true;

        let dirty: AHashSet<CellKey> = if self.options.force_full_calculation {
            self.formulas.keys().chain(self.invalid.iter()).copied().collect()
        } else {
            self.stale_cells(workbook)
        };
        self.recalculate(workbook, dirty, &mut stats)?;
        Ok(stats)
    }

    /// Bring results up to date after one edit
    ///
    /// Only the edited cell, the formula cells that depend on it and volatile
    /// cells are recalculated.
    pub fn on_mutation(
        &mut self,
        workbook: &mut Workbook,
        mutation: Mutation,
    ) -> Result<CalculationStats> {
        if !self.loaded {
            return self.calculate_all(workbook);
        }
        tracing::debug!(?mutation, "recalculating after edit");

        let mut stats = CalculationStats::default();
        let mut changed = Vec::new();
        match mutation {
            Mutation::CellChanged(cell) | Mutation::CellCleared(cell) => {
                self.forget(cell);
                changed.push(cell);
            }
            Mutation::FormulaChanged(cell) => {
                self.forget(cell);
                let text = workbook
                    .worksheet(cell.sheet)
                    .and_then(|ws| ws.get_formula_at(cell.row, cell.col))
                    .map(str::to_string);
                if let Some(text) = text {
                    self.load_formula(workbook, cell, &text, &mut stats);
                }
                changed.push(cell);
            }
            Mutation::SheetRecalculated(sheet) => {
                let stale: Vec<CellKey> = self
                    .formulas
                    .keys()
                    .chain(self.invalid.iter())
                    .copied()
                    .filter(|k| k.sheet == sheet)
                    .collect();
                for cell in stale {
                    self.forget(cell);
                    changed.push(cell);
                }
                self.load_sheet(workbook, sheet, &mut stats)?;
                changed.extend(
                    self.formulas
                        .keys()
                        .chain(self.invalid.iter())
                        .copied()
                        .filter(|k| k.sheet == sheet),
                );
            }
        }

        let mut dirty = self.dependency_graph.transitive_dependents(changed.iter().copied());
        dirty.extend(
            changed
                .into_iter()
                .filter(|k| self.formulas.contains_key(k) || self.invalid.contains(k)),
        );
        dirty.extend(self.stale_cells(workbook));
        self.recalculate(workbook, dirty, &mut stats)?;
        Ok(stats)
    }

    fn forget(&mut self, cell: CellKey) {
        self.formulas.remove(&cell);
        self.invalid.remove(&cell);
        self.dependency_graph.remove(cell);
        self.volatile_cells.remove(&cell);
        self.dynamic_cells.remove(&cell);
    }

    /// Collect and parse all formulas of a sheet and add them to the graph
    fn load_sheet(
        &mut self,
        workbook: &Workbook,
        sheet: SheetId,
        stats: &mut CalculationStats,
    ) -> Result<()> {
        let worksheet = workbook
            .worksheet(sheet)
            .ok_or_else(|| Error::other(format!("Sheet {} not found", sheet)))?;
        for (row, col, text) in worksheet.formula_cells() {
            self.load_formula(workbook, CellKey::new(sheet, row, col), text, stats);
        }
        Ok(())
    }

    fn load_formula(
        &mut self,
        workbook: &Workbook,
        cell: CellKey,
        text: &str,
        stats: &mut CalculationStats,
    ) {
        let ast = match self.engine.parse(text) {
            Ok(ast) => ast,
            Err(e) => {
                tracing::warn!(%cell, formula = text, error = %e, "formula does not parse");
                stats.parse_failures += 1;
                self.invalid.insert(cell);
                return;
            }
        };

        if ast.is_volatile() {
            self.volatile_cells.insert(cell);
        }
        let references = collect_references(&ast, cell.sheet, workbook, &self.engine);
        if references.dynamic {
            self.dynamic_cells.insert(cell);
        }
        self.dependency_graph.set_precedents(cell, references.precedents);
        self.formulas.insert(cell, Arc::new(ast));
    }

    /// Formula cells that must run on every pass, or that have no result yet
    fn stale_cells(&self, workbook: &Workbook) -> AHashSet<CellKey> {
        let mut stale: AHashSet<CellKey> = self
            .formulas
            .keys()
            .chain(self.invalid.iter())
            .copied()
            .filter(|k| {
                workbook
                    .worksheet(k.sheet)
                    .and_then(|ws| ws.cell_at(k.row, k.col))
                    .map_or(false, |c| matches!(c, CellValue::Formula { cached_value: None, .. }))
            })
            .collect();

        let mut always: Vec<CellKey> = self.dynamic_cells.iter().copied().collect();
        if self.options.calculate_volatile {
            always.extend(self.volatile_cells.iter().copied());
        }
        stale.extend(self.dependency_graph.transitive_dependents(always.iter().copied()));
        stale.extend(always);
        stale
    }

    /// Evaluate `dirty` in dependency order and store the results
    fn recalculate(
        &self,
        workbook: &mut Workbook,
        dirty: AHashSet<CellKey>,
        stats: &mut CalculationStats,
    ) -> Result<()> {
        stats.formula_count = self.formulas.len() + self.invalid.len();
        if dirty.is_empty() {
            return Ok(());
        }

        let plan = self.dependency_graph.recalc_order(dirty.iter().copied());
        stats.circular_references = plan.circular.len();
        for cell in &plan.circular {
            tracing::warn!(%cell, "circular reference");
        }

        let results = {
            let mut ctx = self
                .engine
                .context(&*workbook, CellKey::new(0, 0, 0))
                .with_cached_results(CachedResults::TrustExcept(dirty.clone()));
            if let Some(now) = self.options.now {
                ctx = ctx.with_now(now);
            }
            for (cell, ast) in &self.formulas {
                ctx.prime_ast(*cell, Arc::clone(ast));
            }
            for cell in &self.invalid {
                ctx.seed(*cell, Value::Error(CellError::Name));
            }

            let mut results: Vec<(CellKey, Option<Value>)> = Vec::with_capacity(plan.order.len());
            for cell in dirty.iter().filter(|k| self.invalid.contains(k)) {
                results.push((*cell, Some(Value::Error(CellError::Name))));
            }
            for cell in plan.order {
                if self.options.is_cancelled() {
                    tracing::debug!("calculation cancelled");
                    stats.cancelled = true;
                    break;
                }
                let Some(ast) = self.formulas.get(&cell) else {
                    continue;
                };
                match ctx.evaluate_cell(cell, ast) {
                    Ok(value) => results.push((cell, Some(value))),
                    Err(fault) => {
                        tracing::error!(%cell, %fault, "engine fault");
                        stats.faults.push(CalculationFault { cell, fault });
                        results.push((cell, None));
                    }
                }
            }
            results
        };

        for (cell, value) in results {
            let Some(sheet) = workbook.worksheet_mut(cell.sheet) else {
                continue;
            };
            match value {
                None => sheet.clear_formula_result(cell.row, cell.col)?,
                Some(value) => {
                    if value.top_left().is_error() {
                        stats.errors += 1;
                    }
                    if self.formulas.contains_key(&cell) {
                        stats.cells_calculated += 1;
                        if self.volatile_cells.contains(&cell) {
                            stats.volatile_cells += 1;
                        }
                    }
                    store_result(sheet, cell, value)?;
                }
            }
        }

        tracing::debug!(
            calculated = stats.cells_calculated,
            errors = stats.errors,
            circular = stats.circular_references,
            "calculation finished"
        );
        Ok(())
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Store a formula result; arrays keep their full contents. A formula never
/// shows a blank, so an empty result is stored as 0.
fn store_result(sheet: &mut crate::Worksheet, cell: CellKey, value: Value) -> Result<()> {
    match value {
        Value::Array(rows) => {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(Value::to_cell_value).collect())
                .collect();
            sheet.set_array_formula_result(cell.row, cell.col, rows)
        }
        Value::Empty => sheet.set_formula_result(cell.row, cell.col, CellValue::Number(0.0)),
        other => sheet.set_formula_result(cell.row, cell.col, other.to_cell_value()),
    }
}
