//! Formula engine
//!
//! [`FormulaEngine`] owns everything that is fixed between evaluations: the
//! function registry, the AST factories and the configuration. Several
//! engines with different registries can live side by side.

use crate::ast::{default_factories, AstBuilder, AstNode, AstNodeFactory};
use crate::error::{EvalResult, FormulaResult, ParseError};
use crate::functions::FunctionRegistry;
use crate::lexer::{self, LexerNode};
use crate::locale::EngineConfig;
use crate::runtime::RuntimeContext;
use crate::source::{CellKey, SheetDataSource};
use crate::value::Value;

/// Parses and evaluates formulas
pub struct FormulaEngine {
    functions: FunctionRegistry,
    factories: Vec<Box<dyn AstNodeFactory>>,
    config: EngineConfig,
}

impl FormulaEngine {
    /// Engine with the built-in functions and default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            functions: FunctionRegistry::new(),
            factories: default_factories(),
            config,
        }
    }

    /// Engine with a caller-supplied function registry
    pub fn with_registry(functions: FunctionRegistry) -> Self {
        Self {
            functions,
            ..Self::new()
        }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Registry access for adding or removing functions; trees built before
    /// the change keep the functions they resolved
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a factory; equal z-indexes keep registration order
    pub fn register_factory(&mut self, factory: Box<dyn AstNodeFactory>) {
        tracing::debug!(
            factory = factory.name(),
            z_index = factory.z_index(),
            "registering AST factory"
        );
        self.factories.push(factory);
        self.factories.sort_by(|a, b| b.z_index().cmp(&a.z_index()));
    }

    /// Factories in the order they are tried
    pub fn factories(&self) -> &[Box<dyn AstNodeFactory>] {
        &self.factories
    }

    pub fn tokenize(&self, formula: &str) -> Result<LexerNode, ParseError> {
        lexer::tokenize(formula)
    }

    /// Build an AST from an already tokenized formula
    pub fn build(&self, node: &LexerNode, formula: &str) -> Result<AstNode, ParseError> {
        AstBuilder::new(self, formula).build(node)
    }

    /// Parse formula text (with or without the leading `=`)
    pub fn parse(&self, formula: &str) -> Result<AstNode, ParseError> {
        let tree = self.tokenize(formula)?;
        self.build(&tree, formula)
    }

    /// Fresh evaluation context positioned at `position`
    pub fn context<'a>(
        &'a self,
        data: &'a dyn SheetDataSource,
        position: CellKey,
    ) -> RuntimeContext<'a> {
        RuntimeContext::new(self, data, position)
    }

    /// Evaluate a tree as the formula of the context's current cell
    ///
    /// The current cell is on the active stack while the tree runs, so a
    /// formula that reads its own cell gets `#REF!`. The result is not
    /// memoized.
    pub fn evaluate(&self, ast: &AstNode, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        ctx.run(ctx.position(), ast)
    }

    /// Parse and evaluate in one step
    pub fn evaluate_formula(
        &self,
        formula: &str,
        data: &dyn SheetDataSource,
        position: CellKey,
    ) -> FormulaResult<Value> {
        let ast = self.parse(formula)?;
        let ctx = self.context(data, position);
        Ok(self.evaluate(&ast, &ctx)?)
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use gridcalc_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_errors_surface() {
        let engine = FormulaEngine::new();
        let wb = Workbook::new();
        let result = engine.evaluate_formula("=1+(2", &wb, CellKey::new(0, 0, 0));
        assert!(matches!(result, Err(FormulaError::Parse(_))));
        assert_eq!(engine.parse(""), Err(ParseError::EmptyFormula));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 4.0).unwrap();
        ws.set_cell_formula("A2", "=A1*A1").unwrap();

        let engine = FormulaEngine::new();
        let ast = engine.parse("=A2+1").unwrap();
        let ctx = engine.context(&wb, CellKey::new(0, 5, 0));
        let first = engine.evaluate(&ast, &ctx).unwrap();
        let second = engine.evaluate(&ast, &ctx).unwrap();
        assert_eq!(first, Value::Number(17.0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_self_reference() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("B2", "=B2+1")
            .unwrap();
        let engine = FormulaEngine::new();
        assert_eq!(
            engine.evaluate_formula("=B2+1", &wb, CellKey::new(0, 1, 1)).unwrap(),
            Value::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_engines_are_independent() {
        let mut custom = FormulaEngine::new();
        custom.functions_mut().unregister("SUM");
        let wb = Workbook::new();
        let key = CellKey::new(0, 0, 0);
        assert_eq!(
            custom.evaluate_formula("=SUM(1,2)", &wb, key).unwrap(),
            Value::Error(CellError::Name)
        );
        assert_eq!(
            FormulaEngine::new().evaluate_formula("=SUM(1,2)", &wb, key).unwrap(),
            Value::Number(3.0)
        );
    }
}
