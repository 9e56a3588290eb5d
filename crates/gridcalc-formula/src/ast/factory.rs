//! AST node factories
//!
//! Each factory recognises one shape of lexer node. The builder offers every
//! node to the registered factories from the highest z-index down and keeps
//! the first result, so an embedder can add a factory that claims nodes ahead
//! of (or behind) the built-in ones.

use gridcalc_core::CellError;
use lazy_regex::regex_is_match;

use super::AstNode;
use crate::engine::FormulaEngine;
use crate::error::ParseError;
use crate::functions::FunctionRegistry;
use crate::lexer::{LexerNode, LexerNodeKind};
use crate::reference::ReferenceObject;
use crate::token::{
    z_index, OperatorToken, PrefixToken, SuffixToken, ERROR_PREFIX, RANGE_SEPARATOR, STRING_QUOTE,
};
use crate::value::Value;

/// Turns one kind of [`LexerNode`] into an [`AstNode`]
pub trait AstNodeFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Priority; higher values are tried first
    fn z_index(&self) -> u16;

    /// `Ok(None)` when the node is not this factory's shape
    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError>;
}

/// Recursive driver handed to factories so they can build their children
pub struct AstBuilder<'a> {
    engine: &'a FormulaEngine,
    source: &'a str,
}

impl<'a> AstBuilder<'a> {
    pub fn new(engine: &'a FormulaEngine, source: &'a str) -> Self {
        Self { engine, source }
    }

    pub fn engine(&self) -> &FormulaEngine {
        self.engine
    }

    pub fn functions(&self) -> &FunctionRegistry {
        self.engine.functions()
    }

    /// Build a node with the first factory that accepts it
    pub fn build(&self, node: &LexerNode) -> Result<AstNode, ParseError> {
        for factory in self.engine.factories() {
            if let Some(ast) = factory.check_and_create(node, self)? {
                return Ok(ast);
            }
        }
        Err(ParseError::UnexpectedToken {
            token: node.token().to_string(),
            position: node.span().start,
        })
    }

    pub fn build_children(&self, node: &LexerNode) -> Result<Vec<AstNode>, ParseError> {
        node.children().iter().map(|child| self.build(child)).collect()
    }

    pub fn build_child(&self, node: &LexerNode, index: usize) -> Result<AstNode, ParseError> {
        let child = node.children().get(index).ok_or(ParseError::UnexpectedEnd)?;
        self.build(child)
    }

    /// Formula text the node was lexed from
    pub fn source_text(&self, node: &LexerNode) -> String {
        let span = node.span();
        self.source
            .get(span.start..span.end)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(node.token())
            .to_string()
    }

    /// Node for an operator whose backing function is missing
    fn missing_function(&self, node: &LexerNode, function: &str) -> AstNode {
        tracing::error!(function, "operator function is not registered");
        AstNode::Error {
            error: CellError::Name,
            source: self.source_text(node),
        }
    }
}

struct RootFactory;

impl AstNodeFactory for RootFactory {
    fn name(&self) -> &'static str {
        "root"
    }

    fn z_index(&self) -> u16 {
        z_index::ROOT
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Root {
            return Ok(None);
        }
        Ok(Some(AstNode::Root(Box::new(builder.build_child(node, 0)?))))
    }
}

struct FunctionFactory;

impl AstNodeFactory for FunctionFactory {
    fn name(&self) -> &'static str {
        "function"
    }

    fn z_index(&self) -> u16 {
        z_index::FUNCTION
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Function {
            return Ok(None);
        }
        let args = builder.build_children(node)?;
        match builder.functions().get(node.token()) {
            Some(executor) => Ok(Some(AstNode::Function {
                name: executor.name.to_string(),
                executor,
                args,
            })),
            None => {
                tracing::debug!(function = node.token(), "unknown function");
                Ok(Some(AstNode::Error {
                    error: CellError::Name,
                    source: builder.source_text(node),
                }))
            }
        }
    }
}

struct GroupFactory;

impl AstNodeFactory for GroupFactory {
    fn name(&self) -> &'static str {
        "group"
    }

    fn z_index(&self) -> u16 {
        z_index::GROUP
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Group {
            return Ok(None);
        }
        builder.build_child(node, 0).map(Some)
    }
}

struct PrefixFactory;

impl AstNodeFactory for PrefixFactory {
    fn name(&self) -> &'static str {
        "prefix"
    }

    fn z_index(&self) -> u16 {
        z_index::PREFIX
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Prefix {
            return Ok(None);
        }
        let Some(op) = PrefixToken::from_symbol(node.token()) else {
            return Ok(None);
        };
        let operand = Box::new(builder.build_child(node, 0)?);
        let executor = match op {
            PrefixToken::Minus => {
                let name = OperatorToken::Minus.function_name();
                match builder.functions().get(name) {
                    Some(executor) => Some(executor),
                    None => return Ok(Some(builder.missing_function(node, name))),
                }
            }
            PrefixToken::At => None,
        };
        Ok(Some(AstNode::Prefix { op, executor, operand }))
    }
}

struct SuffixFactory;

impl AstNodeFactory for SuffixFactory {
    fn name(&self) -> &'static str {
        "suffix"
    }

    fn z_index(&self) -> u16 {
        z_index::SUFFIX
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Suffix {
            return Ok(None);
        }
        let Some(op) = SuffixToken::from_symbol(node.token()) else {
            return Ok(None);
        };
        let operand = Box::new(builder.build_child(node, 0)?);
        Ok(Some(match builder.functions().get(op.function_name()) {
            Some(executor) => AstNode::Suffix { op, executor, operand },
            None => builder.missing_function(node, op.function_name()),
        }))
    }
}

struct OperatorFactory;

impl AstNodeFactory for OperatorFactory {
    fn name(&self) -> &'static str {
        "operator"
    }

    fn z_index(&self) -> u16 {
        z_index::OPERATOR
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Infix {
            return Ok(None);
        }
        let left = builder.build_child(node, 0)?;
        let right = builder.build_child(node, 1)?;

        if node.token().starts_with(RANGE_SEPARATOR) {
            if let (AstNode::Reference(a), AstNode::Reference(b)) = (&left, &right) {
                if let Some(joined) = a.union(b) {
                    return Ok(Some(AstNode::Reference(joined)));
                }
            }
            return Ok(Some(AstNode::Range {
                left: Box::new(left),
                right: Box::new(right),
            }));
        }

        let Some(op) = OperatorToken::from_symbol(node.token()) else {
            return Ok(None);
        };
        Ok(Some(match builder.functions().get(op.function_name()) {
            Some(executor) => AstNode::Operator {
                op,
                executor,
                left: Box::new(left),
                right: Box::new(right),
            },
            None => builder.missing_function(node, op.function_name()),
        }))
    }
}

struct ArrayFactory;

impl ArrayFactory {
    fn element(node: &LexerNode, builder: &AstBuilder<'_>) -> Result<Value, ParseError> {
        let built = builder.build(node)?;
        match built {
            AstNode::Value(v) if !v.is_array() => Ok(v),
            AstNode::Prefix {
                op: PrefixToken::Minus,
                operand,
                ..
            } => match *operand {
                AstNode::Value(Value::Number(n)) => Ok(Value::Number(-n)),
                _ => Err(ParseError::InvalidArrayElement(builder.source_text(node))),
            },
            _ => Err(ParseError::InvalidArrayElement(builder.source_text(node))),
        }
    }
}

impl AstNodeFactory for ArrayFactory {
    fn name(&self) -> &'static str {
        "array"
    }

    fn z_index(&self) -> u16 {
        z_index::ARRAY
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.kind() != LexerNodeKind::Array {
            return Ok(None);
        }
        let mut rows = Vec::with_capacity(node.children().len());
        for row in node.children() {
            let values = row
                .children()
                .iter()
                .map(|element| Self::element(element, builder))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(values);
        }
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(ParseError::RaggedArray);
        }
        Ok(Some(AstNode::Value(Value::Array(rows))))
    }
}

struct LiteralFactory;

impl AstNodeFactory for LiteralFactory {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn z_index(&self) -> u16 {
        z_index::LITERAL
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        _builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if !node.is_leaf() {
            return Ok(None);
        }
        let token = node.token();
        let value = if token.is_empty() {
            Value::Empty
        } else if let Some(inner) = token
            .strip_prefix(STRING_QUOTE)
            .and_then(|t| t.strip_suffix(STRING_QUOTE))
        {
            Value::String(inner.replace("\"\"", "\""))
        } else if token.starts_with(ERROR_PREFIX) {
            match CellError::parse(token) {
                Some(e) => Value::Error(e),
                None => {
                    return Err(ParseError::UnexpectedToken {
                        token: token.to_string(),
                        position: node.span().start,
                    })
                }
            }
        } else if token.eq_ignore_ascii_case("TRUE") {
            Value::Boolean(true)
        } else if token.eq_ignore_ascii_case("FALSE") {
            Value::Boolean(false)
        } else if token.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            match token.parse::<f64>() {
                // `1E999` overflows to infinity
                Ok(n) if !n.is_finite() => Value::Error(CellError::Num),
                Ok(n) => Value::Number(n),
                Err(_) => return Ok(None),
            }
        } else {
            return Ok(None);
        };
        Ok(Some(AstNode::Value(value)))
    }
}

struct ReferenceFactory;

impl AstNodeFactory for ReferenceFactory {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn z_index(&self) -> u16 {
        z_index::REFERENCE
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        _builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if !node.is_leaf() {
            return Ok(None);
        }
        Ok(ReferenceObject::parse(node.token()).map(AstNode::Reference))
    }
}

struct NameFactory;

impl AstNodeFactory for NameFactory {
    fn name(&self) -> &'static str {
        "name"
    }

    fn z_index(&self) -> u16 {
        z_index::NAME
    }

    fn check_and_create(
        &self,
        node: &LexerNode,
        _builder: &AstBuilder<'_>,
    ) -> Result<Option<AstNode>, ParseError> {
        if node.is_leaf() && regex_is_match!(r"^[A-Za-z_\\][\w.]*$", node.token()) {
            return Ok(Some(AstNode::Name(node.token().to_string())));
        }
        Ok(None)
    }
}

/// The built-in factories, highest z-index first
pub fn default_factories() -> Vec<Box<dyn AstNodeFactory>> {
    vec![
        Box::new(RootFactory),
        Box::new(FunctionFactory),
        Box::new(GroupFactory),
        Box::new(PrefixFactory),
        Box::new(SuffixFactory),
        Box::new(OperatorFactory),
        Box::new(ArrayFactory),
        Box::new(LiteralFactory),
        Box::new(ReferenceFactory),
        Box::new(NameFactory),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::reference::ReferenceTarget;
    use crate::token::PrefixToken;
    use pretty_assertions::assert_eq;

    fn parse(formula: &str) -> AstNode {
        let AstNode::Root(child) = FormulaEngine::new().parse(formula).unwrap() else {
            panic!("parse should return a root");
        };
        *child
    }

    #[test]
    fn test_factories_are_ordered() {
        let engine = FormulaEngine::new();
        let order: Vec<u16> = engine.factories().iter().map(|f| f.z_index()).collect();
        let mut sorted = order.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("=1.5"), AstNode::Value(Value::Number(1.5)));
        assert_eq!(parse("=\"a\"\"b\""), AstNode::Value(Value::from("a\"b")));
        assert_eq!(parse("=true"), AstNode::Value(Value::Boolean(true)));
        assert_eq!(parse("=#n/a"), AstNode::Value(Value::Error(CellError::Na)));
    }

    #[test]
    fn test_overflowing_number_literal() {
        let engine = FormulaEngine::new();
        assert_eq!(parse("=1E999"), AstNode::Value(Value::Error(CellError::Num)));
        assert_eq!(
            parse("={1,1E999}"),
            AstNode::Value(Value::Array(vec![vec![
                Value::Number(1.0),
                Value::Error(CellError::Num)
            ]]))
        );

        let ast = engine.parse("=1E999+1").unwrap();
        let printed = ast.to_string();
        assert_eq!(printed, "=#NUM!+1");
        assert_eq!(engine.parse(&printed).unwrap(), ast);
    }

    #[test]
    fn test_references_fold_through_range_operator() {
        assert!(matches!(parse("=A1:B2"), AstNode::Reference(r) if r.is_range()));
        assert!(matches!(parse("=A1:A2:B5"), AstNode::Reference(r) if r.is_range()));
        assert!(matches!(parse("=A1:INDEX(B1:B3,2)"), AstNode::Range { .. }));
        assert!(matches!(parse("=Rate"), AstNode::Name(n) if n == "Rate"));
        match parse("=Sales[Amount]") {
            AstNode::Reference(r) => assert_eq!(
                r.target(),
                &ReferenceTarget::Table {
                    name: "Sales".into(),
                    column: Some("Amount".into())
                }
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function_becomes_name_error() {
        assert_eq!(
            parse("=FOOBAR(1)"),
            AstNode::Error {
                error: CellError::Name,
                source: "FOOBAR(1)".into()
            }
        );
    }

    #[test]
    fn test_prefix_minus_without_minus_function() {
        let mut registry = FunctionRegistry::new();
        registry.unregister("MINUS");
        let engine = FormulaEngine::with_registry(registry);

        let ast = engine.parse("=-5").unwrap();
        assert_eq!(ast.to_string(), "=-5");
        let AstNode::Root(child) = ast else { unreachable!() };
        assert!(matches!(*child, AstNode::Error { error: CellError::Name, .. }));

        let AstNode::Root(child) = FormulaEngine::new().parse("=-5").unwrap() else {
            panic!("expected root");
        };
        assert!(matches!(
            *child,
            AstNode::Prefix { op: PrefixToken::Minus, executor: Some(_), .. }
        ));
    }

    #[test]
    fn test_array_constants() {
        assert_eq!(
            parse("={1,-2;3,4}"),
            AstNode::Value(Value::Array(vec![
                vec![Value::Number(1.0), Value::Number(-2.0)],
                vec![Value::Number(3.0), Value::Number(4.0)],
            ]))
        );
        let engine = FormulaEngine::new();
        assert_eq!(engine.parse("={1,2;3}"), Err(ParseError::RaggedArray));
        assert_eq!(
            engine.parse("={1,A1}"),
            Err(ParseError::InvalidArrayElement("A1".into()))
        );
    }

    struct ShoutFactory;

    impl AstNodeFactory for ShoutFactory {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn z_index(&self) -> u16 {
            z_index::LITERAL + 1
        }

        fn check_and_create(
            &self,
            node: &LexerNode,
            _builder: &AstBuilder<'_>,
        ) -> Result<Option<AstNode>, ParseError> {
            if node.is_leaf() && node.token().eq_ignore_ascii_case("YES") {
                return Ok(Some(AstNode::Value(Value::Boolean(true))));
            }
            Ok(None)
        }
    }

    #[test]
    fn test_custom_factory_takes_priority_over_names() {
        let mut engine = FormulaEngine::new();
        assert!(matches!(parse("=yes"), AstNode::Name(_)));
        engine.register_factory(Box::new(ShoutFactory));
        assert_eq!(
            engine.parse("=yes").unwrap(),
            AstNode::Root(Box::new(AstNode::Value(Value::Boolean(true))))
        );
    }
}
