//! Abstract syntax tree
//!
//! [`AstNode`] is built from a [`LexerNode`](crate::lexer::LexerNode) tree by
//! the factories in [`factory`]. Operators carry the registry function that
//! implements them, resolved once at build time. Printing a node gives
//! canonical formula text that parses back to an equal tree.

pub mod factory;

use std::fmt;
use std::sync::Arc;

use gridcalc_core::CellError;

use crate::functions::FunctionDef;
use crate::reference::ReferenceObject;
use crate::token::{
    OperatorToken, PrefixToken, SuffixToken, FORMULA_PREFIX, PREFIX_PRECEDENCE, RANGE_PRECEDENCE,
    SUFFIX_PRECEDENCE,
};
use crate::value::Value;

pub use factory::{default_factories, AstBuilder, AstNodeFactory};

/// Precedence of nodes that never need parentheses
const ATOM_PRECEDENCE: u8 = 9;

/// A node of a parsed formula
#[derive(Debug, Clone)]
pub enum AstNode {
    /// Top of every tree; exactly one child
    Root(Box<AstNode>),
    /// Number, text, boolean, error or array constant
    Value(Value),
    Reference(ReferenceObject),
    /// Defined name, resolved when evaluated
    Name(String),
    /// `-x` runs the executor as `MINUS(0, x)`; `@x` has no executor
    Prefix {
        op: PrefixToken,
        executor: Option<Arc<FunctionDef>>,
        operand: Box<AstNode>,
    },
    Suffix {
        op: SuffixToken,
        executor: Arc<FunctionDef>,
        operand: Box<AstNode>,
    },
    /// Binary operator backed by a registry function
    Operator {
        op: OperatorToken,
        executor: Arc<FunctionDef>,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    /// `:` between operands that are not both literal references
    Range { left: Box<AstNode>, right: Box<AstNode> },
    Function {
        /// Canonical registry name
        name: String,
        executor: Arc<FunctionDef>,
        args: Vec<AstNode>,
    },
    /// Something that parsed but cannot run, such as an unknown function;
    /// evaluates to `error` and prints as `source`
    Error { error: CellError, source: String },
}

impl AstNode {
    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&AstNode> {
        match self {
            AstNode::Root(child) => vec![child.as_ref()],
            AstNode::Prefix { operand, .. } | AstNode::Suffix { operand, .. } => {
                vec![operand.as_ref()]
            }
            AstNode::Operator { left, right, .. } | AstNode::Range { left, right } => {
                vec![left.as_ref(), right.as_ref()]
            }
            AstNode::Function { args, .. } => args.iter().collect(),
            AstNode::Value(_)
            | AstNode::Reference(_)
            | AstNode::Name(_)
            | AstNode::Error { .. } => Vec::new(),
        }
    }

    /// Short node type name for logs and faults
    pub fn kind_name(&self) -> &'static str {
        match self {
            AstNode::Root(_) => "root",
            AstNode::Value(_) => "value",
            AstNode::Reference(_) => "reference",
            AstNode::Name(_) => "name",
            AstNode::Prefix { .. } => "prefix",
            AstNode::Suffix { .. } => "suffix",
            AstNode::Operator { .. } => "operator",
            AstNode::Range { .. } => "range",
            AstNode::Function { .. } => "function",
            AstNode::Error { .. } => "error",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            AstNode::Operator { op, .. } => op.precedence(),
            AstNode::Prefix { .. } => PREFIX_PRECEDENCE,
            AstNode::Suffix { .. } => SUFFIX_PRECEDENCE,
            AstNode::Range { .. } => RANGE_PRECEDENCE,
            AstNode::Value(Value::Number(n)) if *n < 0.0 => PREFIX_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Whether any function in the tree must run on every recalculation
    pub fn is_volatile(&self) -> bool {
        let volatile_here = match self {
            AstNode::Function { executor, .. } => executor.volatile,
            _ => false,
        };
        volatile_here || self.children().into_iter().any(AstNode::is_volatile)
    }

    /// Every reference written in the formula, in source order
    pub fn references(&self) -> Vec<&ReferenceObject> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let AstNode::Reference(r) = node {
                out.push(r);
            }
        });
        out
    }

    /// Every defined name used in the formula, in source order
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let AstNode::Name(name) = node {
                out.push(name.as_str());
            }
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a AstNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &AstNode, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

impl PartialEq for AstNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AstNode::Root(a), AstNode::Root(b)) => a == b,
            (AstNode::Value(a), AstNode::Value(b)) => a == b,
            (AstNode::Reference(a), AstNode::Reference(b)) => a == b,
            (AstNode::Name(a), AstNode::Name(b)) => a.eq_ignore_ascii_case(b),
            (
                AstNode::Prefix { op: a, executor: ea, operand: oa },
                AstNode::Prefix { op: b, executor: eb, operand: ob },
            ) => a == b && ea.as_ref().map(|e| e.name) == eb.as_ref().map(|e| e.name) && oa == ob,
            (
                AstNode::Suffix { op: a, executor: ea, operand: oa },
                AstNode::Suffix { op: b, executor: eb, operand: ob },
            ) => a == b && ea.name == eb.name && oa == ob,
            (
                AstNode::Operator { op: a, executor: ea, left: la, right: ra },
                AstNode::Operator { op: b, executor: eb, left: lb, right: rb },
            ) => a == b && ea.name == eb.name && la == lb && ra == rb,
            (AstNode::Range { left: la, right: ra }, AstNode::Range { left: lb, right: rb }) => {
                la == lb && ra == rb
            }
            (
                AstNode::Function { name: a, args: aa, .. },
                AstNode::Function { name: b, args: ab, .. },
            ) => a == b && aa == ab,
            (AstNode::Error { error: a, source: sa }, AstNode::Error { error: b, source: sb }) => {
                a == b && sa == sb
            }
            _ => false,
        }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Empty => Ok(()),
        Value::Number(n) => write!(f, "{}", n),
        Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
        Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        Value::Error(e) => f.write_str(e.as_str()),
        Value::Array(rows) => {
            f.write_str("{")?;
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                for (j, item) in row.iter().enumerate() {
                    if j > 0 {
                        f.write_str(",")?;
                    }
                    write_value(f, item)?;
                }
            }
            f.write_str("}")
        }
    }
}

/// Canonical formula text; the root adds the leading `=`
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Root(child) => write!(f, "{}{}", FORMULA_PREFIX, child),
            AstNode::Value(value) => write_value(f, value),
            AstNode::Reference(r) => write!(f, "{}", r),
            AstNode::Name(name) => f.write_str(name),
            AstNode::Prefix { op, operand, .. } => {
                f.write_str(op.symbol())?;
                write_child(f, operand, operand.precedence() < PREFIX_PRECEDENCE)
            }
            AstNode::Suffix { op, operand, .. } => {
                write_child(f, operand, operand.precedence() < SUFFIX_PRECEDENCE)?;
                f.write_str(op.symbol())
            }
            AstNode::Operator { op, left, right, .. } => {
                let precedence = op.precedence();
                write_child(f, left, left.precedence() < precedence)?;
                f.write_str(op.symbol())?;
                write_child(f, right, right.precedence() <= precedence)
            }
            AstNode::Range { left, right } => {
                write_child(f, left, left.precedence() < ATOM_PRECEDENCE)?;
                f.write_str(":")?;
                write_child(f, right, right.precedence() < ATOM_PRECEDENCE)
            }
            AstNode::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            AstNode::Error { source, .. } => f.write_str(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::FormulaEngine;
    use pretty_assertions::assert_eq;

    fn canonical(formula: &str) -> String {
        FormulaEngine::new().parse(formula).unwrap().to_string()
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(canonical("= 1 + 2 * 3"), "=1+2*3");
        assert_eq!(canonical("=(1+2)*3"), "=(1+2)*3");
        assert_eq!(canonical("=((1))"), "=1");
        assert_eq!(canonical("=1-(2-3)"), "=1-(2-3)");
        assert_eq!(canonical("=(1-2)-3"), "=1-2-3");
        assert_eq!(canonical("=-(A1+1)"), "=-(A1+1)");
        assert_eq!(canonical("=2^-1"), "=2^-1");
        assert_eq!(canonical("=sum( a1:b2 , 3 )"), "=SUM(A1:B2,3)");
        assert_eq!(canonical("=\"say \"\"hi\"\"\""), "=\"say \"\"hi\"\"\"");
        assert_eq!(canonical("={1,-2;\"a\",TRUE}"), "={1,-2;\"a\",TRUE}");
        assert_eq!(canonical("=IF(A1,,2)"), "=IF(A1,,2)");
        assert_eq!(canonical("=50%"), "=50%");
        assert_eq!(canonical("=foobar(1)"), "=foobar(1)");
    }

    #[test]
    fn test_references_and_names() {
        let engine = FormulaEngine::new();
        let ast = engine.parse("=SUM(A1:A3, Data!B2) + Rate * Tax").unwrap();
        let refs: Vec<String> = ast.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["A1:A3", "Data!B2"]);
        assert_eq!(ast.names(), vec!["Rate", "Tax"]);
    }

    #[test]
    fn test_volatility() {
        let engine = FormulaEngine::new();
        assert!(engine.parse("=1+RAND()").unwrap().is_volatile());
        assert!(engine.parse("=IF(TRUE, NOW())").unwrap().is_volatile());
        assert!(!engine.parse("=SUM(A1:A2)").unwrap().is_volatile());
    }
}
