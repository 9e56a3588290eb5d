//! Tree evaluation
//!
//! Nodes are evaluated post-order: every child, left to right, then the node
//! itself with its children's results as operands. There is no
//! short-circuiting, so `IF(TRUE, 1, 1/0)` still computes `1/0` and discards
//! it.

use gridcalc_core::CellError;

use crate::ast::AstNode;
use crate::error::{EngineFault, EvalResult};
use crate::runtime::RuntimeContext;
use crate::token::PrefixToken;
use crate::value::{Operand, Value};

/// Evaluate a node to a value, reading any reference it produces
pub fn evaluate(node: &AstNode, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    evaluate_operand(node, ctx)?.to_value(ctx)
}

/// Evaluate a node, leaving a reference result unread
pub fn evaluate_operand(node: &AstNode, ctx: &RuntimeContext<'_>) -> EvalResult<Operand> {
    let children = node.children();
    let mut operands = Vec::with_capacity(children.len());
    for child in children {
        operands.push(evaluate_operand(child, ctx)?);
    }
    execute(node, &operands, ctx)
}

fn operand<'o>(node: &AstNode, operands: &'o [Operand], index: usize) -> EvalResult<&'o Operand> {
    operands.get(index).ok_or(EngineFault::MissingOperand {
        node: node.kind_name(),
        index,
    })
}

/// Run a single node on already evaluated operands
pub fn execute(
    node: &AstNode,
    operands: &[Operand],
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Operand> {
    match node {
        AstNode::Root(_) => Ok(operand(node, operands, 0)?.clone()),
        AstNode::Value(value) => Ok(Operand::Value(value.clone())),
        AstNode::Reference(r) => Ok(Operand::Reference(r.clone())),
        AstNode::Name(name) => ctx.resolve_name(name),
        AstNode::Error { error, .. } => Ok(Value::Error(*error).into()),

        AstNode::Prefix { op: PrefixToken::Minus, executor, .. } => {
            let x = operand(node, operands, 0)?.clone();
            let executor = executor
                .as_ref()
                .ok_or_else(|| EngineFault::MissingOperatorFunction("MINUS".to_string()))?;
            Ok(executor.call(&[Value::Number(0.0).into(), x], ctx)?.into())
        }
        AstNode::Prefix { op: PrefixToken::At, .. } => match operand(node, operands, 0)? {
            Operand::Reference(r) => Ok(r.intersect(ctx)?.into()),
            Operand::Value(_) => Ok(Value::Error(CellError::Value).into()),
        },

        AstNode::Suffix { executor, .. } => {
            let x = operand(node, operands, 0)?;
            Ok(executor.call(std::slice::from_ref(x), ctx)?.into())
        }
        AstNode::Operator { executor, .. } => {
            operand(node, operands, 1)?;
            Ok(executor.call(&operands[..2], ctx)?.into())
        }
        AstNode::Function { executor, args, .. } => {
            if args.len() > operands.len() {
                return Err(EngineFault::MissingOperand {
                    node: node.kind_name(),
                    index: operands.len(),
                });
            }
            Ok(executor.call(&operands[..args.len()], ctx)?.into())
        }
        AstNode::Range { .. } => {
            let left = operand(node, operands, 0)?;
            let right = operand(node, operands, 1)?;
            Ok(match (left, right) {
                (Operand::Reference(a), Operand::Reference(b)) => match a.union(b) {
                    Some(joined) => Operand::Reference(joined),
                    None => Value::Error(CellError::Ref).into(),
                },
                _ => Value::Error(CellError::Value).into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn sheet() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", 2.0).unwrap();
        ws.set_cell_value("B2", "two").unwrap();
        wb
    }

    fn eval_at(formula: &str, key: CellKey) -> Value {
        FormulaEngine::new()
            .evaluate_formula(formula, &sheet(), key)
            .unwrap()
    }

    fn eval(formula: &str) -> Value {
        eval_at(formula, CellKey::new(0, 9, 9))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("=1+2*3"), Value::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), Value::Number(9.0));
        assert_eq!(eval("=2^3^2"), Value::Number(64.0));
        assert_eq!(eval("=-2^2"), Value::Number(4.0));
        assert_eq!(eval("=50%*4"), Value::Number(2.0));
        assert_eq!(eval("=1/0"), Value::Error(CellError::Div0));
    }

    #[test]
    fn test_negation_goes_through_minus() {
        assert_eq!(eval("=-5"), Value::Number(-5.0));
        assert_eq!(eval("=-A2"), Value::Number(-2.0));
        assert_eq!(eval("=--A2"), Value::Number(2.0));
        assert_eq!(eval("=-\"abc\""), Value::Error(CellError::Value));
        assert_eq!(eval("=-\"3\""), Value::Number(-3.0));
    }

    #[test]
    fn test_references_and_ranges() {
        assert_eq!(eval("=SUM(A1:A2)"), Value::Number(3.0));
        assert_eq!(eval("=A1&\"-\"&A2"), Value::string("1-2"));
        assert_eq!(eval("=IF(A1>A2,\"yes\",\"no\")"), Value::string("no"));
        assert_eq!(eval("=Z99"), Value::Empty);
    }

    #[test]
    fn test_implicit_intersection() {
        let c = |row| CellKey::new(0, row, 1);
        assert_eq!(eval_at("=@2:2", c(0)), Value::string("two"));
        assert_eq!(eval_at("=@A1", c(0)), Value::Error(CellError::Value));
        assert_eq!(eval_at("=@A:A", c(1)), Value::Number(2.0));
        assert_eq!(eval_at("=@A1:A2", CellKey::new(0, 5, 0)), Value::Error(CellError::Value));
        assert_eq!(eval_at("=@(1+1)", c(0)), Value::Error(CellError::Value));
    }

    #[test]
    fn test_no_short_circuit_but_errors_are_discarded() {
        assert_eq!(eval("=IF(TRUE,1,1/0)"), Value::Number(1.0));
        assert_eq!(eval("=IFERROR(1/0,\"x\")"), Value::string("x"));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(eval("=FOOBAR(1)"), Value::Error(CellError::Name));
        assert_eq!(eval("=1+FOOBAR(1)"), Value::Error(CellError::Name));
    }

    #[test]
    fn test_missing_operands_are_faults() {
        let engine = FormulaEngine::new();
        let wb = sheet();
        let ctx = engine.context(&wb, CellKey::new(0, 0, 0));
        let ast = engine.parse("=1+2").unwrap();
        let AstNode::Root(op) = &ast else {
            panic!("expected root");
        };
        assert_eq!(
            execute(op, &[Value::Number(1.0).into()], &ctx),
            Err(EngineFault::MissingOperand { node: "operator", index: 1 })
        );
    }
}
