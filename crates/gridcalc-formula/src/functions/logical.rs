//! Logical functions

use gridcalc_core::CellError;

use super::{for_each_argument, scalar, try_value, value};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

/// A chosen branch; a blank branch reads as 0
fn branch(args: &[Operand], index: usize, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(match value(args, index, ctx)? {
        Value::Empty => Value::Number(0.0),
        v => v,
    })
}

/// IF(condition, [then], [else])
pub fn fn_if(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let condition = try_value!(scalar(args, 0, ctx)?.to_bool());
    if condition {
        if args.len() < 2 {
            return Ok(Value::Boolean(true));
        }
        branch(args, 1, ctx)
    } else {
        if args.len() < 3 {
            return Ok(Value::Boolean(false));
        }
        branch(args, 2, ctx)
    }
}

/// Booleans gathered from the arguments; text inside references is ignored
fn truth_values(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<Vec<bool>, CellError>> {
    let mut values = Vec::new();
    let walked = for_each_argument(args, ctx, |item, direct| {
        match item {
            Value::Error(e) => return Err(*e),
            Value::Boolean(b) => values.push(*b),
            Value::Number(n) => values.push(*n != 0.0),
            Value::String(_) if direct => values.push(item.to_bool()?),
            _ => {}
        }
        Ok(())
    })?;
    Ok(walked.and_then(|_| {
        if values.is_empty() {
            Err(CellError::Value)
        } else {
            Ok(values)
        }
    }))
}

/// AND function
pub fn fn_and(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let values = try_value!(truth_values(args, ctx)?);
    Ok(Value::Boolean(values.iter().all(|b| *b)))
}

/// OR function
pub fn fn_or(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let values = try_value!(truth_values(args, ctx)?);
    Ok(Value::Boolean(values.iter().any(|b| *b)))
}

/// XOR: true when an odd number of arguments are true
pub fn fn_xor(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let values = try_value!(truth_values(args, ctx)?);
    Ok(Value::Boolean(values.iter().filter(|b| **b).count() % 2 == 1))
}

/// NOT function
pub fn fn_not(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(value(args, 0, ctx)?.map(|v| match v.to_bool() {
        Ok(b) => Value::Boolean(!b),
        Err(e) => Value::Error(e),
    }))
}

fn replace_errors(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    catches: fn(CellError) -> bool,
) -> EvalResult<Value> {
    let tested = value(args, 0, ctx)?;
    let fallback = match scalar(args, 1, ctx)? {
        Value::Empty => Value::Number(0.0),
        v => v,
    };
    Ok(tested.map(|v| match v {
        Value::Error(e) if catches(*e) => fallback.clone(),
        Value::Empty => Value::Number(0.0),
        other => other.clone(),
    }))
}

/// IFERROR(value, fallback)
pub fn fn_iferror(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    replace_errors(args, ctx, |_| true)
}

/// IFNA(value, fallback): only `#N/A` is replaced
pub fn fn_ifna(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    replace_errors(args, ctx, |e| e == CellError::Na)
}

/// TRUE function
pub fn fn_true(_args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(true))
}

/// FALSE function
pub fn fn_false(_args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(wb: &Workbook, formula: &str) -> Value {
        FormulaEngine::new()
            .evaluate_formula(formula, wb, CellKey::new(0, 10, 10))
            .unwrap()
    }

    #[test]
    fn test_if() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", 2.0).unwrap();

        assert_eq!(eval(&wb, "=IF(A1>A2,\"yes\",\"no\")"), Value::from("no"));
        assert_eq!(eval(&wb, "=IF(A1<A2,\"yes\",\"no\")"), Value::from("yes"));
        assert_eq!(eval(&wb, "=IF(FALSE,1)"), Value::Boolean(false));
        assert_eq!(eval(&wb, "=IF(TRUE,B9,1)"), Value::Number(0.0));
        assert_eq!(eval(&wb, "=IF(\"maybe\",1,2)"), Value::Error(CellError::Value));
        assert_eq!(eval(&wb, "=IF(1/0,1,2)"), Value::Error(CellError::Div0));
    }

    #[test]
    fn test_if_does_not_read_untaken_branch_errors() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=IF(TRUE,1,1/0)"), Value::Number(1.0));
    }

    #[test]
    fn test_and_or_xor() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", true).unwrap();
        ws.set_cell_value("A2", "text").unwrap();
        ws.set_cell_value("A3", 0.0).unwrap();

        assert_eq!(eval(&wb, "=AND(TRUE,1)"), Value::Boolean(true));
        assert_eq!(eval(&wb, "=AND(A1:A3)"), Value::Boolean(false));
        assert_eq!(eval(&wb, "=OR(A1:A3)"), Value::Boolean(true));
        assert_eq!(eval(&wb, "=XOR(TRUE,TRUE,TRUE)"), Value::Boolean(true));
        assert_eq!(eval(&wb, "=AND(\"x\")"), Value::Error(CellError::Value));
        assert_eq!(eval(&wb, "=OR(A2)"), Value::Error(CellError::Value));
        assert_eq!(eval(&wb, "=OR(\"true\")"), Value::Boolean(true));
    }

    #[test]
    fn test_error_handlers() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=IFERROR(1/0,\"oops\")"), Value::from("oops"));
        assert_eq!(eval(&wb, "=IFERROR(5,\"oops\")"), Value::Number(5.0));
        assert_eq!(eval(&wb, "=IFNA(NA(),0)"), Value::Number(0.0));
        assert_eq!(eval(&wb, "=IFNA(1/0,0)"), Value::Error(CellError::Div0));
        assert_eq!(eval(&wb, "=NOT(0)"), Value::Boolean(true));
        assert_eq!(eval(&wb, "=TRUE()"), Value::Boolean(true));
    }
}
