//! Information functions

use gridcalc_core::CellError;

use super::scalar;
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

fn test_value(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    test: fn(&Value) -> bool,
) -> EvalResult<Value> {
    Ok(Value::Boolean(test(&scalar(args, 0, ctx)?)))
}

pub fn fn_isblank(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, Value::is_empty)
}

pub fn fn_isnumber(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, |v| matches!(v, Value::Number(_)))
}

pub fn fn_istext(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, |v| matches!(v, Value::String(_)))
}

pub fn fn_islogical(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, |v| matches!(v, Value::Boolean(_)))
}

pub fn fn_iserror(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, Value::is_error)
}

/// ISERR: any error except `#N/A`
pub fn fn_iserr(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, |v| matches!(v.error(), Some(e) if e != CellError::Na))
}

pub fn fn_isna(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    test_value(args, ctx, |v| v.error() == Some(CellError::Na))
}

/// ISREF looks at the argument itself, not at what it refers to
pub fn fn_isref(args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(args[0].is_reference()))
}

pub fn fn_na(_args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Error(CellError::Na))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;

    fn eval(formula: &str) -> Value {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", "two").unwrap();
        FormulaEngine::new()
            .evaluate_formula(formula, &wb, CellKey::new(0, 10, 10))
            .unwrap()
    }

    #[test]
    fn test_type_predicates() {
        assert_eq!(eval("=ISBLANK(B1)"), Value::Boolean(true));
        assert_eq!(eval("=ISBLANK(A1)"), Value::Boolean(false));
        assert_eq!(eval("=ISNUMBER(A1)"), Value::Boolean(true));
        assert_eq!(eval("=ISNUMBER(\"1\")"), Value::Boolean(false));
        assert_eq!(eval("=ISTEXT(A2)"), Value::Boolean(true));
        assert_eq!(eval("=ISLOGICAL(1=1)"), Value::Boolean(true));
    }

    #[test]
    fn test_error_predicates() {
        assert_eq!(eval("=ISERROR(1/0)"), Value::Boolean(true));
        assert_eq!(eval("=ISERR(NA())"), Value::Boolean(false));
        assert_eq!(eval("=ISERR(1/0)"), Value::Boolean(true));
        assert_eq!(eval("=ISNA(NA())"), Value::Boolean(true));
        assert_eq!(eval("=NA()"), Value::Error(CellError::Na));
    }

    #[test]
    fn test_isref() {
        assert_eq!(eval("=ISREF(A1)"), Value::Boolean(true));
        assert_eq!(eval("=ISREF(A1:B2)"), Value::Boolean(true));
        assert_eq!(eval("=ISREF(1)"), Value::Boolean(false));
    }
}
