//! Functions backing the infix, prefix and suffix operators

use std::cmp::Ordering;

use gridcalc_core::CellError;

use super::{bounded_text, finite, value};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

/// Read both operands and combine them element-wise as numbers
fn arithmetic(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    op: fn(f64, f64) -> Value,
) -> EvalResult<Value> {
    let (left, right) = (value(args, 0, ctx)?, value(args, 1, ctx)?);
    Ok(Value::broadcast(&left, &right, |a, b| {
        match (a.to_number(), b.to_number()) {
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
            (Ok(x), Ok(y)) => op(x, y),
        }
    }))
}

fn comparison(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    test: fn(Ordering) -> bool,
) -> EvalResult<Value> {
    let (left, right) = (value(args, 0, ctx)?, value(args, 1, ctx)?);
    Ok(Value::broadcast(&left, &right, |a, b| match a.compare(b) {
        Ok(ordering) => Value::Boolean(test(ordering)),
        Err(e) => Value::Error(e),
    }))
}

/// `a + b`
pub fn fn_plus(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    arithmetic(args, ctx, |x, y| finite(x + y))
}

/// `a - b`; prefix negation is `MINUS(0, x)`
pub fn fn_minus(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    arithmetic(args, ctx, |x, y| finite(x - y))
}

pub fn fn_multiply(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    arithmetic(args, ctx, |x, y| finite(x * y))
}

pub fn fn_divide(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    arithmetic(args, ctx, |x, y| {
        if y == 0.0 {
            Value::Error(CellError::Div0)
        } else {
            finite(x / y)
        }
    })
}

/// `a ^ b`; `0^0` is `#NUM!` and `0^-n` is `#DIV/0!`
pub fn fn_pow(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    arithmetic(args, ctx, power)
}

pub(crate) fn power(base: f64, exponent: f64) -> Value {
    if base == 0.0 && exponent == 0.0 {
        Value::Error(CellError::Num)
    } else if base == 0.0 && exponent < 0.0 {
        Value::Error(CellError::Div0)
    } else {
        finite(base.powf(exponent))
    }
}

/// `a & b`
pub fn fn_ampersand(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let (left, right) = (value(args, 0, ctx)?, value(args, 1, ctx)?);
    Ok(Value::broadcast(&left, &right, |a, b| {
        match (a.to_text(), b.to_text()) {
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
            (Ok(x), Ok(y)) => bounded_text(x + &y),
        }
    }))
}

pub fn fn_eq(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_eq)
}

pub fn fn_ne(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_ne)
}

pub fn fn_lt(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_lt)
}

pub fn fn_lte(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_le)
}

pub fn fn_gt(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_gt)
}

pub fn fn_gte(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    comparison(args, ctx, Ordering::is_ge)
}

/// `x%`
pub fn fn_percent(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    super::lift_number(args, ctx, |n| Value::Number(n / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn call(
        f: fn(&[Operand], &RuntimeContext<'_>) -> EvalResult<Value>,
        a: Value,
        b: Value,
    ) -> Value {
        let engine = FormulaEngine::new();
        let wb = Workbook::new();
        let ctx = engine.context(&wb, CellKey::new(0, 0, 0));
        f(&[Operand::Value(a), Operand::Value(b)], &ctx).unwrap()
    }

    #[test]
    fn test_arithmetic_coercion() {
        assert_eq!(call(fn_plus, Value::Boolean(true), Value::from("2")), Value::Number(3.0));
        assert_eq!(
            call(fn_minus, Value::Number(0.0), Value::from("abc")),
            Value::Error(CellError::Value)
        );
        assert_eq!(call(fn_multiply, Value::Empty, Value::Number(4.0)), Value::Number(0.0));
        assert_eq!(
            call(fn_divide, Value::Number(1.0), Value::Empty),
            Value::Error(CellError::Div0)
        );
        assert_eq!(call(fn_pow, Value::Number(2.0), Value::Number(10.0)), Value::Number(1024.0));
        assert_eq!(
            call(fn_pow, Value::Number(0.0), Value::Number(0.0)),
            Value::Error(CellError::Num)
        );
        assert_eq!(
            call(fn_pow, Value::Number(-8.0), Value::Number(0.5)),
            Value::Error(CellError::Num)
        );
    }

    #[test]
    fn test_first_error_wins() {
        assert_eq!(
            call(fn_plus, Value::Error(CellError::Ref), Value::Error(CellError::Div0)),
            Value::Error(CellError::Ref)
        );
        assert_eq!(
            call(fn_ampersand, Value::from("a"), Value::Error(CellError::Na)),
            Value::Error(CellError::Na)
        );
    }

    #[test]
    fn test_concatenation_display_form() {
        assert_eq!(call(fn_ampersand, Value::Number(1.0), Value::from("-")), Value::from("1-"));
        assert_eq!(
            call(fn_ampersand, Value::Boolean(true), Value::Number(0.5)),
            Value::from("TRUE0.5")
        );
        assert_eq!(call(fn_ampersand, Value::Empty, Value::Empty), Value::from(""));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call(fn_gt, Value::Number(1.0), Value::Number(2.0)), Value::Boolean(false));
        assert_eq!(call(fn_eq, Value::from("a"), Value::from("A")), Value::Boolean(true));
        assert_eq!(call(fn_lt, Value::Number(5.0), Value::from("0")), Value::Boolean(true));
        assert_eq!(call(fn_ne, Value::Empty, Value::Boolean(false)), Value::Boolean(false));
        assert_eq!(call(fn_gte, Value::Empty, Value::Number(0.0)), Value::Boolean(true));
    }

    #[test]
    fn test_broadcast_over_arrays() {
        let column = Value::Array(vec![vec![Value::Number(1.0)], vec![Value::Number(4.0)]]);
        assert_eq!(
            call(fn_gt, column, Value::Number(2.0)),
            Value::Array(vec![vec![Value::Boolean(false)], vec![Value::Boolean(true)]])
        );
    }
}
