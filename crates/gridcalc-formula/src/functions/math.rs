//! Math functions

use gridcalc_core::CellError;
use rand::Rng;

use super::{collect_numbers, finite, for_each_argument, lift_number, number, try_value};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

/// SUM function
pub fn fn_sum(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let numbers = try_value!(collect_numbers(args, ctx)?);
    Ok(finite(numbers.iter().sum()))
}

/// PRODUCT function; no numbers at all gives 0
pub fn fn_product(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let numbers = try_value!(collect_numbers(args, ctx)?);
    if numbers.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(finite(numbers.iter().product()))
}

/// AVERAGE function
pub fn fn_average(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let numbers = try_value!(collect_numbers(args, ctx)?);
    if numbers.is_empty() {
        return Ok(Value::Error(CellError::Div0));
    }
    Ok(finite(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

/// MIN function
pub fn fn_min(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let numbers = try_value!(collect_numbers(args, ctx)?);
    Ok(Value::Number(numbers.into_iter().reduce(f64::min).unwrap_or(0.0)))
}

/// MAX function
pub fn fn_max(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let numbers = try_value!(collect_numbers(args, ctx)?);
    Ok(Value::Number(numbers.into_iter().reduce(f64::max).unwrap_or(0.0)))
}

/// COUNT: numbers in ranges, plus direct arguments that read as numbers
pub fn fn_count(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let mut count = 0usize;
    let walked = for_each_argument(args, ctx, |item, direct| {
        let counts = match item {
            Value::Number(_) => true,
            Value::Boolean(_) | Value::String(_) if direct => item.to_number().is_ok(),
            _ => false,
        };
        count += usize::from(counts);
        Ok(())
    })?;
    try_value!(walked);
    Ok(Value::Number(count as f64))
}

/// COUNTA: everything that is not blank, errors included
pub fn fn_counta(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let mut count = 0usize;
    let walked = for_each_argument(args, ctx, |item, _| {
        count += usize::from(!item.is_empty());
        Ok(())
    })?;
    try_value!(walked);
    Ok(Value::Number(count as f64))
}

/// COUNTBLANK: blank cells and empty text in a range
pub fn fn_countblank(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    if !args[0].is_reference() {
        return Ok(Value::Error(CellError::Value));
    }
    let area = args[0].to_value(ctx)?;
    let blanks = area
        .iter_scalars()
        .filter(|v| matches!(v, Value::Empty) || matches!(v, Value::String(s) if s.is_empty()))
        .count();
    Ok(Value::Number(blanks as f64))
}

/// ABS function
pub fn fn_abs(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_number(args, ctx, |n| Value::Number(n.abs()))
}

/// SIGN function
pub fn fn_sign(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_number(args, ctx, |n| {
        Value::Number(if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

/// Snap to 12 significant decimal digits so binary noise (2.675 stored as
/// 2.67499999...) does not decide the rounding direction
fn snap(x: f64) -> f64 {
    format!("{:.12e}", x).parse().unwrap_or(x)
}

fn round_with(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    mode: fn(f64) -> f64,
) -> EvalResult<Value> {
    let n = try_value!(number(args, 0, ctx)?);
    let digits = try_value!(number(args, 1, ctx)?).trunc() as i32;
    let factor = 10f64.powi(digits);
    let scaled = snap(n * factor);
    Ok(finite(mode(scaled) / factor))
}

/// ROUND: half away from zero
pub fn fn_round(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    round_with(args, ctx, f64::round)
}

/// ROUNDUP: away from zero
pub fn fn_roundup(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    round_with(args, ctx, |x| x.abs().ceil().copysign(x))
}

/// ROUNDDOWN: toward zero
pub fn fn_rounddown(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    round_with(args, ctx, f64::trunc)
}

/// INT: round down to the nearest integer
pub fn fn_int(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_number(args, ctx, |n| Value::Number(n.floor()))
}

/// MOD: result takes the sign of the divisor
pub fn fn_mod(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let n = try_value!(number(args, 0, ctx)?);
    let d = try_value!(number(args, 1, ctx)?);
    if d == 0.0 {
        return Ok(Value::Error(CellError::Div0));
    }
    Ok(finite(n - d * (n / d).floor()))
}

/// SQRT function
pub fn fn_sqrt(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_number(args, ctx, |n| {
        if n < 0.0 {
            Value::Error(CellError::Num)
        } else {
            Value::Number(n.sqrt())
        }
    })
}

/// POWER function
pub fn fn_power(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let base = try_value!(number(args, 0, ctx)?);
    let exponent = try_value!(number(args, 1, ctx)?);
    Ok(super::operators::power(base, exponent))
}

/// PI function
pub fn fn_pi(_args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

/// RAND function
pub fn fn_rand(_args: &[Operand], _ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN function
pub fn fn_randbetween(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let low = try_value!(number(args, 0, ctx)?).ceil();
    let high = try_value!(number(args, 1, ctx)?).floor();
    if low > high {
        return Ok(Value::Error(CellError::Num));
    }
    let n = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok(Value::Number(n as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(wb: &Workbook, formula: &str) -> Value {
        let engine = FormulaEngine::new();
        engine
            .evaluate_formula(formula, wb, CellKey::new(0, 10, 10))
            .unwrap()
    }

    fn sheet() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", 2.0).unwrap();
        ws.set_cell_value("A3", "text").unwrap();
        ws.set_cell_value("A4", true).unwrap();
        ws.set_cell_value("B1", "5").unwrap();
        wb
    }

    #[test]
    fn test_aggregates_skip_text_in_ranges() {
        let wb = sheet();
        assert_eq!(eval(&wb, "=SUM(A1:A5)"), Value::Number(3.0));
        assert_eq!(eval(&wb, "=SUM(A1:A2, \"4\", TRUE)"), Value::Number(8.0));
        assert_eq!(eval(&wb, "=SUM(B1)"), Value::Number(0.0));
        assert_eq!(eval(&wb, "=SUM(\"x\")"), Value::Error(CellError::Value));
        assert_eq!(eval(&wb, "=AVERAGE(A1:A4)"), Value::Number(1.5));
        assert_eq!(eval(&wb, "=AVERAGE(C1:C3)"), Value::Error(CellError::Div0));
        assert_eq!(eval(&wb, "=MIN(A1:A4)"), Value::Number(1.0));
        assert_eq!(eval(&wb, "=MAX(A1:A4, 7)"), Value::Number(7.0));
        assert_eq!(eval(&wb, "=MAX(C1:C3)"), Value::Number(0.0));
        assert_eq!(eval(&wb, "=PRODUCT(A1:A2, 4)"), Value::Number(8.0));
        assert_eq!(eval(&wb, "=SUM({1,2;3,4})"), Value::Number(10.0));
    }

    #[test]
    fn test_counting() {
        let wb = sheet();
        assert_eq!(eval(&wb, "=COUNT(A1:A5)"), Value::Number(2.0));
        assert_eq!(eval(&wb, "=COUNT(\"3\", \"x\", TRUE)"), Value::Number(2.0));
        assert_eq!(eval(&wb, "=COUNTA(A1:A5)"), Value::Number(4.0));
        assert_eq!(eval(&wb, "=COUNTBLANK(A1:A5)"), Value::Number(1.0));
        assert_eq!(eval(&wb, "=COUNTBLANK(5)"), Value::Error(CellError::Value));
    }

    #[test]
    fn test_errors_propagate_through_aggregates() {
        let mut wb = sheet();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value("A5", CellError::Na)
            .unwrap();
        assert_eq!(eval(&wb, "=SUM(A1:A5)"), Value::Error(CellError::Na));
        assert_eq!(eval(&wb, "=COUNT(A1:A5)"), Value::Number(2.0));
    }

    #[test]
    fn test_rounding() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=ROUND(2.675, 2)"), Value::Number(2.68));
        assert_eq!(eval(&wb, "=ROUND(-2.5, 0)"), Value::Number(-3.0));
        assert_eq!(eval(&wb, "=ROUND(1234, -2)"), Value::Number(1200.0));
        assert_eq!(eval(&wb, "=ROUNDUP(3.14159, 3)"), Value::Number(3.142));
        assert_eq!(eval(&wb, "=ROUNDUP(-3.1, 0)"), Value::Number(-4.0));
        assert_eq!(eval(&wb, "=ROUNDDOWN(-3.9, 0)"), Value::Number(-3.0));
        assert_eq!(eval(&wb, "=INT(-3.5)"), Value::Number(-4.0));
    }

    #[test]
    fn test_scalar_math() {
        let wb = Workbook::new();
        assert_eq!(eval(&wb, "=MOD(-3, 2)"), Value::Number(1.0));
        assert_eq!(eval(&wb, "=MOD(3, 0)"), Value::Error(CellError::Div0));
        assert_eq!(eval(&wb, "=SQRT(16)"), Value::Number(4.0));
        assert_eq!(eval(&wb, "=SQRT(-1)"), Value::Error(CellError::Num));
        assert_eq!(eval(&wb, "=POWER(2, 3)"), Value::Number(8.0));
        assert_eq!(eval(&wb, "=ABS(-2)"), Value::Number(2.0));
        assert_eq!(eval(&wb, "=SIGN(-0.5)"), Value::Number(-1.0));
        assert_eq!(eval(&wb, "=PI()"), Value::Number(std::f64::consts::PI));
    }

    #[test]
    fn test_random() {
        let wb = Workbook::new();
        for _ in 0..20 {
            let Value::Number(r) = eval(&wb, "=RAND()") else {
                panic!("RAND should be a number");
            };
            assert!((0.0..1.0).contains(&r));
            let Value::Number(n) = eval(&wb, "=RANDBETWEEN(1, 3)") else {
                panic!("RANDBETWEEN should be a number");
            };
            assert!([1.0, 2.0, 3.0].contains(&n));
        }
        assert_eq!(eval(&wb, "=RANDBETWEEN(5, 1)"), Value::Error(CellError::Num));
    }
}
