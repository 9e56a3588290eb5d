//! Date functions
//!
//! Dates are serial numbers: whole days since the workbook's base date plus a
//! fraction of a day. The 1900 system keeps the historical fake leap day
//! 1900-02-29 as serial 60, so serials before March 1900 are off by one
//! against the real calendar. The 1904 system counts from 1904-01-01 as 0.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use gridcalc_core::CellError;

use super::{number, try_value};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Serial of the fake 1900-02-29
const FAKE_LEAP_DAY: i64 = 60;

fn base_1904() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1904, 1, 1)
}

/// Day 1 of the 1900 system is 1900-01-01, so day 0 is the day before
fn base_1900() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 31)
}

/// Serial of a real calendar date
pub(crate) fn serial_from_date(date: NaiveDate, date_1904: bool) -> Option<i64> {
    if date_1904 {
        return Some((date - base_1904()?).num_days());
    }
    let days = (date - base_1900()?).num_days();
    Some(if days >= FAKE_LEAP_DAY { days + 1 } else { days })
}

/// Serial of a date and time of day
pub(crate) fn serial_from_datetime(dt: NaiveDateTime, date_1904: bool) -> Option<f64> {
    let days = serial_from_date(dt.date(), date_1904)?;
    Some(days as f64 + f64::from(dt.num_seconds_from_midnight()) / SECONDS_PER_DAY)
}

/// Serial for `DATE(year, month, day)`; months and days outside their usual
/// range roll over into neighbouring months and years
pub(crate) fn serial_from_ymd(year: i32, month: i32, day: i32, date_1904: bool) -> Option<i64> {
    let months = year.checked_mul(12)?.checked_add(month - 1)?;
    let first =
        NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)?;
    Some(serial_from_date(first, date_1904)? + i64::from(day) - 1)
}

/// (year, month, day) shown for a whole-day serial; includes 1900-02-29 and
/// the 1900-01-00 of serial 0
pub(crate) fn ymd_from_serial(serial: i64, date_1904: bool) -> Option<(i32, u32, u32)> {
    if date_1904 {
        let date = base_1904()?.checked_add_signed(Duration::days(serial))?;
        return Some((date.year(), date.month(), date.day()));
    }
    match serial {
        FAKE_LEAP_DAY => Some((1900, 2, 29)),
        0 => Some((1900, 1, 0)),
        s if s < 0 => None,
        s => {
            let days = if s > FAKE_LEAP_DAY { s - 1 } else { s };
            let date = base_1900()?.checked_add_signed(Duration::days(days))?;
            Some((date.year(), date.month(), date.day()))
        }
    }
}

/// Real date and time for a serial; the fake leap day maps to 1900-02-28
pub(crate) fn datetime_from_serial(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let whole = serial.floor();
    let seconds = ((serial - whole) * SECONDS_PER_DAY).round() as i64;
    let mut days = whole as i64;
    let base = if date_1904 {
        base_1904()?
    } else {
        if days >= FAKE_LEAP_DAY {
            days -= 1;
        }
        base_1900()?
    };
    let date = base.checked_add_signed(Duration::days(days))?;
    date.and_hms_opt(0, 0, 0)?.checked_add_signed(Duration::seconds(seconds))
}

/// DATE(year, month, day)
pub fn fn_date(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let mut year = try_value!(number(args, 0, ctx)?).trunc();
    let month = try_value!(number(args, 1, ctx)?).trunc();
    let day = try_value!(number(args, 2, ctx)?).trunc();

    if (0.0..1900.0).contains(&year) {
        year += 1900.0;
    }
    if !(0.0..10000.0).contains(&year) || month.abs() > 1e6 || day.abs() > 1e8 {
        return Ok(Value::Error(CellError::Num));
    }
    match serial_from_ymd(year as i32, month as i32, day as i32, ctx.date_1904()) {
        Some(serial) if serial >= 0 => Ok(Value::Number(serial as f64)),
        _ => Ok(Value::Error(CellError::Num)),
    }
}

fn date_part(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    part: fn((i32, u32, u32)) -> f64,
) -> EvalResult<Value> {
    let serial = try_value!(number(args, 0, ctx)?);
    if serial < 0.0 {
        return Ok(Value::Error(CellError::Num));
    }
    Ok(match ymd_from_serial(serial.floor() as i64, ctx.date_1904()) {
        Some(ymd) => Value::Number(part(ymd)),
        None => Value::Error(CellError::Num),
    })
}

/// YEAR(serial)
pub fn fn_year(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    date_part(args, ctx, |(y, _, _)| f64::from(y))
}

/// MONTH(serial)
pub fn fn_month(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    date_part(args, ctx, |(_, m, _)| f64::from(m))
}

/// DAY(serial)
pub fn fn_day(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    date_part(args, ctx, |(_, _, d)| f64::from(d))
}

/// TODAY(): the evaluation's clock, whole days only
pub fn fn_today(_args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(serial_from_date(ctx.now().date(), ctx.date_1904())
        .map_or(Value::Error(CellError::Num), |s| Value::Number(s as f64)))
}

/// NOW(): the evaluation's clock with time of day
pub fn fn_now(_args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(serial_from_datetime(ctx.now(), ctx.date_1904())
        .map_or(Value::Error(CellError::Num), Value::Number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FormulaEngine;
    use crate::source::CellKey;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> Value {
        FormulaEngine::new()
            .evaluate_formula(formula, &Workbook::new(), CellKey::new(0, 0, 5))
            .unwrap()
    }

    #[test]
    fn test_serials_1900() {
        assert_eq!(serial_from_ymd(1900, 1, 1, false), Some(1));
        assert_eq!(serial_from_ymd(1900, 2, 28, false), Some(59));
        assert_eq!(serial_from_ymd(1900, 2, 29, false), Some(60));
        assert_eq!(serial_from_ymd(1900, 3, 1, false), Some(61));
        assert_eq!(serial_from_ymd(2024, 1, 1, false), Some(45292));
        assert_eq!(ymd_from_serial(60, false), Some((1900, 2, 29)));
        assert_eq!(ymd_from_serial(61, false), Some((1900, 3, 1)));
        assert_eq!(ymd_from_serial(45292, false), Some((2024, 1, 1)));
    }

    #[test]
    fn test_serials_1904() {
        assert_eq!(serial_from_ymd(1904, 1, 1, true), Some(0));
        assert_eq!(serial_from_ymd(2024, 1, 1, true), Some(45292 - 1462));
        assert_eq!(ymd_from_serial(1, true), Some((1904, 1, 2)));
    }

    #[test]
    fn test_datetime_from_serial() {
        let dt = datetime_from_serial(45292.5, false).unwrap();
        assert_eq!(dt.to_string(), "2024-01-01 12:00:00");
        assert_eq!(datetime_from_serial(-1.0, false), None);
        assert_eq!(
            serial_from_datetime(dt, false),
            Some(45292.5)
        );
    }

    #[test]
    fn test_date_function() {
        assert_eq!(eval("=DATE(2024, 1, 1)"), Value::Number(45292.0));
        assert_eq!(eval("=DATE(2023, 13, 1)"), Value::Number(45292.0));
        assert_eq!(eval("=DATE(2024, 1, 0)"), Value::Number(45291.0));
        assert_eq!(eval("=DATE(124, 1, 1)"), Value::Number(45292.0));
        assert_eq!(eval("=DATE(10000, 1, 1)"), Value::Error(CellError::Num));
        assert_eq!(eval("=DATE(-1, 1, 1)"), Value::Error(CellError::Num));
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(45292.75)"), Value::Number(2024.0));
        assert_eq!(eval("=MONTH(DATE(2024, 7, 15))"), Value::Number(7.0));
        assert_eq!(eval("=DAY(DATE(2024, 7, 15))"), Value::Number(15.0));
        assert_eq!(eval("=DAY(60)"), Value::Number(29.0));
        assert_eq!(eval("=YEAR(-1)"), Value::Error(CellError::Num));
    }

    #[test]
    fn test_clock_functions_use_context_time() {
        let engine = FormulaEngine::new();
        let wb = Workbook::new();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let ctx = engine.context(&wb, CellKey::new(0, 0, 0)).with_now(now);
        assert_eq!(fn_today(&[], &ctx).unwrap(), Value::Number(45292.0));
        assert_eq!(fn_now(&[], &ctx).unwrap(), Value::Number(45292.75));
    }
}
