//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use gridcalc_core::CellError;

use super::{
    boolean_or, bounded_text, for_each_argument, lift_text, number, number_or, scalar, text,
    try_value, MAX_TEXT_LEN,
};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{parse_numeric_text, Operand, Value};

/// A character count argument: truncated, and never negative
///
/// Counts past `usize::MAX` saturate.
fn count(
    args: &[Operand],
    index: usize,
    default: f64,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<usize, CellError>> {
    Ok(number_or(args, index, default, ctx)?.and_then(|n| {
        if n < 0.0 {
            Err(CellError::Value)
        } else {
            Ok(n.trunc() as usize)
        }
    }))
}

/// LEN function
pub fn fn_len(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_text(args, ctx, |s| Value::Number(s.chars().count() as f64))
}

/// LEFT(text, [count])
pub fn fn_left(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let s = try_value!(text(args, 0, ctx)?);
    let n = try_value!(count(args, 1, 1.0, ctx)?);
    Ok(Value::String(s.chars().take(n).collect()))
}

/// RIGHT(text, [count])
pub fn fn_right(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let s = try_value!(text(args, 0, ctx)?);
    let n = try_value!(count(args, 1, 1.0, ctx)?);
    let skip = s.chars().count().saturating_sub(n);
    Ok(Value::String(s.chars().skip(skip).collect()))
}

/// MID(text, start, count); `start` is 1-based
pub fn fn_mid(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let s = try_value!(text(args, 0, ctx)?);
    let start = try_value!(number(args, 1, ctx)?).trunc();
    let n = try_value!(count(args, 2, 0.0, ctx)?);
    if start < 1.0 {
        return Ok(Value::Error(CellError::Value));
    }
    Ok(Value::String(s.chars().skip(start as usize - 1).take(n).collect()))
}

/// UPPER function
pub fn fn_upper(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_text(args, ctx, |s| Value::String(s.to_uppercase()))
}

/// LOWER function
pub fn fn_lower(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_text(args, ctx, |s| Value::String(s.to_lowercase()))
}

/// TRIM: strip the ends and collapse inner runs of spaces
pub fn fn_trim(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    lift_text(args, ctx, |s| {
        Value::String(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    })
}

/// CONCATENATE: each argument as a scalar
pub fn fn_concatenate(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let mut out = String::new();
    for i in 0..args.len() {
        out.push_str(&try_value!(text(args, i, ctx)?));
    }
    Ok(bounded_text(out))
}

/// CONCAT: like CONCATENATE, but ranges are joined cell by cell
pub fn fn_concat(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let mut out = String::new();
    let walked = for_each_argument(args, ctx, |item, _| {
        out.push_str(&item.to_text()?);
        Ok(())
    })?;
    try_value!(walked);
    Ok(bounded_text(out))
}

/// REPT(text, times)
pub fn fn_rept(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let s = try_value!(text(args, 0, ctx)?);
    let times = try_value!(count(args, 1, 0.0, ctx)?);
    match s.chars().count().checked_mul(times) {
        Some(length) if length <= MAX_TEXT_LEN => Ok(Value::String(s.repeat(times))),
        _ => Ok(Value::Error(CellError::Value)),
    }
}

/// EXACT: case-sensitive equality
pub fn fn_exact(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let a = try_value!(text(args, 0, ctx)?);
    let b = try_value!(text(args, 1, ctx)?);
    Ok(Value::Boolean(a == b))
}

/// 1-based character position of `needle` in `haystack` at or after `start`
fn position(needle: &str, haystack: &str, start: f64) -> Value {
    let start = start.trunc();
    let length = haystack.chars().count();
    if start < 1.0 || start as usize > length + 1 {
        return Value::Error(CellError::Value);
    }
    let skip = start as usize - 1;
    let offset: usize = haystack.chars().take(skip).map(char::len_utf8).sum();
    match haystack[offset..].find(needle) {
        Some(found) => {
            let chars_before = haystack[offset..offset + found].chars().count();
            Value::Number((skip + chars_before + 1) as f64)
        }
        None => Value::Error(CellError::Value),
    }
}

/// FIND(needle, haystack, [start]); case-sensitive
pub fn fn_find(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let needle = try_value!(text(args, 0, ctx)?);
    let haystack = try_value!(text(args, 1, ctx)?);
    let start = try_value!(number_or(args, 2, 1.0, ctx)?);
    Ok(position(&needle, &haystack, start))
}

/// SEARCH(needle, haystack, [start]); case-insensitive, no wildcards
pub fn fn_search(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let needle = try_value!(text(args, 0, ctx)?).to_lowercase();
    let haystack = try_value!(text(args, 1, ctx)?).to_lowercase();
    let start = try_value!(number_or(args, 2, 1.0, ctx)?);
    Ok(position(&needle, &haystack, start))
}

/// SUBSTITUTE(text, old, new, [instance])
pub fn fn_substitute(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let s = try_value!(text(args, 0, ctx)?);
    let old = try_value!(text(args, 1, ctx)?);
    let new = try_value!(text(args, 2, ctx)?);
    if old.is_empty() {
        return Ok(Value::String(s));
    }
    if args.len() < 4 {
        let matches = s.matches(old.as_str()).count();
        let grown = matches
            .checked_mul(new.len())
            .and_then(|added| (s.len() - matches * old.len()).checked_add(added));
        // A character is at most four bytes
        return Ok(match grown {
            Some(bytes) if bytes <= MAX_TEXT_LEN * 4 => bounded_text(s.replace(&old, &new)),
            _ => Value::Error(CellError::Value),
        });
    }

    let instance = try_value!(number(args, 3, ctx)?).trunc();
    if instance < 1.0 {
        return Ok(Value::Error(CellError::Value));
    }
    match s.match_indices(&old).nth(instance as usize - 1) {
        Some((at, _)) => Ok(bounded_text(format!("{}{}{}", &s[..at], new, &s[at + old.len()..]))),
        None => Ok(Value::String(s)),
    }
}

/// VALUE: numeric text to a number
pub fn fn_value(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(match scalar(args, 0, ctx)? {
        Value::Number(n) => Value::Number(n),
        Value::Empty => Value::Number(0.0),
        Value::Error(e) => Value::Error(e),
        Value::String(s) => {
            parse_numeric_text(&s).map_or(Value::Error(CellError::Value), Value::Number)
        }
        _ => Value::Error(CellError::Value),
    })
}

/// TEXT(value, format)
pub fn fn_text(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let input = scalar(args, 0, ctx)?;
    let pattern = try_value!(text(args, 1, ctx)?);
    let n = match &input {
        Value::Error(e) => return Ok(Value::Error(*e)),
        Value::String(s) => match parse_numeric_text(s) {
            Some(n) => n,
            None => return Ok(input),
        },
        other => try_value!(other.to_number()),
    };
    Ok(ctx
        .config()
        .locale
        .format_pattern(n, &pattern, ctx.date_1904())
        .map_or(Value::Error(CellError::Value), Value::String))
}

/// FIXED(number, [decimals], [no_commas])
pub fn fn_fixed(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let n = try_value!(number(args, 0, ctx)?);
    let decimals = try_value!(number_or(args, 1, 2.0, ctx)?).trunc();
    let no_commas = try_value!(boolean_or(args, 2, false, ctx)?);
    if !(-127.0..=127.0).contains(&decimals) {
        return Ok(Value::Error(CellError::Value));
    }
    Ok(Value::String(ctx.config().locale.format_fixed(n, decimals as i32, !no_commas)))
}
