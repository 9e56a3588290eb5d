//! Lookup and reference functions

use std::cmp::Ordering;
use std::mem::discriminant;

use gridcalc_core::CellError;

use super::{boolean_or, number, number_or, scalar, try_value, value};
use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

/// An argument as rows of values; a scalar is a 1x1 grid
fn grid(v: Value) -> Vec<Vec<Value>> {
    match v {
        Value::Array(rows) => rows,
        other => vec![vec![other]],
    }
}

fn position_of(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    current: u32,
    start: impl Fn(gridcalc_core::CellRange) -> u32,
) -> Value {
    let Some(arg) = args.first() else {
        return Value::Number(f64::from(current) + 1.0);
    };
    match arg.as_reference() {
        Some(reference) => match reference.full_area(ctx) {
            Ok((_, range)) => Value::Number(f64::from(start(range)) + 1.0),
            Err(e) => Value::Error(e),
        },
        None => Value::Error(CellError::Value),
    }
}

/// ROW([reference])
pub fn fn_row(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(position_of(args, ctx, ctx.current_row(), |r| r.start.row))
}

/// COLUMN([reference])
pub fn fn_column(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(position_of(args, ctx, u32::from(ctx.current_col()), |r| u32::from(r.start.col)))
}

/// (rows, columns) of a reference or array without reading its cells
fn extent(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Result<(f64, f64), CellError>> {
    if let Some(reference) = args[0].as_reference() {
        return Ok(reference
            .full_area(ctx)
            .map(|(_, r)| (f64::from(r.row_count()), f64::from(r.col_count()))));
    }
    match value(args, 0, ctx)? {
        Value::Error(e) => Ok(Err(e)),
        v => {
            let (rows, cols) = v.dimensions();
            Ok(Ok((rows as f64, cols as f64)))
        }
    }
}

/// ROWS function
pub fn fn_rows(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(try_value!(extent(args, ctx)?).0))
}

/// COLUMNS function
pub fn fn_columns(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(try_value!(extent(args, ctx)?).1))
}

/// INDEX(array, row, [column])
///
/// A zero row or column selects the whole column or row. With one index on a
/// single row, the index picks the column.
///
/// Functions return values, so INDEX yields the selected cells' contents and
/// never a reference: `A1:INDEX(...)` and `ROW(INDEX(...))` give `#VALUE!`.
pub fn fn_index(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let data = value(args, 0, ctx)?;
    if let Value::Error(e) = data {
        return Ok(Value::Error(e));
    }
    let first = try_value!(number(args, 1, ctx)?).trunc();
    let second = if args.len() > 2 {
        Some(try_value!(number_or(args, 2, 0.0, ctx)?).trunc())
    } else {
        None
    };
    let rows = grid(data);
    let (height, width) = (rows.len(), rows.first().map_or(0, Vec::len));

    let (row, col) = match second {
        Some(col) => (first, col),
        None if height == 1 => (1.0, first),
        None if width == 1 => (first, 1.0),
        None => (first, 0.0),
    };
    if row < 0.0 || col < 0.0 {
        return Ok(Value::Error(CellError::Value));
    }
    let (row, col) = (row as usize, col as usize);
    if row > height || col > width {
        return Ok(Value::Error(CellError::Ref));
    }

    Ok(match (row, col) {
        (0, 0) => Value::Array(rows),
        (0, c) => Value::Array(rows.into_iter().map(|mut r| vec![r.swap_remove(c - 1)]).collect()),
        (r, 0) => Value::Array(vec![rows.into_iter().nth(r - 1).unwrap_or_default()]),
        (r, c) => rows[r - 1][c - 1].clone(),
    })
}

fn comparable(a: &Value, b: &Value) -> bool {
    discriminant(a) == discriminant(b)
}

/// Index of `needle` in `items`
///
/// `0` finds the first equal item, `1` the last item not greater than the
/// needle in ascending data, `-1` the last item not less than it in
/// descending data. Items of another type are skipped.
fn find_position(needle: &Value, items: &[&Value], match_type: i32) -> Option<usize> {
    if match_type == 0 {
        return items
            .iter()
            .position(|item| {
                comparable(item, needle) && item.compare(needle) == Ok(Ordering::Equal)
            });
    }

    let wanted = if match_type > 0 { Ordering::Greater } else { Ordering::Less };
    let mut found = None;
    for (i, item) in items.iter().enumerate() {
        if !comparable(item, needle) {
            continue;
        }
        match item.compare(needle) {
            Ok(ordering) if ordering == wanted => break,
            Ok(_) => found = Some(i),
            Err(_) => {}
        }
    }
    found
}

/// MATCH(lookup, vector, [type])
pub fn fn_match(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let needle = scalar(args, 0, ctx)?;
    if let Value::Error(e) = needle {
        return Ok(Value::Error(e));
    }
    let match_type = try_value!(number_or(args, 2, 1.0, ctx)?).trunc();
    let match_type = match_type.clamp(-1.0, 1.0) as i32;

    let rows = grid(value(args, 1, ctx)?);
    let items: Vec<&Value> = if rows.len() == 1 {
        rows[0].iter().collect()
    } else if rows.iter().all(|r| r.len() == 1) {
        rows.iter().flatten().collect()
    } else {
        return Ok(Value::Error(CellError::Na));
    };

    Ok(match find_position(&needle, &items, match_type) {
        Some(i) => Value::Number((i + 1) as f64),
        None => Value::Error(CellError::Na),
    })
}

/// A found lookup result; a blank cell reads as 0
fn lookup_result(v: Value) -> Value {
    match v {
        Value::Empty => Value::Number(0.0),
        v => v,
    }
}

fn lookup(args: &[Operand], ctx: &RuntimeContext<'_>, rows: Vec<Vec<Value>>) -> EvalResult<Value> {
    let needle = scalar(args, 0, ctx)?;
    if let Value::Error(e) = needle {
        return Ok(Value::Error(e));
    }
    let index = try_value!(number(args, 2, ctx)?).trunc();
    let approximate = try_value!(boolean_or(args, 3, true, ctx)?);
    let width = rows.first().map_or(0, Vec::len);
    if index < 1.0 {
        return Ok(Value::Error(CellError::Value));
    }
    if index as usize > width {
        return Ok(Value::Error(CellError::Ref));
    }

    let keys: Vec<&Value> = rows.iter().filter_map(|r| r.first()).collect();
    let match_type = if approximate { 1 } else { 0 };
    Ok(match find_position(&needle, &keys, match_type) {
        Some(row) => lookup_result(rows[row][index as usize - 1].clone()),
        None => Value::Error(CellError::Na),
    })
}

/// VLOOKUP(lookup, table, column, [approximate])
pub fn fn_vlookup(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let table = value(args, 1, ctx)?;
    if let Value::Error(e) = table {
        return Ok(Value::Error(e));
    }
    lookup(args, ctx, grid(table))
}

/// HLOOKUP(lookup, table, row, [approximate])
pub fn fn_hlookup(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let table = value(args, 1, ctx)?;
    if let Value::Error(e) = table {
        return Ok(Value::Error(e));
    }
    let rows = grid(table);
    let width = rows.first().map_or(0, Vec::len);
    let transposed = (0..width)
        .map(|c| rows.iter().map(|r| r[c].clone()).collect())
        .collect();
    lookup(args, ctx, transposed)
}

/// CHOOSE(index, value1, ...)
pub fn fn_choose(args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    let index = try_value!(number(args, 0, ctx)?).trunc();
    if index < 1.0 || index as usize >= args.len() {
        return Ok(Value::Error(CellError::Value));
    }
    value(args, index as usize, ctx)
}
