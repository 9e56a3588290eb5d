//! Runtime values
//!
//! [`Value`] is what every expression evaluates to. [`Operand`] is what flows
//! between AST nodes during evaluation: either a value or a reference that has
//! not been dereferenced yet, so functions such as `ROW` and `ISREF` can see
//! the reference itself.

use std::cmp::Ordering;
use std::fmt;

use gridcalc_core::{CellError, CellValue};
use lazy_regex::regex_captures;

use crate::error::EvalResult;
use crate::reference::ReferenceObject;
use crate::runtime::RuntimeContext;

/// A computed value
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Blank cell or omitted argument
    #[default]
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    /// Domain error such as `#DIV/0!`; flows through evaluation as data
    Error(CellError),
    /// Rows of columns; never empty and never ragged
    Array(Vec<Vec<Value>>),
}

impl Value {
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// Convert stored cell contents; a formula cell yields its cached result
    pub fn from_cell(cell: &CellValue) -> Self {
        match cell.effective_value() {
            CellValue::Empty | CellValue::Formula { .. } => Value::Empty,
            CellValue::Boolean(b) => Value::Boolean(*b),
            CellValue::Number(n) => Value::Number(*n),
            CellValue::String(s) => Value::String(s.as_str().to_string()),
            CellValue::Error(e) => Value::Error(*e),
        }
    }

    /// Convert to storable cell contents; an array stores its top-left element
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            Value::Empty => CellValue::Empty,
            Value::Number(n) => CellValue::Number(*n),
            Value::String(s) => CellValue::string(s),
            Value::Boolean(b) => CellValue::Boolean(*b),
            Value::Error(e) => CellValue::Error(*e),
            Value::Array(_) => self.top_left().to_cell_value(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn error(&self) -> Option<CellError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// First element of an array, or the value itself
    pub fn top_left(&self) -> &Value {
        match self {
            Value::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(Value::top_left)
                .unwrap_or(&Value::Empty),
            other => other,
        }
    }

    /// (rows, columns); scalars are 1x1
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Value::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }

    /// Iterate scalars row by row; a scalar yields itself
    pub fn iter_scalars(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::Array(rows) => Box::new(rows.iter().flatten()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Coerce to a number
    ///
    /// Booleans are 1/0, blanks are 0 and numeric text (including a trailing
    /// `%`) is parsed. Other text gives `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            Value::Empty => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => parse_numeric_text(s).ok_or(CellError::Value),
            Value::Error(e) => Err(*e),
            Value::Array(_) => self.top_left().to_number(),
        }
    }

    /// Coerce to text as a cell would display it
    pub fn to_text(&self) -> Result<String, CellError> {
        match self {
            Value::Empty => Ok(String::new()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::String(s) => Ok(s.clone()),
            Value::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Error(e) => Err(*e),
            Value::Array(_) => self.top_left().to_text(),
        }
    }

    /// Coerce to a boolean; only `TRUE`/`FALSE` text converts
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            Value::Empty => Ok(false),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Boolean(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            Value::String(_) => Err(CellError::Value),
            Value::Error(e) => Err(*e),
            Value::Array(_) => self.top_left().to_bool(),
        }
    }

    /// Spreadsheet ordering used by the comparison operators
    ///
    /// The left error wins, then the right one. A blank takes on the type of
    /// the other side. Otherwise numbers sort before text, text before
    /// booleans, and text compares case-insensitively.
    pub fn compare(&self, other: &Value) -> Result<Ordering, CellError> {
        let (left, right) = (self.top_left(), other.top_left());
        if let Value::Error(e) = left {
            return Err(*e);
        }
        if let Value::Error(e) = right {
            return Err(*e);
        }

        let left = left.blank_as(right);
        let right = right.blank_as(&left);
        Ok(match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => left.type_rank().cmp(&right.type_rank()),
        })
    }

    fn blank_as(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Empty, Value::Number(_)) => Value::Number(0.0),
            (Value::Empty, Value::String(_)) => Value::String(String::new()),
            (Value::Empty, Value::Boolean(_)) => Value::Boolean(false),
            (value, _) => value.clone(),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Empty => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Boolean(_) => 3,
            Value::Error(_) | Value::Array(_) => 4,
        }
    }

    /// Apply `f` to each element of an array, or to the value itself
    pub fn map(&self, f: impl Fn(&Value) -> Value) -> Value {
        match self {
            Value::Array(rows) => Value::Array(
                rows.iter()
                    .map(|row| row.iter().map(&f).collect())
                    .collect(),
            ),
            other => f(other),
        }
    }

    /// Combine two values element-wise
    ///
    /// Scalars and single rows/columns stretch to match the other side;
    /// positions that exist in neither operand give `#N/A`.
    pub fn broadcast(left: &Value, right: &Value, f: impl Fn(&Value, &Value) -> Value) -> Value {
        if !left.is_array() && !right.is_array() {
            return f(left, right);
        }
        let (lr, lc) = left.dimensions();
        let (rr, rc) = right.dimensions();
        let (rows, cols) = (lr.max(rr), lc.max(rc));
        Value::Array(
            (0..rows)
                .map(|r| {
                    (0..cols)
                        .map(|c| match (left.stretched(r, c), right.stretched(r, c)) {
                            (Some(a), Some(b)) => f(a, b),
                            _ => Value::Error(CellError::Na),
                        })
                        .collect()
                })
                .collect(),
        )
    }

    fn stretched(&self, row: usize, col: usize) -> Option<&Value> {
        match self {
            Value::Array(rows) => {
                let r = if rows.len() == 1 { 0 } else { row };
                let line = rows.get(r)?;
                let c = if line.len() == 1 { 0 } else { col };
                line.get(c)
            }
            other => Some(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}

impl<E: Into<Value>> From<Result<f64, E>> for Value {
    fn from(result: Result<f64, E>) -> Self {
        match result {
            Ok(n) => Value::Number(n),
            Err(e) => e.into(),
        }
    }
}

/// Display text of a value, as a cell would show it
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
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
                        match item {
                            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
                            other => write!(f, "{}", other)?,
                        }
                    }
                }
                f.write_str("}")
            }
        }
    }
}

/// Parse text that looks like a number (`" 1.5 "`, `"-2e3"`, `"15%"`)
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let (_, number, percent) =
        regex_captures!(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*(%?)\s*$", text)?;
    let n: f64 = number.parse().ok()?;
    Some(if percent.is_empty() { n } else { n / 100.0 })
}

/// Format a number the way a general-format cell shows it
///
/// Up to 15 significant digits, no trailing zeros, and scientific notation
/// for very large or very small magnitudes.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return CellError::Num.as_str().to_string();
    }

    let magnitude = n.abs();
    if magnitude >= 1e15 || magnitude < 1e-9 {
        let formatted = format!("{:.14E}", n);
        let (mantissa, exponent) = formatted.split_once('E').unwrap_or((&formatted, "0"));
        let mantissa = trim_fraction(mantissa);
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}E{}{:02}", mantissa, sign, exponent.abs());
    }

    if n.fract() == 0.0 {
        return format!("{}", n as i64);
    }

    let integer_digits = magnitude.log10().floor() as i32 + 1;
    let decimals = (15 - integer_digits).clamp(0, 20) as usize;
    trim_fraction(&format!("{:.*}", decimals, n)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// An evaluated argument: a value, or a reference still to be read
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Reference(ReferenceObject),
}

impl Operand {
    /// Read the operand; a single-cell reference yields a scalar, larger areas an array
    pub fn to_value(&self, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        match self {
            Operand::Value(v) => Ok(v.clone()),
            Operand::Reference(r) => r.resolve(ctx),
        }
    }

    /// Read the operand as a scalar (top-left element of an area)
    pub fn to_scalar(&self, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        Ok(match self.to_value(ctx)? {
            Value::Array(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .unwrap_or_default(),
            v => v,
        })
    }

    pub fn as_reference(&self) -> Option<&ReferenceObject> {
        match self {
            Operand::Reference(r) => Some(r),
            Operand::Value(_) => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Operand::Reference(_))
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(1.0 / 3.0), "0.333333333333333");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.5e20), "1.5E+20");
        assert_eq!(format_number(1.2e-10), "1.2E-10");
        assert_eq!(format_number(123456789012.5), "123456789012.5");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from(" 12 ").to_number(), Ok(12.0));
        assert_eq!(Value::from("-1.5e2").to_number(), Ok(-150.0));
        assert_eq!(Value::from("50%").to_number(), Ok(0.5));
        assert_eq!(Value::from("abc").to_number(), Err(CellError::Value));
        assert_eq!(Value::from("").to_number(), Err(CellError::Value));
        assert_eq!(Value::Boolean(true).to_number(), Ok(1.0));
        assert_eq!(Value::Empty.to_number(), Ok(0.0));
        assert_eq!(Value::Error(CellError::Na).to_number(), Err(CellError::Na));
    }

    #[test]
    fn test_text_and_bool_coercion() {
        assert_eq!(Value::Number(1.0).to_text(), Ok("1".to_string()));
        assert_eq!(Value::Boolean(false).to_text(), Ok("FALSE".to_string()));
        assert_eq!(Value::from("true").to_bool(), Ok(true));
        assert_eq!(Value::from("yes").to_bool(), Err(CellError::Value));
        assert_eq!(Value::Number(-2.0).to_bool(), Ok(true));
    }

    #[test]
    fn test_compare() {
        let n = |x: f64| Value::Number(x);
        assert_eq!(n(1.0).compare(&n(2.0)), Ok(Ordering::Less));
        assert_eq!(Value::from("ABC").compare(&Value::from("abc")), Ok(Ordering::Equal));
        assert_eq!(n(99.0).compare(&Value::from("1")), Ok(Ordering::Less));
        assert_eq!(Value::from("z").compare(&Value::Boolean(false)), Ok(Ordering::Less));
        assert_eq!(Value::Empty.compare(&n(0.0)), Ok(Ordering::Equal));
        assert_eq!(Value::Empty.compare(&Value::from("")), Ok(Ordering::Equal));
        assert_eq!(
            Value::Error(CellError::Div0).compare(&Value::Error(CellError::Na)),
            Err(CellError::Div0)
        );
        assert_eq!(n(1.0).compare(&Value::Error(CellError::Na)), Err(CellError::Na));
    }

    #[test]
    fn test_broadcast() {
        let column = Value::Array(vec![vec![Value::Number(1.0)], vec![Value::Number(2.0)]]);
        let row = Value::Array(vec![vec![Value::Number(10.0), Value::Number(20.0)]]);
        let add = |a: &Value, b: &Value| {
            Value::from(a.to_number().and_then(|x| b.to_number().map(|y| x + y)))
        };

        assert_eq!(
            Value::broadcast(&column, &Value::Number(1.0), add),
            Value::Array(vec![vec![Value::Number(2.0)], vec![Value::Number(3.0)]])
        );
        assert_eq!(
            Value::broadcast(&column, &row, add),
            Value::Array(vec![
                vec![Value::Number(11.0), Value::Number(21.0)],
                vec![Value::Number(12.0), Value::Number(22.0)],
            ])
        );

        let pair = Value::Array(vec![vec![Value::Number(1.0), Value::Number(2.0)]]);
        let triple = Value::Array(vec![vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ]]);
        let Value::Array(rows) = Value::broadcast(&pair, &triple, add) else {
            panic!("expected array");
        };
        assert_eq!(rows[0][2], Value::Error(CellError::Na));
    }

    #[test]
    fn test_cell_conversion() {
        let mut formula = CellValue::formula("=1+1");
        assert_eq!(Value::from_cell(&formula), Value::Empty);
        if let CellValue::Formula { cached_value, .. } = &mut formula {
            *cached_value = Some(Box::new(CellValue::Number(2.0)));
        }
        assert_eq!(Value::from_cell(&formula), Value::Number(2.0));

        let array = Value::Array(vec![vec![Value::from("a"), Value::from("b")]]);
        assert_eq!(array.to_cell_value(), CellValue::string("a"));
    }
}
