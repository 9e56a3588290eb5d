//! Built-in functions
//!
//! Every operator and named function is a [`FunctionDef`] in a
//! [`FunctionRegistry`]. Implementations receive their arguments as
//! [`Operand`]s (references are not yet read) and return one [`Value`].
//! Domain problems come back as `Value::Error`; only engine faults use `Err`.

pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod operators;
pub mod text;

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use gridcalc_core::CellError;

use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::value::{Operand, Value};

/// Function implementation signature
pub type FunctionImpl = fn(&[Operand], &RuntimeContext<'_>) -> EvalResult<Value>;

/// Unwrap a `Result<T, CellError>`, returning the error as the function's value
macro_rules! try_value {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return Ok($crate::value::Value::Error(e)),
        }
    };
}
pub(crate) use try_value;

/// Function definition
pub struct FunctionDef {
    /// Canonical name (uppercase)
    pub name: &'static str,
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    pub implementation: FunctionImpl,
    /// Re-evaluated on every recalculation
    pub volatile: bool,
}

impl FunctionDef {
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        }
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Run the function; a wrong argument count gives `#N/A`
    pub fn call(&self, args: &[Operand], ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        if !self.accepts(args.len()) {
            tracing::debug!(
                function = self.name,
                given = args.len(),
                min = self.min_args,
                max = ?self.max_args,
                "wrong argument count"
            );
            return Ok(Value::Error(CellError::Na));
        }
        (self.implementation)(args, ctx)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .finish()
    }
}

/// Case-insensitive table of callable functions
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<FunctionDef>>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_operator_functions();
        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_info_functions();
        registry.register_lookup_functions();
        registry.register_date_functions();

        registry
    }

    /// A registry with nothing in it, not even the operators
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition of the same name
    pub fn register(&mut self, def: FunctionDef) -> Option<Arc<FunctionDef>> {
        self.functions.insert(def.name.to_uppercase(), Arc::new(def))
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.remove(&name.to_uppercase())
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_all(&mut self, defs: impl IntoIterator<Item = FunctionDef>) {
        for def in defs {
            self.register(def);
        }
    }

    fn register_operator_functions(&mut self) {
        use operators::*;
        self.register_all([
            FunctionDef::new("PLUS", 2, Some(2), fn_plus),
            FunctionDef::new("MINUS", 2, Some(2), fn_minus),
            FunctionDef::new("MULTIPLY", 2, Some(2), fn_multiply),
            FunctionDef::new("DIVIDE", 2, Some(2), fn_divide),
            FunctionDef::new("POW", 2, Some(2), fn_pow),
            FunctionDef::new("AMPERSAND", 2, Some(2), fn_ampersand),
            FunctionDef::new("EQ", 2, Some(2), fn_eq),
            FunctionDef::new("NE", 2, Some(2), fn_ne),
            FunctionDef::new("LT", 2, Some(2), fn_lt),
            FunctionDef::new("LTE", 2, Some(2), fn_lte),
            FunctionDef::new("GT", 2, Some(2), fn_gt),
            FunctionDef::new("GTE", 2, Some(2), fn_gte),
            FunctionDef::new("PERCENT", 1, Some(1), fn_percent),
        ]);
    }

    fn register_math_functions(&mut self) {
        use math::*;
        self.register_all([
            FunctionDef::new("SUM", 1, None, fn_sum),
            FunctionDef::new("PRODUCT", 1, None, fn_product),
            FunctionDef::new("AVERAGE", 1, None, fn_average),
            FunctionDef::new("MIN", 1, None, fn_min),
            FunctionDef::new("MAX", 1, None, fn_max),
            FunctionDef::new("COUNT", 1, None, fn_count),
            FunctionDef::new("COUNTA", 1, None, fn_counta),
            FunctionDef::new("COUNTBLANK", 1, Some(1), fn_countblank),
            FunctionDef::new("ABS", 1, Some(1), fn_abs),
            FunctionDef::new("SIGN", 1, Some(1), fn_sign),
            FunctionDef::new("ROUND", 2, Some(2), fn_round),
            FunctionDef::new("ROUNDUP", 2, Some(2), fn_roundup),
            FunctionDef::new("ROUNDDOWN", 2, Some(2), fn_rounddown),
            FunctionDef::new("INT", 1, Some(1), fn_int),
            FunctionDef::new("MOD", 2, Some(2), fn_mod),
            FunctionDef::new("SQRT", 1, Some(1), fn_sqrt),
            FunctionDef::new("POWER", 2, Some(2), fn_power),
            FunctionDef::new("PI", 0, Some(0), fn_pi),
            FunctionDef::new("RAND", 0, Some(0), fn_rand).volatile(),
            FunctionDef::new("RANDBETWEEN", 2, Some(2), fn_randbetween).volatile(),
        ]);
    }

    fn register_logical_functions(&mut self) {
        use logical::*;
        self.register_all([
            FunctionDef::new("IF", 1, Some(3), fn_if),
            FunctionDef::new("AND", 1, None, fn_and),
            FunctionDef::new("OR", 1, None, fn_or),
            FunctionDef::new("XOR", 1, None, fn_xor),
            FunctionDef::new("NOT", 1, Some(1), fn_not),
            FunctionDef::new("IFERROR", 2, Some(2), fn_iferror),
            FunctionDef::new("IFNA", 2, Some(2), fn_ifna),
            FunctionDef::new("TRUE", 0, Some(0), fn_true),
            FunctionDef::new("FALSE", 0, Some(0), fn_false),
        ]);
    }

    fn register_text_functions(&mut self) {
        use text::*;
        self.register_all([
            FunctionDef::new("LEN", 1, Some(1), fn_len),
            FunctionDef::new("LEFT", 1, Some(2), fn_left),
            FunctionDef::new("RIGHT", 1, Some(2), fn_right),
            FunctionDef::new("MID", 3, Some(3), fn_mid),
            FunctionDef::new("UPPER", 1, Some(1), fn_upper),
            FunctionDef::new("LOWER", 1, Some(1), fn_lower),
            FunctionDef::new("TRIM", 1, Some(1), fn_trim),
            FunctionDef::new("CONCATENATE", 1, None, fn_concatenate),
            FunctionDef::new("CONCAT", 1, None, fn_concat),
            FunctionDef::new("REPT", 2, Some(2), fn_rept),
            FunctionDef::new("EXACT", 2, Some(2), fn_exact),
            FunctionDef::new("FIND", 2, Some(3), fn_find),
            FunctionDef::new("SEARCH", 2, Some(3), fn_search),
            FunctionDef::new("SUBSTITUTE", 3, Some(4), fn_substitute),
            FunctionDef::new("VALUE", 1, Some(1), fn_value),
            FunctionDef::new("TEXT", 2, Some(2), fn_text),
            FunctionDef::new("FIXED", 1, Some(3), fn_fixed),
        ]);
    }

    fn register_info_functions(&mut self) {
        use info::*;
        self.register_all([
            FunctionDef::new("ISBLANK", 1, Some(1), fn_isblank),
            FunctionDef::new("ISNUMBER", 1, Some(1), fn_isnumber),
            FunctionDef::new("ISTEXT", 1, Some(1), fn_istext),
            FunctionDef::new("ISLOGICAL", 1, Some(1), fn_islogical),
            FunctionDef::new("ISERROR", 1, Some(1), fn_iserror),
            FunctionDef::new("ISERR", 1, Some(1), fn_iserr),
            FunctionDef::new("ISNA", 1, Some(1), fn_isna),
            FunctionDef::new("ISREF", 1, Some(1), fn_isref),
            FunctionDef::new("NA", 0, Some(0), fn_na),
        ]);
    }

    fn register_lookup_functions(&mut self) {
        use lookup::*;
        self.register_all([
            FunctionDef::new("ROW", 0, Some(1), fn_row),
            FunctionDef::new("COLUMN", 0, Some(1), fn_column),
            FunctionDef::new("ROWS", 1, Some(1), fn_rows),
            FunctionDef::new("COLUMNS", 1, Some(1), fn_columns),
            FunctionDef::new("INDEX", 2, Some(3), fn_index),
            FunctionDef::new("MATCH", 2, Some(3), fn_match),
            FunctionDef::new("VLOOKUP", 3, Some(4), fn_vlookup),
            FunctionDef::new("HLOOKUP", 3, Some(4), fn_hlookup),
            FunctionDef::new("CHOOSE", 2, None, fn_choose),
        ]);
    }

    fn register_date_functions(&mut self) {
        use date::*;
        self.register_all([
            FunctionDef::new("DATE", 3, Some(3), fn_date),
            FunctionDef::new("YEAR", 1, Some(1), fn_year),
            FunctionDef::new("MONTH", 1, Some(1), fn_month),
            FunctionDef::new("DAY", 1, Some(1), fn_day),
            FunctionDef::new("TODAY", 0, Some(0), fn_today).volatile(),
            FunctionDef::new("NOW", 0, Some(0), fn_now).volatile(),
        ]);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Argument helpers ====================

/// Argument `index` read as a scalar; omitted arguments are blank
pub(crate) fn scalar(
    args: &[Operand],
    index: usize,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Value> {
    match args.get(index) {
        Some(arg) => arg.to_scalar(ctx),
        None => Ok(Value::Empty),
    }
}

/// Argument `index` read in full (areas become arrays)
pub(crate) fn value(args: &[Operand], index: usize, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
    match args.get(index) {
        Some(arg) => arg.to_value(ctx),
        None => Ok(Value::Empty),
    }
}

pub(crate) fn number(
    args: &[Operand],
    index: usize,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<f64, CellError>> {
    Ok(scalar(args, index, ctx)?.to_number())
}

/// Optional numeric argument; omitted or blank gives `default`
pub(crate) fn number_or(
    args: &[Operand],
    index: usize,
    default: f64,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<f64, CellError>> {
    match args.get(index) {
        None => Ok(Ok(default)),
        Some(_) => match scalar(args, index, ctx)? {
            Value::Empty => Ok(Ok(default)),
            v => Ok(v.to_number()),
        },
    }
}

pub(crate) fn text(
    args: &[Operand],
    index: usize,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<String, CellError>> {
    Ok(scalar(args, index, ctx)?.to_text())
}

pub(crate) fn boolean_or(
    args: &[Operand],
    index: usize,
    default: bool,
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<bool, CellError>> {
    match args.get(index) {
        None => Ok(Ok(default)),
        Some(_) => Ok(scalar(args, index, ctx)?.to_bool()),
    }
}

/// Apply a numeric function to the first argument, element-wise over arrays
pub(crate) fn lift_number(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    f: impl Fn(f64) -> Value,
) -> EvalResult<Value> {
    let input = value(args, 0, ctx)?;
    Ok(input.map(|v| match v.to_number() {
        Ok(n) => f(n),
        Err(e) => Value::Error(e),
    }))
}

/// Apply a text function to the first argument, element-wise over arrays
pub(crate) fn lift_text(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    f: impl Fn(&str) -> Value,
) -> EvalResult<Value> {
    let input = value(args, 0, ctx)?;
    Ok(input.map(|v| match v.to_text() {
        Ok(s) => f(&s),
        Err(e) => Value::Error(e),
    }))
}

/// A finite number, or `#NUM!`
pub(crate) fn finite(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(CellError::Num)
    }
}

/// Longest text a cell holds, in characters
pub const MAX_TEXT_LEN: usize = 32_767;

/// A text result, or `#VALUE!` past [`MAX_TEXT_LEN`]
pub(crate) fn bounded_text(s: String) -> Value {
    if s.len() > MAX_TEXT_LEN && s.chars().count() > MAX_TEXT_LEN {
        Value::Error(CellError::Value)
    } else {
        Value::String(s)
    }
}

/// Walk every argument for aggregation
///
/// Values typed directly into the call are coerced (`SUM("2", TRUE)` is 3);
/// values read from references or array constants are passed through as they
/// are, so callers can skip text and blanks the way ranges require.
pub(crate) fn for_each_argument(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
    mut visit: impl FnMut(&Value, bool) -> Result<(), CellError>,
) -> EvalResult<Result<(), CellError>> {
    for arg in args {
        let resolved = arg.to_value(ctx)?;
        let direct = !arg.is_reference() && !resolved.is_array();
        for item in resolved.iter_scalars() {
            if let Err(e) = visit(item, direct) {
                return Ok(Err(e));
            }
        }
    }
    Ok(Ok(()))
}

/// Numbers for SUM-like functions; errors anywhere propagate
pub(crate) fn collect_numbers(
    args: &[Operand],
    ctx: &RuntimeContext<'_>,
) -> EvalResult<Result<Vec<f64>, CellError>> {
    let mut numbers = Vec::new();
    let walked = for_each_argument(args, ctx, |item, direct| {
        match item {
            Value::Number(n) => numbers.push(*n),
            Value::Error(e) => return Err(*e),
            other if direct => numbers.push(other.to_number()?),
            _ => {}
        }
        Ok(())
    })?;
    Ok(walked.map(|_| numbers))
}
