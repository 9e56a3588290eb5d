//! Reference objects
//!
//! A reference names cells without reading them: a single cell, whole rows,
//! whole columns, a rectangular range or a table (optionally one of its
//! columns), each optionally qualified by a sheet name.

use std::fmt;

use gridcalc_core::{
    CellAddress, CellError, CellRange, ColumnSpan, NamedRange, RowSpan, MAX_COLS, MAX_ROWS,
};
use lazy_regex::regex_is_match;

use crate::error::EvalResult;
use crate::runtime::RuntimeContext;
use crate::source::{CellKey, SheetDataSource, SheetId};
use crate::token::{CLOSE_BRACKET, OPEN_BRACKET, RANGE_SEPARATOR, SHEET_QUALIFIER, SHEET_QUOTE};
use crate::value::Value;

/// What a reference points at, independent of sheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceTarget {
    Cell(CellAddress),
    Row(RowSpan),
    Column(ColumnSpan),
    Range(CellRange),
    /// `Sales` or `Sales[Amount]`; without a column this is the table body
    Table { name: String, column: Option<String> },
}

/// A parsed reference, optionally qualified by a sheet name
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferenceObject {
    sheet: Option<String>,
    target: ReferenceTarget,
}

/// A resolved rectangular block of one sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub sheet: SheetId,
    pub range: CellRange,
}

impl ReferenceObject {
    pub fn new(sheet: Option<String>, target: ReferenceTarget) -> Self {
        Self { sheet, target }
    }

    pub fn cell(address: CellAddress) -> Self {
        Self::new(None, ReferenceTarget::Cell(address))
    }

    pub fn range(range: CellRange) -> Self {
        Self::new(None, ReferenceTarget::Range(range))
    }

    pub fn table(name: impl Into<String>, column: Option<String>) -> Self {
        Self::new(
            None,
            ReferenceTarget::Table {
                name: name.into(),
                column,
            },
        )
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Parse reference text such as `B2`, `$A$1:C3`, `2:2`, `A:C`,
    /// `'My Sheet'!A1` or `Sales[Amount]`. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let (sheet, body) = split_sheet(text)?;
        let target = parse_target(body)?;
        if sheet.is_some() && matches!(target, ReferenceTarget::Table { .. }) {
            return None;
        }
        Some(Self { sheet, target })
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    pub fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.target, ReferenceTarget::Cell(_))
    }

    pub fn is_row(&self) -> bool {
        matches!(self.target, ReferenceTarget::Row(_))
    }

    pub fn is_column(&self) -> bool {
        matches!(self.target, ReferenceTarget::Column(_))
    }

    pub fn is_range(&self) -> bool {
        matches!(self.target, ReferenceTarget::Range(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self.target, ReferenceTarget::Table { .. })
    }

    /// Join two references into the smallest reference covering both
    ///
    /// Only references of the same shape on the same sheet combine: cells and
    /// ranges into a range, rows into rows, columns into columns.
    pub fn union(&self, other: &ReferenceObject) -> Option<ReferenceObject> {
        let sheet = match (&self.sheet, &other.sheet) {
            (a, None) => a.clone(),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => Some(a.clone()),
            _ => return None,
        };
        let target = match (&self.target, &other.target) {
            (ReferenceTarget::Row(a), ReferenceTarget::Row(b)) => {
                let mut span = RowSpan::new(a.start.min(b.start), a.end.max(b.end));
                span.start_absolute = a.start_absolute;
                span.end_absolute = b.end_absolute;
                ReferenceTarget::Row(span)
            }
            (ReferenceTarget::Column(a), ReferenceTarget::Column(b)) => {
                let mut span = ColumnSpan::new(a.start.min(b.start), a.end.max(b.end));
                span.start_absolute = a.start_absolute;
                span.end_absolute = b.end_absolute;
                ReferenceTarget::Column(span)
            }
            (a, b) => {
                let (a, b) = (a.as_range()?, b.as_range()?);
                let spanned = CellRange::new(a.start, b.end);
                let covering = a.union(&b);
                let keeps_markers = spanned.start.relative() == covering.start
                    && spanned.end.relative() == covering.end;
                ReferenceTarget::Range(if keeps_markers { spanned } else { covering })
            }
        };
        Some(Self { sheet, target })
    }

    /// The block of cells this reference covers; whole rows and columns are
    /// bounded by the used extent of their sheet
    pub fn resolve_area(&self, ctx: &RuntimeContext<'_>) -> Result<Area, CellError> {
        let (sheet, range) = self.full_area(ctx)?;
        let range = match self.target {
            ReferenceTarget::Row(_) | ReferenceTarget::Column(_) => {
                let (rows, cols) = ctx.data().range_bounds(sheet);
                let last_row = range.end.row.min(rows.saturating_sub(1)).max(range.start.row);
                let last_col = range.end.col.min(cols.saturating_sub(1)).max(range.start.col);
                CellRange::from_indices(range.start.row, range.start.col, last_row, last_col)
            }
            _ => range,
        };
        Ok(Area { sheet, range })
    }

    pub(crate) fn full_area(
        &self,
        ctx: &RuntimeContext<'_>,
    ) -> Result<(SheetId, CellRange), CellError> {
        self.area_from(ctx.data(), ctx.current_sheet())
    }

    /// Unbounded extent as seen from a formula on `current_sheet`: whole rows
    /// span every column and whole columns every row
    pub fn area_from(
        &self,
        data: &dyn SheetDataSource,
        current_sheet: SheetId,
    ) -> Result<(SheetId, CellRange), CellError> {
        if let ReferenceTarget::Table { name, column } = &self.target {
            let table = data.table(name).ok_or(CellError::Ref)?;
            let range = match column {
                Some(column) => table.column_range(column).ok_or(CellError::Ref)?,
                None => table.data_range(),
            };
            return Ok((table.sheet(), range));
        }

        let sheet = match &self.sheet {
            None => current_sheet,
            Some(name) => data.sheet_id(name).ok_or(CellError::Ref)?,
        };
        let range = match &self.target {
            ReferenceTarget::Cell(addr) => CellRange::single(*addr),
            ReferenceTarget::Range(range) => *range,
            ReferenceTarget::Row(span) => {
                CellRange::from_indices(span.start, 0, span.end, MAX_COLS - 1)
            }
            ReferenceTarget::Column(span) => {
                CellRange::from_indices(0, span.start, MAX_ROWS - 1, span.end)
            }
            ReferenceTarget::Table { .. } => return Err(CellError::Ref),
        };
        Ok((sheet, range))
    }

    /// Read the referenced cells: a scalar for one cell, an array otherwise
    pub fn resolve(&self, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        let area = match self.resolve_area(ctx) {
            Ok(area) => area,
            Err(e) => return Ok(Value::Error(e)),
        };
        if area.range.is_single_cell() {
            let start = area.range.start;
            return ctx.cell_value(CellKey::new(area.sheet, start.row, start.col));
        }

        let mut rows = Vec::with_capacity(area.range.row_count() as usize);
        for row in area.range.start.row..=area.range.end.row {
            let mut values = Vec::with_capacity(area.range.col_count() as usize);
            for col in area.range.start.col..=area.range.end.col {
                values.push(ctx.cell_value(CellKey::new(area.sheet, row, col))?);
            }
            rows.push(values);
        }
        Ok(Value::Array(rows))
    }

    /// Implicit intersection with the current cell
    ///
    /// A single cell gives `#VALUE!`. Rows pick the current column, columns
    /// the current row, and ranges and tables the current position. A
    /// dimension of size one always matches; otherwise the current position
    /// must fall inside it.
    pub fn intersect(&self, ctx: &RuntimeContext<'_>) -> EvalResult<Value> {
        if self.is_cell() {
            return Ok(Value::Error(CellError::Value));
        }
        let (sheet, range) = match self.full_area(ctx) {
            Ok(area) => area,
            Err(e) => return Ok(Value::Error(e)),
        };

        let row = pick(range.start.row, range.end.row, ctx.current_row());
        let col = pick(range.start.col, range.end.col, ctx.current_col());
        match (row, col) {
            (Some(row), Some(col)) => ctx.cell_value(CellKey::new(sheet, row, col)),
            _ => Ok(Value::Error(CellError::Value)),
        }
    }
}

fn pick<T: PartialOrd + Copy>(start: T, end: T, current: T) -> Option<T> {
    if start == end {
        Some(start)
    } else if start <= current && current <= end {
        Some(current)
    } else {
        None
    }
}

impl ReferenceTarget {
    fn as_range(&self) -> Option<CellRange> {
        match self {
            ReferenceTarget::Cell(addr) => Some(CellRange::single(*addr)),
            ReferenceTarget::Range(range) => Some(*range),
            _ => None,
        }
    }
}

/// Split `Sheet!Body` / `'Quoted Sheet'!Body` into its parts
fn split_sheet(text: &str) -> Option<(Option<String>, &str)> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix(SHEET_QUOTE) {
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != SHEET_QUOTE {
                name.push(c);
                continue;
            }
            if rest[i + 1..].starts_with(SHEET_QUOTE) {
                name.push(SHEET_QUOTE);
                chars.next();
                continue;
            }
            let body = rest[i + 1..].strip_prefix(SHEET_QUALIFIER)?;
            return (!name.is_empty()).then_some((Some(name), body));
        }
        return None;
    }

    match text.split_once(SHEET_QUALIFIER) {
        Some((sheet, body)) if regex_is_match!(r"^[A-Za-z_\\][\w.]*$", sheet) => {
            Some((Some(sheet.to_string()), body))
        }
        Some(_) => None,
        None => Some((None, text)),
    }
}

fn parse_target(body: &str) -> Option<ReferenceTarget> {
    if let Some(open) = body.find(OPEN_BRACKET) {
        let name = &body[..open];
        NamedRange::validate_name(name).ok()?;
        let selector = body[open..].strip_prefix(OPEN_BRACKET)?.strip_suffix(CLOSE_BRACKET)?;
        let selector = selector
            .strip_prefix(OPEN_BRACKET)
            .and_then(|s| s.strip_suffix(CLOSE_BRACKET))
            .unwrap_or(selector);
        if selector.contains(|c| c == OPEN_BRACKET || c == CLOSE_BRACKET || c == ',') {
            return None;
        }
        let column = if selector.eq_ignore_ascii_case("#Data") {
            None
        } else if selector.is_empty() || selector.starts_with('#') {
            return None;
        } else {
            Some(selector.to_string())
        };
        return Some(ReferenceTarget::Table {
            name: name.to_string(),
            column,
        });
    }

    if regex_is_match!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+$", body) {
        return CellAddress::parse(body).ok().map(ReferenceTarget::Cell);
    }
    if regex_is_match!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+:\$?[A-Za-z]{1,3}\$?[0-9]+$", body) {
        return CellRange::parse(body).ok().map(ReferenceTarget::Range);
    }
    if regex_is_match!(r"^\$?[0-9]+:\$?[0-9]+$", body) {
        return RowSpan::parse(body).ok().map(ReferenceTarget::Row);
    }
    if regex_is_match!(r"^\$?[A-Za-z]{1,3}:\$?[A-Za-z]{1,3}$", body) {
        return ColumnSpan::parse(body).ok().map(ReferenceTarget::Column);
    }
    None
}

/// Quote a sheet name when it would not lex as a bare word
pub fn format_sheet_name(name: &str) -> String {
    let bare = regex_is_match!(r"^[A-Za-z_\\][\w.]*$", name)
        && !regex_is_match!(r"^[A-Za-z]{1,3}[0-9]+$", name)
        && !name.eq_ignore_ascii_case("TRUE")
        && !name.eq_ignore_ascii_case("FALSE");
    if bare {
        name.to_string()
    } else {
        let escaped = name.replace(SHEET_QUOTE, "''");
        format!("{}{}{}", SHEET_QUOTE, escaped, SHEET_QUOTE)
    }
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTarget::Cell(addr) => write!(f, "{}", addr),
            ReferenceTarget::Row(span) => write!(f, "{}", span),
            ReferenceTarget::Column(span) => write!(f, "{}", span),
            ReferenceTarget::Range(range) => {
                write!(f, "{}{}{}", range.start, RANGE_SEPARATOR, range.end)
            }
            ReferenceTarget::Table { name, column } => match column {
                Some(column) => write!(f, "{}[{}]", name, column),
                None => write!(f, "{}[#Data]", name),
            },
        }
    }
}

impl fmt::Display for ReferenceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}{}", format_sheet_name(sheet), SHEET_QUALIFIER)?;
        }
        write!(f, "{}", self.target)
    }
}
