//! A1-style addressing: single cells, rectangular ranges, whole rows and whole columns

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally and 1-based / lettered when displayed.
/// The `$` markers only matter for display and round-tripping formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0, XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a new cell address with specified absolute/relative flags
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let (col, col_absolute, rest) = parse_column_part(s)
            .ok_or_else(|| Error::InvalidAddress(format!("no column letters in '{}'", s)))?;
        let (row, row_absolute) = parse_row_part(rest)
            .ok_or_else(|| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        let col = Self::letters_to_column(col)?;
        let row = check_row(row, s)?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            letters.push((n % 26) as u8 + b'A');
            n /= 26;
        }

        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() || letters.len() > 3 {
            return Err(Error::InvalidAddress(format!(
                "invalid column letters '{}'",
                letters
            )));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }

        let col = col - 1;
        if col >= MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(
                col.min(u16::MAX as u32) as u16,
                MAX_COLS - 1,
            ));
        }

        Ok(col as u16)
    }

    /// Format as A1-style string, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();
        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));
        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());
        result
    }

    /// Same position without `$` markers
    pub fn relative(&self) -> Self {
        Self::new(self.row, self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10"), always normalized top-left to bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range from two corners in any order
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (top, bottom) = if start.row <= end.row {
            ((start.row, start.row_absolute), (end.row, end.row_absolute))
        } else {
            ((end.row, end.row_absolute), (start.row, start.row_absolute))
        };
        let (left, right) = if start.col <= end.col {
            ((start.col, start.col_absolute), (end.col, end.col_absolute))
        } else {
            ((end.col, end.col_absolute), (start.col, start.col_absolute))
        };

        Self {
            start: CellAddress::with_absolute(top.0, left.0, top.1, left.1),
            end: CellAddress::with_absolute(bottom.0, right.0, bottom.1, right.1),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation (a lone address is a single-cell range)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((start, end)) => Ok(Self::new(
                CellAddress::parse(start)?,
                CellAddress::parse(end)?,
            )),
            None => Ok(Self::single(CellAddress::parse(s)?)),
        }
    }

    /// Check if a position is within this range
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Check if this range is a single cell
    pub fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Get the intersection of two ranges, if any
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        if !self.overlaps(other) {
            return None;
        }

        Some(CellRange::from_indices(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        ))
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);

        if self.current_col >= self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }
}

/// Whole rows (e.g., "1:1", "$2:$5")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowSpan {
    /// First row (0-based)
    pub start: u32,
    /// Last row (0-based, inclusive)
    pub end: u32,
    pub start_absolute: bool,
    pub end_absolute: bool,
}

impl RowSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            start_absolute: false,
            end_absolute: false,
        }
    }

    /// Parse `1:3` style notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidRange(format!("row span needs ':' in '{}'", s)))?;
        let (start, start_absolute) = parse_row_part(a)
            .ok_or_else(|| Error::InvalidRange(format!("invalid row in '{}'", s)))?;
        let (end, end_absolute) = parse_row_part(b)
            .ok_or_else(|| Error::InvalidRange(format!("invalid row in '{}'", s)))?;
        let (start, end) = (check_row(start, s)?, check_row(end, s)?);

        let mut span = Self::new(start, end);
        if start <= end {
            span.start_absolute = start_absolute;
            span.end_absolute = end_absolute;
        } else {
            span.start_absolute = end_absolute;
            span.end_absolute = start_absolute;
        }
        Ok(span)
    }

    pub fn contains(&self, row: u32) -> bool {
        row >= self.start && row <= self.end
    }

    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl fmt::Display for RowSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = |a: bool| if a { "$" } else { "" };
        write!(
            f,
            "{}{}:{}{}",
            abs(self.start_absolute),
            self.start + 1,
            abs(self.end_absolute),
            self.end + 1
        )
    }
}

/// Whole columns (e.g., "A:A", "$B:$D")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnSpan {
    /// First column (0-based)
    pub start: u16,
    /// Last column (0-based, inclusive)
    pub end: u16,
    pub start_absolute: bool,
    pub end_absolute: bool,
}

impl ColumnSpan {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
            start_absolute: false,
            end_absolute: false,
        }
    }

    /// Parse `A:C` style notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidRange(format!("column span needs ':' in '{}'", s)))?;

        let side = |part: &str| -> Result<(u16, bool)> {
            match parse_column_part(part) {
                Some((letters, absolute, "")) => {
                    Ok((CellAddress::letters_to_column(letters)?, absolute))
                }
                _ => Err(Error::InvalidRange(format!("invalid column in '{}'", s))),
            }
        };
        let (start, start_absolute) = side(a)?;
        let (end, end_absolute) = side(b)?;

        let mut span = Self::new(start, end);
        if start <= end {
            span.start_absolute = start_absolute;
            span.end_absolute = end_absolute;
        } else {
            span.start_absolute = end_absolute;
            span.end_absolute = start_absolute;
        }
        Ok(span)
    }

    pub fn contains(&self, col: u16) -> bool {
        col >= self.start && col <= self.end
    }

    pub fn count(&self) -> u16 {
        self.end - self.start + 1
    }
}

impl fmt::Display for ColumnSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = |a: bool| if a { "$" } else { "" };
        write!(
            f,
            "{}{}:{}{}",
            abs(self.start_absolute),
            CellAddress::column_to_letters(self.start),
            abs(self.end_absolute),
            CellAddress::column_to_letters(self.end)
        )
    }
}

/// Split `$AB12` into (`AB`, true, `12`). Returns None when there are no letters.
fn parse_column_part(s: &str) -> Option<(&str, bool, &str)> {
    let (absolute, s) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((&s[..end], absolute, &s[end..]))
}

/// Parse `$12` / `12` into a 1-based row number.
fn parse_row_part(s: &str) -> Option<(u32, bool)> {
    let (absolute, digits) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|row| (row, absolute))
}

/// Convert a 1-based row number to 0-based, enforcing sheet limits.
fn check_row(row: u32, source: &str) -> Result<u32> {
    if row == 0 {
        return Err(Error::InvalidAddress(format!(
            "row number must be >= 1 in '{}'",
            source
        )));
    }
    if row > MAX_ROWS {
        return Err(Error::RowOutOfBounds(row - 1, MAX_ROWS - 1));
    }
    Ok(row - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_letters_round_trip() {
        let cases = [(0, "A"), (25, "Z"), (26, "AA"), (701, "ZZ"), (702, "AAA"), (16383, "XFD")];
        for (col, letters) in cases {
            assert_eq!(CellAddress::column_to_letters(col), letters);
            assert_eq!(CellAddress::letters_to_column(letters).unwrap(), col);
        }
        assert_eq!(CellAddress::letters_to_column("aa").unwrap(), 26);
        assert!(CellAddress::letters_to_column("XFE").is_err());
        assert!(CellAddress::letters_to_column("ABCD").is_err());
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("B2").unwrap();
        assert_eq!((addr.row, addr.col), (1, 1));
        assert!(!addr.row_absolute && !addr.col_absolute);

        let addr = CellAddress::parse("$A1").unwrap();
        assert!(addr.col_absolute);
        assert!(!addr.row_absolute);

        let addr = CellAddress::parse("A$1").unwrap();
        assert!(!addr.col_absolute);
        assert!(addr.row_absolute);

        let addr = CellAddress::parse("XFD1048576").unwrap();
        assert_eq!((addr.row, addr.col), (1048575, 16383));
    }

    #[test]
    fn test_cell_address_parse_errors() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellAddress::parse("XFE1").is_err());
        assert!(CellAddress::parse("A1B").is_err());
    }

    #[test]
    fn test_display_keeps_absolute_markers() {
        assert_eq!(CellAddress::new(99, 2).to_string(), "C100");
        assert_eq!(CellAddress::with_absolute(0, 0, true, true).to_string(), "$A$1");
        assert_eq!(CellRange::parse("$A$1:B2").unwrap().to_string(), "$A$1:B2");
    }

    #[test]
    fn test_cell_range_normalizes() {
        let range = CellRange::parse("B3:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(2, 1));
        assert_eq!(range.row_count(), 3);
        assert_eq!(range.col_count(), 2);
        assert!(CellRange::parse("C3").unwrap().is_single_cell());
    }

    #[test]
    fn test_cell_range_contains_and_intersect() {
        let range = CellRange::parse("B2:D4").unwrap();
        assert!(range.contains(1, 1));
        assert!(range.contains(3, 3));
        assert!(!range.contains(0, 0));

        let other = CellRange::parse("C3:F9").unwrap();
        assert_eq!(range.intersect(&other), Some(CellRange::parse("C3:D4").unwrap()));
        assert_eq!(range.union(&other), CellRange::parse("B2:F9").unwrap());
        assert_eq!(range.intersect(&CellRange::parse("Z1:Z2").unwrap()), None);
    }

    #[test]
    fn test_cell_range_iterator() {
        let cells: Vec<_> = CellRange::parse("A1:B2").unwrap().cells().collect();
        assert_eq!(
            cells,
            vec![
                CellAddress::new(0, 0),
                CellAddress::new(0, 1),
                CellAddress::new(1, 0),
                CellAddress::new(1, 1),
            ]
        );
    }

    #[test]
    fn test_row_span() {
        let span = RowSpan::parse("$5:2").unwrap();
        assert_eq!((span.start, span.end), (1, 4));
        assert!(!span.start_absolute);
        assert!(span.end_absolute);
        assert_eq!(span.to_string(), "2:$5");
        assert!(RowSpan::parse("0:1").is_err());
        assert!(RowSpan::parse("A:B").is_err());
    }

    #[test]
    fn test_column_span() {
        let span = ColumnSpan::parse("A:C").unwrap();
        assert_eq!((span.start, span.end), (0, 2));
        assert_eq!(span.count(), 3);
        assert_eq!(span.to_string(), "A:C");
        assert!(ColumnSpan::parse("A1:C").is_err());
    }
}
