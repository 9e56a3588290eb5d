//! Defined names
//!
//! A defined name maps an identifier such as `TaxRate` to a formula expression
//! (`Sheet1!$B$1`, `0.05`, `SUM(Data!A:A)`). Names are either visible to the
//! whole workbook or scoped to a single sheet; sheet-scoped names shadow
//! workbook-scoped ones while evaluating on that sheet.

use crate::cell::{CellAddress, CellError};
use crate::error::{Error, Result};
use ahash::AHashMap;

/// Visibility of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from the sheet with this index
    Sheet(usize),
}

/// A defined name
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedRange {
    /// Name as written by the user (lookups are case-insensitive)
    pub name: String,
    /// Expression the name stands for, with or without a leading `=`
    pub refers_to: String,
    pub scope: NameScope,
    pub comment: Option<String>,
}

impl NamedRange {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            refers_to: refers_to.into(),
            scope,
            comment: None,
        }
    }

    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The expression without a leading `=`
    pub fn expression(&self) -> &str {
        self.refers_to.strip_prefix('=').unwrap_or(&self.refers_to)
    }

    /// Check that `name` can be used as a defined name
    ///
    /// Names start with a letter, `_` or `\`, contain only letters, digits, `_`
    /// and `.`, and must not look like a cell address, a boolean or an error.
    pub fn validate_name(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let first_ok =
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '\\');
        if !first_ok || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(Error::InvalidName(format!("'{}' is not a valid name", name)));
        }
        if CellAddress::parse(name).is_ok()
            || name.eq_ignore_ascii_case("TRUE")
            || name.eq_ignore_ascii_case("FALSE")
            || CellError::parse(name).is_some()
        {
            return Err(Error::InvalidName(format!(
                "'{}' collides with a reference or literal",
                name
            )));
        }
        Ok(())
    }
}

/// Collection of defined names with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: AHashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_uppercase(), scope)
    }

    /// Define a new name; fails if the name is invalid or already defined in that scope
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        let key = Self::key(&range.name, range.scope);
        if self.names.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' already exists in this scope",
                range.name
            )));
        }
        self.names.insert(key, range);
        Ok(())
    }

    /// Define or replace a name
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        self.names.insert(Self::key(&range.name, range.scope), range);
        Ok(())
    }

    /// Look up a name as seen from `current_sheet`: sheet scope first, then workbook scope
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.names
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.names.get(&Self::key(name, NameScope::Workbook)))
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.names.remove(&Self::key(name, scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_strips_equals() {
        assert_eq!(NamedRange::workbook_scope("Total", "=SUM(A1:A10)").expression(), "SUM(A1:A10)");
        assert_eq!(NamedRange::workbook_scope("Rate", "Sheet1!$B$1").expression(), "Sheet1!$B$1");
    }

    #[test]
    fn test_scope_lookup() {
        let mut names = NamedRangeCollection::new();
        names.define(NamedRange::workbook_scope("Rate", "0.05")).unwrap();
        names.define(NamedRange::sheet_scope("Rate", "0.08", 0)).unwrap();

        assert_eq!(names.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(names.get("rate", 1).unwrap().refers_to, "0.05");
        assert!(names.get("Missing", 0).is_none());
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut names = NamedRangeCollection::new();
        names.define(NamedRange::workbook_scope("TaxRate", "0.05")).unwrap();
        assert!(names.define(NamedRange::workbook_scope("TAXRATE", "0.1")).is_err());

        assert!(names.define(NamedRange::workbook_scope("A1", "1")).is_err());
        assert!(names.define(NamedRange::workbook_scope("1abc", "1")).is_err());
        assert!(names.define(NamedRange::workbook_scope("true", "1")).is_err());
        assert!(names.define(NamedRange::workbook_scope("my name", "1")).is_err());
        assert!(names.define(NamedRange::workbook_scope("_private.rate", "1")).is_ok());
    }
}
