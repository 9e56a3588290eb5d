//! Token grammar
//!
//! The symbols recognised by the lexer, the names of the functions that back
//! each operator, and the priorities of the AST node factories. These are a
//! stable public contract: editors and autocomplete can reuse them to stay in
//! sync with the parser.

use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::fmt;

/// Optional leading marker of formula text
pub const FORMULA_PREFIX: char = '=';
/// Joins two references into the range that spans them (`A1:B2`)
pub const RANGE_SEPARATOR: char = ':';
/// Separates a sheet name from the reference on that sheet (`Sheet1!A1`)
pub const SHEET_QUALIFIER: char = '!';
/// Separates function arguments and array columns
pub const ARGUMENT_SEPARATOR: char = ',';
/// Separates array constant rows (`{1,2;3,4}`)
pub const ARRAY_ROW_SEPARATOR: char = ';';
pub const STRING_QUOTE: char = '"';
/// Quotes sheet names that contain spaces or punctuation (`'My Sheet'!A1`)
pub const SHEET_QUOTE: char = '\'';
pub const OPEN_PAREN: char = '(';
pub const CLOSE_PAREN: char = ')';
pub const OPEN_BRACE: char = '{';
pub const CLOSE_BRACE: char = '}';
/// Opens a table column specifier (`Sales[Amount]`)
pub const OPEN_BRACKET: char = '[';
pub const CLOSE_BRACKET: char = ']';
/// First character of every error literal (`#N/A`)
pub const ERROR_PREFIX: char = '#';
/// Marks an absolute row or column in a reference
pub const ABSOLUTE_MARKER: char = '$';

/// Token carried by the synthetic lexer node at the top of every tree
pub const ROOT_TOKEN: &str = "R_1";

/// Binary operators, loosest binding first in [`OperatorToken::ALL`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatorToken {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Concatenate,
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
}

static OPERATORS_BY_SYMBOL: Lazy<AHashMap<&'static str, OperatorToken>> = Lazy::new(|| {
    OperatorToken::ALL
        .iter()
        .map(|&op| (op.symbol(), op))
        .collect()
});

impl OperatorToken {
    pub const ALL: [OperatorToken; 12] = [
        OperatorToken::Equal,
        OperatorToken::NotEqual,
        OperatorToken::LessThan,
        OperatorToken::LessThanOrEqual,
        OperatorToken::GreaterThan,
        OperatorToken::GreaterThanOrEqual,
        OperatorToken::Concatenate,
        OperatorToken::Plus,
        OperatorToken::Minus,
        OperatorToken::Multiply,
        OperatorToken::Divide,
        OperatorToken::Power,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            OperatorToken::Equal => "=",
            OperatorToken::NotEqual => "<>",
            OperatorToken::LessThan => "<",
            OperatorToken::LessThanOrEqual => "<=",
            OperatorToken::GreaterThan => ">",
            OperatorToken::GreaterThanOrEqual => ">=",
            OperatorToken::Concatenate => "&",
            OperatorToken::Plus => "+",
            OperatorToken::Minus => "-",
            OperatorToken::Multiply => "*",
            OperatorToken::Divide => "/",
            OperatorToken::Power => "^",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        OPERATORS_BY_SYMBOL.get(symbol).copied()
    }

    /// Binding strength; higher binds tighter. All binary operators are left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            OperatorToken::Equal
            | OperatorToken::NotEqual
            | OperatorToken::LessThan
            | OperatorToken::LessThanOrEqual
            | OperatorToken::GreaterThan
            | OperatorToken::GreaterThanOrEqual => 1,
            OperatorToken::Concatenate => 2,
            OperatorToken::Plus | OperatorToken::Minus => 3,
            OperatorToken::Multiply | OperatorToken::Divide => 4,
            OperatorToken::Power => 5,
        }
    }

    /// Registry name of the function that implements the operator
    pub fn function_name(self) -> &'static str {
        match self {
            OperatorToken::Equal => "EQ",
            OperatorToken::NotEqual => "NE",
            OperatorToken::LessThan => "LT",
            OperatorToken::LessThanOrEqual => "LTE",
            OperatorToken::GreaterThan => "GT",
            OperatorToken::GreaterThanOrEqual => "GTE",
            OperatorToken::Concatenate => "AMPERSAND",
            OperatorToken::Plus => "PLUS",
            OperatorToken::Minus => "MINUS",
            OperatorToken::Multiply => "MULTIPLY",
            OperatorToken::Divide => "DIVIDE",
            OperatorToken::Power => "POW",
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

impl fmt::Display for OperatorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators written before their operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefixToken {
    /// Negation, computed as `MINUS(0, x)`
    Minus,
    /// Implicit intersection against the current cell
    At,
}

impl PrefixToken {
    pub const ALL: [PrefixToken; 2] = [PrefixToken::Minus, PrefixToken::At];

    pub fn symbol(self) -> &'static str {
        match self {
            PrefixToken::Minus => "-",
            PrefixToken::At => "@",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.symbol() == symbol)
    }
}

impl fmt::Display for PrefixToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators written after their operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SuffixToken {
    Percent,
}

impl SuffixToken {
    pub fn symbol(self) -> &'static str {
        match self {
            SuffixToken::Percent => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        (symbol == "%").then_some(SuffixToken::Percent)
    }

    pub fn function_name(self) -> &'static str {
        match self {
            SuffixToken::Percent => "PERCENT",
        }
    }
}

impl fmt::Display for SuffixToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Binding strength of prefix operators relative to [`OperatorToken::precedence`]
pub const PREFIX_PRECEDENCE: u8 = 6;
/// Binding strength of suffix operators
pub const SUFFIX_PRECEDENCE: u8 = 7;
/// Binding strength of the range operator
pub const RANGE_PRECEDENCE: u8 = 8;

/// Factory priorities; the AST builder tries factories from the highest value down
pub mod z_index {
    pub const ROOT: u16 = 100;
    pub const FUNCTION: u16 = 90;
    pub const GROUP: u16 = 85;
    pub const PREFIX: u16 = 80;
    pub const SUFFIX: u16 = 75;
    pub const OPERATOR: u16 = 70;
    pub const ARRAY: u16 = 60;
    pub const LITERAL: u16 = 50;
    pub const REFERENCE: u16 = 40;
    pub const NAME: u16 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in OperatorToken::ALL {
            assert_eq!(OperatorToken::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(OperatorToken::from_symbol("=="), None);
        assert_eq!(PrefixToken::from_symbol("@"), Some(PrefixToken::At));
        assert_eq!(SuffixToken::from_symbol("%"), Some(SuffixToken::Percent));
    }

    #[test]
    fn test_precedence_order() {
        use OperatorToken::*;
        assert!(Equal.precedence() < Concatenate.precedence());
        assert!(Concatenate.precedence() < Plus.precedence());
        assert!(Minus.precedence() < Multiply.precedence());
        assert!(Divide.precedence() < Power.precedence());
        assert!(Power.precedence() < PREFIX_PRECEDENCE);
        assert!(GreaterThanOrEqual.is_comparison());
        assert!(!Concatenate.is_comparison());
    }
}
