//! Lexer
//!
//! Turns formula text into a tree of [`LexerNode`]s. Scanning happens in two
//! steps: a flat pass that splits the text into lexemes (keeping string
//! literals, quoted sheet names, error literals and whole references atomic),
//! followed by precedence climbing that nests the lexemes into function calls,
//! groups, prefix/suffix/infix nodes and array constants.
//!
//! Operator precedence, loosest first:
//!
//! 1. Comparison: `=`, `<>`, `<`, `<=`, `>`, `>=`
//! 2. Concatenation: `&`
//! 3. Additive: `+`, `-`
//! 4. Multiplicative: `*`, `/`
//! 5. Exponent: `^` (left-associative)
//! 6. Prefix: `-`, `@` (`+` is accepted and dropped)
//! 7. Suffix: `%`
//! 8. Range: `:`

use std::fmt;

use gridcalc_core::CellError;
use lazy_regex::regex_is_match;

use crate::error::ParseError;
use crate::token::{
    OperatorToken, PrefixToken, SuffixToken, ABSOLUTE_MARKER, ARRAY_ROW_SEPARATOR, CLOSE_BRACE,
    CLOSE_BRACKET, CLOSE_PAREN, ERROR_PREFIX, FORMULA_PREFIX, OPEN_BRACE, OPEN_BRACKET, OPEN_PAREN,
    RANGE_SEPARATOR, ROOT_TOKEN, SHEET_QUALIFIER, SHEET_QUOTE, STRING_QUOTE,
};

/// Byte range of the formula text a node was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Syntactic role of a [`LexerNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexerNodeKind {
    /// Synthetic top node, token [`ROOT_TOKEN`], exactly one child
    Root,
    /// `NAME(args...)`; the token is the name as written
    Function,
    /// A parenthesized expression with one child
    Group,
    /// `-x` or `@x`
    Prefix,
    /// `x%`
    Suffix,
    /// `a op b`, including the range operator `:`
    Infix,
    /// `{...}` whose children are [`LexerNodeKind::ArrayRow`] nodes
    Array,
    ArrayRow,
    /// Literal, reference or name text with no children
    Leaf,
}

/// One syntactic unit of a formula
#[derive(Debug, Clone, PartialEq)]
pub struct LexerNode {
    kind: LexerNodeKind,
    token: String,
    children: Vec<LexerNode>,
    span: Span,
}

impl LexerNode {
    fn leaf(token: impl Into<String>, span: Span) -> Self {
        Self {
            kind: LexerNodeKind::Leaf,
            token: token.into(),
            children: Vec::new(),
            span,
        }
    }

    fn branch(
        kind: LexerNodeKind,
        token: impl Into<String>,
        children: Vec<LexerNode>,
        span: Span,
    ) -> Self {
        Self {
            kind,
            token: token.into(),
            children,
            span,
        }
    }

    pub fn kind(&self) -> LexerNodeKind {
        self.kind
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Children in left-to-right order
    pub fn children(&self) -> &[LexerNode] {
        &self.children
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == LexerNodeKind::Leaf
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{:?} {}", "", self.kind, self.token, indent = depth * 2)?;
        for child in &self.children {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented tree, one node per line
impl fmt::Display for LexerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

/// Tokenize formula text (with or without the leading `=`) into a tree
pub fn tokenize(formula: &str) -> Result<LexerNode, ParseError> {
    let body_start = formula.len() - formula.trim_start().len();
    let body_start = if formula[body_start..].starts_with(FORMULA_PREFIX) {
        body_start + FORMULA_PREFIX.len_utf8()
    } else {
        body_start
    };

    let lexemes = Scanner::new(formula, body_start).scan()?;
    if lexemes.is_empty() {
        return Err(ParseError::EmptyFormula);
    }

    let mut builder = TreeBuilder {
        items: lexemes,
        pos: 0,
    };
    let expression = builder.expression()?;
    if let Some(extra) = builder.items.get(builder.pos) {
        return Err(ParseError::UnexpectedToken {
            token: extra.text.clone(),
            position: extra.span.start,
        });
    }

    Ok(LexerNode::branch(
        LexerNodeKind::Root,
        ROOT_TOKEN,
        vec![expression],
        Span::new(0, formula.len()),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lexeme {
    Number,
    Text,
    Error,
    Word,
    Operator(OperatorToken),
    Percent,
    At,
    Colon,
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    OpenBrace,
    CloseBrace,
}

#[derive(Debug, Clone)]
struct Scanned {
    lexeme: Lexeme,
    text: String,
    span: Span,
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    open: Vec<(char, usize)>,
    out: Vec<Scanned>,
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'\\' || b == ABSOLUTE_MARKER as u8 || b >= 0x80
}

fn is_word_byte(b: u8) -> bool {
    is_word_start(b) || b.is_ascii_digit() || b == b'.'
}

fn is_cell_ref(s: &str) -> bool {
    regex_is_match!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+$", s)
}

fn is_column_ref(s: &str) -> bool {
    regex_is_match!(r"^\$?[A-Za-z]{1,3}$", s)
}

fn is_row_ref(s: &str) -> bool {
    regex_is_match!(r"^\$?[0-9]+$", s)
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, start: usize) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: start,
            open: Vec::new(),
            out: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().map_or(false, &pred) {
            self.pos += 1;
        }
    }

    fn push(&mut self, lexeme: Lexeme, start: usize) {
        self.out.push(Scanned {
            lexeme,
            text: self.src[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        });
    }

    fn single(&mut self, lexeme: Lexeme, start: usize) {
        self.pos += 1;
        self.push(lexeme, start);
    }

    fn unexpected(&self, start: usize) -> ParseError {
        let token = self.src[start..].chars().next().map(String::from).unwrap_or_default();
        ParseError::UnexpectedToken {
            token,
            position: start,
        }
    }

    fn scan(mut self) -> Result<Vec<Scanned>, ParseError> {
        while let Some(b) = self.peek() {
            let start = self.pos;
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'"' => self.string(start)?,
                b'\'' => self.quoted_reference(start)?,
                b'#' => self.error_literal(start)?,
                b'0'..=b'9' => self.number(start),
                b'.' if self.peek_at(1).map_or(false, |d| d.is_ascii_digit()) => self.number(start),
                b'(' => {
                    self.open.push((OPEN_PAREN, start));
                    self.single(Lexeme::OpenParen, start);
                }
                b'{' => {
                    self.open.push((OPEN_BRACE, start));
                    self.single(Lexeme::OpenBrace, start);
                }
                b')' => {
                    self.close(CLOSE_PAREN, start)?;
                    self.single(Lexeme::CloseParen, start);
                }
                b'}' => {
                    self.close(CLOSE_BRACE, start)?;
                    self.single(Lexeme::CloseBrace, start);
                }
                b']' => {
                    return Err(ParseError::UnbalancedBracket {
                        bracket: CLOSE_BRACKET,
                        position: start,
                    })
                }
                b',' => self.single(Lexeme::Comma, start),
                b';' => self.single(Lexeme::Semicolon, start),
                b':' => self.single(Lexeme::Colon, start),
                b'%' => self.single(Lexeme::Percent, start),
                b'@' => self.single(Lexeme::At, start),
                b'<' | b'>' | b'=' | b'+' | b'-' | b'*' | b'/' | b'^' | b'&' => {
                    self.operator(start)?
                }
                b if is_word_start(b) => self.word(start)?,
                _ => return Err(self.unexpected(start)),
            }
        }

        match self.open.last() {
            Some(&(OPEN_PAREN, position)) => Err(ParseError::UnbalancedParenthesis { position }),
            Some(&(bracket, position)) => Err(ParseError::UnbalancedBracket { bracket, position }),
            None => Ok(self.out),
        }
    }

    fn close(&mut self, closing: char, position: usize) -> Result<(), ParseError> {
        let expected = if closing == CLOSE_PAREN { OPEN_PAREN } else { OPEN_BRACE };
        match self.open.pop() {
            Some((opened, _)) if opened == expected => Ok(()),
            _ if closing == CLOSE_PAREN => Err(ParseError::UnbalancedParenthesis { position }),
            _ => Err(ParseError::UnbalancedBracket {
                bracket: closing,
                position,
            }),
        }
    }

    fn operator(&mut self, start: usize) -> Result<(), ParseError> {
        let two = self.src.get(start..start + 2);
        let len = match two {
            Some("<>") | Some("<=") | Some(">=") => 2,
            _ => 1,
        };
        let op = OperatorToken::from_symbol(&self.src[start..start + len])
            .ok_or_else(|| self.unexpected(start))?;
        self.pos += len;
        self.push(Lexeme::Operator(op), start);
        Ok(())
    }

    /// `"..."` with `""` as an escaped quote; kept with its quotes
    fn string(&mut self, start: usize) -> Result<(), ParseError> {
        self.pos += 1;
        loop {
            match self.src[self.pos..].find(STRING_QUOTE) {
                None => return Err(ParseError::UnterminatedString { position: start }),
                Some(offset) => {
                    self.pos += offset + 1;
                    if self.peek() == Some(STRING_QUOTE as u8) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
            }
        }
        self.push(Lexeme::Text, start);
        Ok(())
    }

    fn error_literal(&mut self, start: usize) -> Result<(), ParseError> {
        let matched = CellError::ALL.into_iter().find(|e| {
            let code = e.as_str();
            self.src
                .get(start..start + code.len())
                .map_or(false, |s| s.eq_ignore_ascii_case(code))
        });
        match matched {
            Some(e) => {
                self.pos += e.as_str().len();
                self.push(Lexeme::Error, start);
                Ok(())
            }
            None => Err(ParseError::UnexpectedToken {
                token: ERROR_PREFIX.to_string(),
                position: start,
            }),
        }
    }

    /// Numbers, or whole-row spans such as `1:3`
    fn number(&mut self, start: usize) {
        self.eat_while(|b| b.is_ascii_digit());
        if self.peek() == Some(RANGE_SEPARATOR as u8) && self.merge_range(start) {
            self.push(Lexeme::Word, start);
            return;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.eat_while(|b| b.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).map_or(false, |d| d.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.eat_while(|b| b.is_ascii_digit());
            }
        }
        self.push(Lexeme::Number, start);
    }

    /// Identifiers, references (`A1`, `Sheet1!A1:B2`, `A:C`) and tables (`Sales[Amount]`)
    fn word(&mut self, start: usize) -> Result<(), ParseError> {
        self.eat_while(is_word_byte);
        let mut reference_start = start;
        if self.peek() == Some(SHEET_QUALIFIER as u8) {
            self.pos += 1;
            reference_start = self.pos;
            self.qualified_reference_body()?;
        }
        if self.peek() == Some(OPEN_BRACKET as u8) {
            self.table_specifier()?;
        } else if self.peek() == Some(RANGE_SEPARATOR as u8) {
            self.merge_range(reference_start);
        }
        self.push(Lexeme::Word, start);
        Ok(())
    }

    /// `'My Sheet'!A1`, with `''` as an escaped quote inside the sheet name
    fn quoted_reference(&mut self, start: usize) -> Result<(), ParseError> {
        self.pos += 1;
        loop {
            match self.src[self.pos..].find(SHEET_QUOTE) {
                None => return Err(ParseError::UnterminatedSheetName { position: start }),
                Some(offset) => {
                    self.pos += offset + 1;
                    if self.peek() == Some(SHEET_QUOTE as u8) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
            }
        }
        match self.peek() {
            Some(b) if b == SHEET_QUALIFIER as u8 => {}
            Some(_) => return Err(self.unexpected(self.pos)),
            None => return Err(ParseError::UnexpectedEnd),
        }
        self.pos += 1;
        let reference_start = self.pos;
        self.qualified_reference_body()?;
        if self.peek() == Some(RANGE_SEPARATOR as u8) {
            self.merge_range(reference_start);
        }
        self.push(Lexeme::Word, start);
        Ok(())
    }

    fn qualified_reference_body(&mut self) -> Result<(), ParseError> {
        let body_start = self.pos;
        self.eat_while(is_word_byte);
        if self.pos == body_start {
            return Err(match self.peek() {
                Some(_) => self.unexpected(self.pos),
                None => ParseError::UnexpectedEnd,
            });
        }
        Ok(())
    }

    fn table_specifier(&mut self) -> Result<(), ParseError> {
        let open_at = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::UnbalancedBracket {
            bracket: OPEN_BRACKET,
            position: open_at,
        })
    }

    /// Extend the reference ending at `self.pos` across a following `:` when both
    /// sides are references of the same shape (`A1:B2`, `A:C`, `1:3`).
    fn merge_range(&mut self, reference_start: usize) -> bool {
        let left = &self.src[reference_start..self.pos];
        let right_start = self.pos + 1;
        let right_len = self.bytes[right_start..]
            .iter()
            .take_while(|&&b| b.is_ascii_alphanumeric() || b == ABSOLUTE_MARKER as u8)
            .count();
        let right = &self.src[right_start..right_start + right_len];
        let followed_by = self.bytes.get(right_start + right_len).copied();
        if matches!(followed_by, Some(b'(' | b'!' | b'[' | b'.' | b'_')) {
            return false;
        }

        let same_shape = (is_cell_ref(left) && is_cell_ref(right))
            || (is_column_ref(left) && is_column_ref(right))
            || (is_row_ref(left) && is_row_ref(right));
        if same_shape {
            self.pos = right_start + right_len;
        }
        same_shape
    }
}

struct TreeBuilder {
    items: Vec<Scanned>,
    pos: usize,
}

impl TreeBuilder {
    fn peek(&self) -> Option<&Scanned> {
        self.items.get(self.pos)
    }

    fn peek_lexeme(&self) -> Option<Lexeme> {
        self.peek().map(|s| s.lexeme)
    }

    fn next(&mut self) -> Result<Scanned, ParseError> {
        let item = self.items.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(item)
    }

    fn unexpected(item: &Scanned) -> ParseError {
        ParseError::UnexpectedToken {
            token: item.text.clone(),
            position: item.span.start,
        }
    }

    fn expression(&mut self) -> Result<LexerNode, ParseError> {
        self.binary(1)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<LexerNode, ParseError> {
        let mut left = self.unary()?;
        while let Some(Lexeme::Operator(op)) = self.peek_lexeme() {
            if op.precedence() < min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.binary(op.precedence() + 1)?;
            let span = left.span.join(right.span);
            left = LexerNode::branch(LexerNodeKind::Infix, op.symbol(), vec![left, right], span);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<LexerNode, ParseError> {
        let prefix = match self.peek_lexeme() {
            Some(Lexeme::Operator(OperatorToken::Minus)) => Some(PrefixToken::Minus),
            Some(Lexeme::At) => Some(PrefixToken::At),
            Some(Lexeme::Operator(OperatorToken::Plus)) => {
                self.pos += 1;
                return self.unary();
            }
            _ => None,
        };

        match prefix {
            Some(prefix) => {
                let start = self.next()?.span;
                let operand = self.unary()?;
                let span = start.join(operand.span);
                Ok(LexerNode::branch(
                    LexerNodeKind::Prefix,
                    prefix.symbol(),
                    vec![operand],
                    span,
                ))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<LexerNode, ParseError> {
        let mut node = self.range()?;
        while self.peek_lexeme() == Some(Lexeme::Percent) {
            let percent = self.next()?;
            let span = node.span.join(percent.span);
            node = LexerNode::branch(
                LexerNodeKind::Suffix,
                SuffixToken::Percent.symbol(),
                vec![node],
                span,
            );
        }
        Ok(node)
    }

    fn range(&mut self) -> Result<LexerNode, ParseError> {
        let mut node = self.primary()?;
        while self.peek_lexeme() == Some(Lexeme::Colon) {
            self.pos += 1;
            let right = self.primary()?;
            let span = node.span.join(right.span);
            node = LexerNode::branch(
                LexerNodeKind::Infix,
                RANGE_SEPARATOR.to_string(),
                vec![node, right],
                span,
            );
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<LexerNode, ParseError> {
        let item = self.next()?;
        match item.lexeme {
            Lexeme::Number | Lexeme::Text | Lexeme::Error => {
                Ok(LexerNode::leaf(item.text, item.span))
            }
            Lexeme::Word => {
                if self.peek_lexeme() == Some(Lexeme::OpenParen) {
                    self.function_call(item)
                } else {
                    Ok(LexerNode::leaf(item.text, item.span))
                }
            }
            Lexeme::OpenParen => {
                let inner = self.expression()?;
                let close = self.next()?;
                if close.lexeme != Lexeme::CloseParen {
                    return Err(Self::unexpected(&close));
                }
                Ok(LexerNode::branch(
                    LexerNodeKind::Group,
                    OPEN_PAREN.to_string(),
                    vec![inner],
                    item.span.join(close.span),
                ))
            }
            Lexeme::OpenBrace => self.array(item.span),
            _ => Err(Self::unexpected(&item)),
        }
    }

    fn function_call(&mut self, name: Scanned) -> Result<LexerNode, ParseError> {
        self.pos += 1;
        let mut args = Vec::new();
        if self.peek_lexeme() == Some(Lexeme::CloseParen) {
            let close = self.next()?;
            return Ok(LexerNode::branch(
                LexerNodeKind::Function,
                name.text,
                args,
                name.span.join(close.span),
            ));
        }

        loop {
            let omitted_at = self
                .peek()
                .filter(|next| matches!(next.lexeme, Lexeme::Comma | Lexeme::CloseParen))
                .map(|next| next.span.start);
            let arg = match omitted_at {
                Some(at) => LexerNode::leaf("", Span::new(at, at)),
                None => self.expression()?,
            };
            args.push(arg);

            let separator = self.next()?;
            match separator.lexeme {
                Lexeme::Comma => continue,
                Lexeme::CloseParen => {
                    return Ok(LexerNode::branch(
                        LexerNodeKind::Function,
                        name.text,
                        args,
                        name.span.join(separator.span),
                    ))
                }
                _ => return Err(Self::unexpected(&separator)),
            }
        }
    }

    fn array(&mut self, open: Span) -> Result<LexerNode, ParseError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            row.push(self.unary()?);
            let separator = self.next()?;
            match separator.lexeme {
                Lexeme::Comma => {}
                Lexeme::Semicolon | Lexeme::CloseBrace => {
                    let span = row
                        .iter()
                        .map(|n: &LexerNode| n.span)
                        .reduce(Span::join)
                        .unwrap_or(separator.span);
                    rows.push(LexerNode::branch(
                        LexerNodeKind::ArrayRow,
                        ARRAY_ROW_SEPARATOR.to_string(),
                        std::mem::take(&mut row),
                        span,
                    ));
                    if separator.lexeme == Lexeme::CloseBrace {
                        return Ok(LexerNode::branch(
                            LexerNodeKind::Array,
                            OPEN_BRACE.to_string(),
                            rows,
                            open.join(separator.span),
                        ));
                    }
                }
                _ => return Err(Self::unexpected(&separator)),
            }
        }
    }
}
