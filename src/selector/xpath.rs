//! XPath 1.0 syntax checker.
//!
//! Recognises the full expression grammar (location paths, axes, node
//! tests, predicates, function calls, operators) without evaluating
//! anything. Function names are not checked against a library.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    ColonColon,
    Dot,
    DotDot,
    Pipe,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Star,
    Dollar,
    Literal,
    Number,
    /// QName, or `prefix:*`
    Name(String),
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Name(name) => write!(f, "'{}'", name),
            Tok::Literal => f.write_str("string literal"),
            Tok::Number => f.write_str("number"),
            Tok::Eof => f.write_str("end of query"),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Syntax error with the character offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for XPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for XPathError {}

const NODE_TYPES: [&str; 4] = ["comment", "text", "processing-instruction", "node"];

const AXES: [&str; 13] = [
    "ancestor",
    "ancestor-or-self",
    "attribute",
    "child",
    "descendant",
    "descendant-or-self",
    "following",
    "following-sibling",
    "namespace",
    "parent",
    "preceding",
    "preceding-sibling",
    "self",
];

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        XPathError {
            offset: self.position,
            message: message.into(),
        }
    }

    fn is_name_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_name_char(c: char) -> bool {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
    }

    fn read_ncname(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_name_char(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn read_name(&mut self) -> String {
        let mut name = self.read_ncname();
        if self.current_char() == Some(':') && self.peek_char(1) != Some(':') {
            match self.peek_char(1) {
                Some('*') => {
                    self.advance();
                    self.advance();
                    name.push_str(":*");
                }
                Some(c) if Self::is_name_start(c) => {
                    self.advance();
                    name.push(':');
                    name.push_str(&self.read_ncname());
                }
                _ => {}
            }
        }
        name
    }

    fn read_number(&mut self) {
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
    }

    fn read_literal(&mut self, quote: char) -> Result<(), XPathError> {
        self.advance();
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == quote {
                return Ok(());
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn single(&mut self, tok: Tok) -> Tok {
        self.advance();
        tok
    }

    fn double(&mut self, tok: Tok) -> Tok {
        self.advance();
        self.advance();
        tok
    }

    fn tokenize(mut self) -> Result<Vec<(Tok, usize)>, XPathError> {
        let mut tokens = Vec::new();
        loop {
            while self.current_char().is_some_and(char::is_whitespace) {
                self.advance();
            }
            let start = self.position;
            let tok = match self.current_char() {
                None => {
                    tokens.push((Tok::Eof, start));
                    return Ok(tokens);
                }
                Some('/') if self.peek_char(1) == Some('/') => self.double(Tok::DoubleSlash),
                Some('/') => self.single(Tok::Slash),
                Some('[') => self.single(Tok::LBracket),
                Some(']') => self.single(Tok::RBracket),
                Some('(') => self.single(Tok::LParen),
                Some(')') => self.single(Tok::RParen),
                Some('@') => self.single(Tok::At),
                Some(',') => self.single(Tok::Comma),
                Some('|') => self.single(Tok::Pipe),
                Some('+') => self.single(Tok::Plus),
                Some('-') => self.single(Tok::Minus),
                Some('=') => self.single(Tok::Eq),
                Some('*') => self.single(Tok::Star),
                Some('$') => self.single(Tok::Dollar),
                Some(':') if self.peek_char(1) == Some(':') => self.double(Tok::ColonColon),
                Some('!') if self.peek_char(1) == Some('=') => self.double(Tok::Neq),
                Some('<') if self.peek_char(1) == Some('=') => self.double(Tok::Le),
                Some('<') => self.single(Tok::Lt),
                Some('>') if self.peek_char(1) == Some('=') => self.double(Tok::Ge),
                Some('>') => self.single(Tok::Gt),
                Some('.') if self.peek_char(1) == Some('.') => self.double(Tok::DotDot),
                Some('.') if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.read_number();
                    Tok::Number
                }
                Some('.') => self.single(Tok::Dot),
                Some(q @ ('"' | '\'')) => {
                    self.read_literal(q)?;
                    Tok::Literal
                }
                Some(c) if c.is_ascii_digit() => {
                    self.read_number();
                    Tok::Number
                }
                Some(c) if Self::is_name_start(c) => Tok::Name(self.read_name()),
                Some(c) => return Err(self.error(format!("unexpected character '{}'", c))),
            };
            tokens.push((tok, start));
        }
    }
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    index: usize,
}

impl Parser {
    fn current(&self) -> &Tok {
        self.tokens.get(self.index).map_or(&Tok::Eof, |(t, _)| t)
    }

    fn peek(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.index + offset)
            .map_or(&Tok::Eof, |(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map_or(0, |(_, o)| *o)
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() {
            self.index += 1;
        }
    }

    fn check(&self, tok: &Tok) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(tok)
    }

    fn expect(&mut self, tok: Tok) -> Result<(), XPathError> {
        if !self.check(&tok) {
            return Err(self.unexpected(&format!("expected {}", tok)));
        }
        self.advance();
        Ok(())
    }

    fn unexpected(&self, context: &str) -> XPathError {
        XPathError {
            offset: self.offset(),
            message: format!("{}, found {}", context, self.current()),
        }
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(self.current(), Tok::Name(n) if n == name)
    }

    fn parse_expr(&mut self) -> Result<(), XPathError> {
        self.parse_and()?;
        while self.is_name("or") {
            self.advance();
            self.parse_and()?;
        }
        Ok(())
    }

    fn parse_and(&mut self) -> Result<(), XPathError> {
        self.parse_equality()?;
        while self.is_name("and") {
            self.advance();
            self.parse_equality()?;
        }
        Ok(())
    }

    fn parse_equality(&mut self) -> Result<(), XPathError> {
        self.parse_relational()?;
        while matches!(self.current(), Tok::Eq | Tok::Neq) {
            self.advance();
            self.parse_relational()?;
        }
        Ok(())
    }

    fn parse_relational(&mut self) -> Result<(), XPathError> {
        self.parse_additive()?;
        while matches!(self.current(), Tok::Lt | Tok::Le | Tok::Gt | Tok::Ge) {
            self.advance();
            self.parse_additive()?;
        }
        Ok(())
    }

    fn parse_additive(&mut self) -> Result<(), XPathError> {
        self.parse_multiplicative()?;
        while matches!(self.current(), Tok::Plus | Tok::Minus) {
            self.advance();
            self.parse_multiplicative()?;
        }
        Ok(())
    }

    fn parse_multiplicative(&mut self) -> Result<(), XPathError> {
        self.parse_unary()?;
        while matches!(self.current(), Tok::Star) || self.is_name("div") || self.is_name("mod") {
            self.advance();
            self.parse_unary()?;
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<(), XPathError> {
        while self.check(&Tok::Minus) {
            self.advance();
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<(), XPathError> {
        self.parse_path()?;
        while self.check(&Tok::Pipe) {
            self.advance();
            self.parse_path()?;
        }
        Ok(())
    }

    fn starts_filter_expr(&self) -> bool {
        match self.current() {
            Tok::Literal | Tok::Number | Tok::Dollar | Tok::LParen => true,
            Tok::Name(name) => {
                matches!(self.peek(1), Tok::LParen) && !NODE_TYPES.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn parse_path(&mut self) -> Result<(), XPathError> {
        if self.starts_filter_expr() {
            self.parse_primary()?;
            while self.check(&Tok::LBracket) {
                self.parse_predicate()?;
            }
            if matches!(self.current(), Tok::Slash | Tok::DoubleSlash) {
                self.advance();
                self.parse_relative_path()?;
            }
            return Ok(());
        }
        self.parse_location_path()
    }

    fn parse_primary(&mut self) -> Result<(), XPathError> {
        match self.current().clone() {
            Tok::Literal | Tok::Number => {
                self.advance();
                Ok(())
            }
            Tok::Dollar => {
                self.advance();
                match self.current() {
                    Tok::Name(_) => {
                        self.advance();
                        Ok(())
                    }
                    _ => Err(self.unexpected("expected variable name")),
                }
            }
            Tok::LParen => {
                self.advance();
                self.parse_expr()?;
                self.expect(Tok::RParen)
            }
            Tok::Name(_) => {
                self.advance();
                self.expect(Tok::LParen)?;
                if !self.check(&Tok::RParen) {
                    self.parse_expr()?;
                    while self.check(&Tok::Comma) {
                        self.advance();
                        self.parse_expr()?;
                    }
                }
                self.expect(Tok::RParen)
            }
            _ => Err(self.unexpected("expected expression")),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current(),
            Tok::Name(_) | Tok::Star | Tok::At | Tok::Dot | Tok::DotDot
        )
    }

    fn parse_location_path(&mut self) -> Result<(), XPathError> {
        match self.current() {
            Tok::Slash => {
                self.advance();
                if self.starts_step() {
                    self.parse_relative_path()?;
                }
                Ok(())
            }
            Tok::DoubleSlash => {
                self.advance();
                self.parse_relative_path()
            }
            _ => self.parse_relative_path(),
        }
    }

    fn parse_relative_path(&mut self) -> Result<(), XPathError> {
        self.parse_step()?;
        while matches!(self.current(), Tok::Slash | Tok::DoubleSlash) {
            self.advance();
            self.parse_step()?;
        }
        Ok(())
    }

    fn parse_step(&mut self) -> Result<(), XPathError> {
        match self.current() {
            Tok::Dot | Tok::DotDot => {
                self.advance();
                return Ok(());
            }
            Tok::At => self.advance(),
            Tok::Name(name) if matches!(self.peek(1), Tok::ColonColon) => {
                if !AXES.contains(&name.as_str()) {
                    return Err(self.unexpected("unknown axis"));
                }
                self.advance();
                self.advance();
            }
            _ => {}
        }
        self.parse_node_test()?;
        while self.check(&Tok::LBracket) {
            self.parse_predicate()?;
        }
        Ok(())
    }

    fn parse_node_test(&mut self) -> Result<(), XPathError> {
        match self.current().clone() {
            Tok::Star => {
                self.advance();
                Ok(())
            }
            Tok::Name(name) => {
                self.advance();
                if NODE_TYPES.contains(&name.as_str()) && self.check(&Tok::LParen) {
                    self.advance();
                    if name == "processing-instruction" && self.check(&Tok::Literal) {
                        self.advance();
                    }
                    self.expect(Tok::RParen)?;
                }
                Ok(())
            }
            _ => Err(self.unexpected("expected node test")),
        }
    }

    fn parse_predicate(&mut self) -> Result<(), XPathError> {
        self.expect(Tok::LBracket)?;
        self.parse_expr()?;
        self.expect(Tok::RBracket)
    }
}

/// Checks that `query` is a syntactically valid XPath 1.0 expression.
pub fn parse(query: &str) -> Result<(), XPathError> {
    if query.trim().is_empty() {
        return Err(XPathError {
            offset: 0,
            message: "empty query".to_string(),
        });
    }
    let tokens = Lexer::new(query).tokenize()?;
    let mut parser = Parser { tokens, index: 0 };
    parser.parse_expr()?;
    if !parser.check(&Tok::Eof) {
        return Err(parser.unexpected("unexpected trailing input"));
    }
    Ok(())
}
