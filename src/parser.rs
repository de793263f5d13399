//! Parser for schema declaration modules.
//!
//! ```text
//! "Books catalogue"
//!
//! json Meta { sku: str, tags: list[str] }
//!
//! schema Book: list {
//!     __SPLIT_DOC__ = D().css_all(".card")
//!     title = D().css("h2::text")
//!     price = D().default(0).css(".price::text").re(r"(\d+)").to_int()
//!     meta = D().css("script::text").jsonify(Meta)
//! }
//! ```
//!
//! Chains are replayed through the [`Document`] builder as they are read,
//! so type errors surface with the position of the offending call.

use std::{mem, str::FromStr};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::ast::{EXCLUDE_SIGNATURE_MEMBER, ExpressionChain, SIGNATURE_MEMBER, StructType, Token};
use crate::document::{Document, ElementFilter, Filter, Nested, RegexFlags};
use crate::error::{AssembleError, BuildError};
use crate::json_struct::{JsonPrimitive, JsonSchema, JsonType};
use crate::lexer::{LexError, Lexer, Position};
use crate::module::Module;
use crate::schema::Schema;
use crate::value::Literal;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("line {line}, column {column}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("line {line}, column {column}: {message}")]
    Invalid {
        message: String,
        line: usize,
        column: usize,
    },

    /// A builder call rejected its cursor or arguments
    #[error("line {line}, column {column}: {source}")]
    Build {
        line: usize,
        column: usize,
        source: BuildError,
    },

    #[error("line {line}, column {column}: {source}")]
    Module {
        line: usize,
        column: usize,
        source: AssembleError,
    },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lex(
                LexError::UnterminatedString { position }
                | LexError::InvalidEscape { position, .. }
                | LexError::InvalidNumber { position, .. }
                | LexError::UnexpectedChar { position, .. },
            ) => *position,
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::Invalid { line, column, .. }
            | ParseError::Build { line, column, .. }
            | ParseError::Module { line, column, .. } => Position {
                line: *line,
                column: *column,
            },
        }
    }

    fn invalid(position: Position, message: impl Into<String>) -> Self {
        ParseError::Invalid {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }

    fn module(position: Position, source: AssembleError) -> Self {
        ParseError::Module {
            line: position.line,
            column: position.column,
            source,
        }
    }
}

/// Failure of one method call, positioned by the caller
#[derive(Debug)]
enum CallError {
    Build(BuildError),
    Args(String),
}

impl From<BuildError> for CallError {
    fn from(e: BuildError) -> Self {
        CallError::Build(e)
    }
}

impl CallError {
    fn at(self, position: Position) -> ParseError {
        match self {
            CallError::Build(source) => ParseError::Build {
                line: position.line,
                column: position.column,
                source,
            },
            CallError::Args(message) => ParseError::invalid(position, message),
        }
    }
}

/// Parses a whole declaration module.
///
/// ```
/// use ssc_gen::parser::parse_module;
///
/// let module = parse_module(r#"
///     schema Main: item {
///         title = D().css("title::text")
///     }
/// "#).unwrap();
/// assert_eq!(module.registry().names(), ["Main"]);
/// ```
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    Parser::new(Lexer::new(source))?.parse_module()
}

// ----------------------------------------------------------------------
// Call arguments
// ----------------------------------------------------------------------

#[derive(Debug)]
enum Arg {
    Literal(Literal),
    /// Bare identifier, e.g. a schema name
    Name(String),
    Filter(Filter),
    ElementFilter(ElementFilter),
}

impl Arg {
    fn describe(&self) -> String {
        match self {
            Arg::Literal(lit) => lit.type_name().to_string(),
            Arg::Name(name) => format!("identifier '{}'", name),
            Arg::Filter(_) => "filter".to_string(),
            Arg::ElementFilter(_) => "element filter".to_string(),
        }
    }
}

struct Args {
    method: String,
    positional: Vec<Option<Arg>>,
    keywords: IndexMap<String, Arg>,
}

impl Args {
    fn new(method: &str) -> Self {
        Args {
            method: method.to_string(),
            positional: Vec::new(),
            keywords: IndexMap::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> CallError {
        CallError::Args(format!("{}(): {}", self.method, message.into()))
    }

    /// Keyword first, then the positional slot
    fn take(&mut self, index: usize, keyword: &str) -> Option<Arg> {
        self.keywords
            .shift_remove(keyword)
            .or_else(|| self.positional.get_mut(index).and_then(Option::take))
    }

    fn required(&mut self, index: usize, keyword: &str) -> Result<Arg, CallError> {
        self.take(index, keyword)
            .ok_or_else(|| self.error(format!("missing argument '{}'", keyword)))
    }

    fn as_string(&self, arg: Arg, keyword: &str) -> Result<String, CallError> {
        match arg {
            Arg::Literal(Literal::Str(s)) => Ok(s),
            other => Err(self.error(format!("'{}' expects a string, got {}", keyword, other.describe()))),
        }
    }

    fn string(&mut self, index: usize, keyword: &str) -> Result<String, CallError> {
        let arg = self.required(index, keyword)?;
        self.as_string(arg, keyword)
    }

    fn opt_string(&mut self, index: usize, keyword: &str) -> Result<Option<String>, CallError> {
        match self.take(index, keyword) {
            Some(arg) => self.as_string(arg, keyword).map(Some),
            None => Ok(None),
        }
    }

    fn msg(&mut self, index: usize) -> Result<String, CallError> {
        Ok(self.opt_string(index, "msg")?.unwrap_or_default())
    }

    fn int(&mut self, index: usize, keyword: &str) -> Result<i64, CallError> {
        match self.required(index, keyword)? {
            Arg::Literal(Literal::Int(n)) => Ok(n),
            other => Err(self.error(format!("'{}' expects an integer, got {}", keyword, other.describe()))),
        }
    }

    fn opt_usize(&mut self, index: usize, keyword: &str) -> Result<Option<usize>, CallError> {
        match self.take(index, keyword) {
            Some(Arg::Literal(Literal::Int(n))) => usize::try_from(n)
                .map(Some)
                .map_err(|_| self.error(format!("'{}' must not be negative", keyword))),
            Some(other) => Err(self.error(format!(
                "'{}' expects an integer, got {}",
                keyword,
                other.describe()
            ))),
            None => Ok(None),
        }
    }

    fn usize(&mut self, index: usize, keyword: &str) -> Result<usize, CallError> {
        self.opt_usize(index, keyword)?
            .ok_or_else(|| self.error(format!("missing argument '{}'", keyword)))
    }

    fn flag(&mut self, index: usize, keyword: &str) -> Result<bool, CallError> {
        match self.take(index, keyword) {
            Some(Arg::Literal(Literal::Bool(b))) => Ok(b),
            Some(other) => Err(self.error(format!("'{}' expects a boolean, got {}", keyword, other.describe()))),
            None => Ok(false),
        }
    }

    fn regex_flags(&mut self, index: usize) -> Result<RegexFlags, CallError> {
        Ok(RegexFlags {
            ignore_case: self.flag(index, "ignore_case")?,
            dotall: self.flag(index + 1, "dotall")?,
        })
    }

    fn literal(&mut self, index: usize, keyword: &str) -> Result<Literal, CallError> {
        match self.required(index, keyword)? {
            Arg::Literal(lit) => Ok(lit),
            other => Err(self.error(format!("'{}' expects a literal, got {}", keyword, other.describe()))),
        }
    }

    /// Schema reference: bare identifier or string
    fn name(&mut self, index: usize, keyword: &str) -> Result<String, CallError> {
        match self.required(index, keyword)? {
            Arg::Name(name) | Arg::Literal(Literal::Str(name)) => Ok(name),
            other => Err(self.error(format!("'{}' expects a schema name, got {}", keyword, other.describe()))),
        }
    }

    fn filter(&mut self, index: usize, keyword: &str) -> Result<Filter, CallError> {
        match self.required(index, keyword)? {
            Arg::Filter(filter) => Ok(filter),
            other => Err(self.error(format!("'{}' expects F(), got {}", keyword, other.describe()))),
        }
    }

    fn element_filter(&mut self, index: usize, keyword: &str) -> Result<ElementFilter, CallError> {
        match self.required(index, keyword)? {
            Arg::ElementFilter(filter) => Ok(filter),
            other => Err(self.error(format!("'{}' expects FE(), got {}", keyword, other.describe()))),
        }
    }

    fn string_map(&mut self, index: usize, keyword: &str) -> Result<IndexMap<String, String>, CallError> {
        match self.required(index, keyword)? {
            Arg::Literal(Literal::Map(entries)) => entries
                .into_iter()
                .map(|(key, value)| match value {
                    Literal::Str(s) => Ok((key, s)),
                    other => Err(self.error(format!(
                        "'{}' values must be strings, got {} for {:?}",
                        keyword,
                        other.type_name(),
                        key
                    ))),
                })
                .collect(),
            other => Err(self.error(format!("'{}' expects a {{...}} map, got {}", keyword, other.describe()))),
        }
    }

    /// Every remaining positional argument as a string
    fn strings(&mut self) -> Result<Vec<String>, CallError> {
        let rest: Vec<Arg> = self.positional.iter_mut().filter_map(Option::take).collect();
        let values = rest
            .into_iter()
            .map(|arg| self.as_string(arg, "values"))
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(self.error("expects at least one string"));
        }
        Ok(values)
    }

    /// Rejects arguments nothing consumed
    fn finish(mut self) -> Result<(), CallError> {
        if let Some((keyword, _)) = self.keywords.shift_remove_index(0) {
            return Err(self.error(format!("unexpected argument '{}'", keyword)));
        }
        if let Some(position) = self.positional.iter().position(Option::is_some) {
            return Err(self.error(format!("unexpected argument #{}", position + 1)));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Method dispatch
// ----------------------------------------------------------------------

enum ChainBuilder {
    Document(Document),
    Nested(Nested),
    /// Closed by `sub_parser()`
    Done(ExpressionChain),
}

impl ChainBuilder {
    fn call(self, method: &str, args: Args) -> Result<Self, CallError> {
        match self {
            ChainBuilder::Document(doc) => apply_document(doc, method, args),
            ChainBuilder::Nested(nested) => apply_nested(nested, method, args),
            ChainBuilder::Done(_) => Err(CallError::Args(format!(
                "{}() cannot follow sub_parser(); sub_parser() must be the last call",
                method
            ))),
        }
    }
}

fn refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn apply_document(doc: Document, method: &str, mut args: Args) -> Result<ChainBuilder, CallError> {
    let doc = match method {
        "default" => doc.default(args.literal(0, "value")?)?,

        "css" => doc.css(&args.string(0, "query")?)?,
        "css_all" => doc.css_all(&args.string(0, "query")?)?,
        "xpath" => doc.xpath(&args.string(0, "query")?)?,
        "xpath_all" => doc.xpath_all(&args.string(0, "query")?)?,
        "css_remove" => doc.css_remove(&args.string(0, "query")?)?,
        "xpath_remove" => doc.xpath_remove(&args.string(0, "query")?)?,

        "attr" => {
            let keys = args.strings()?;
            match keys.as_slice() {
                [key] => doc.attr(key)?,
                _ => doc.attrs(&refs(&keys))?,
            }
        }
        "text" => doc.text()?,
        "raw" => doc.raw()?,
        "attrs_map" => doc.attrs_map()?,

        "index" => doc.index(args.int(0, "i")?)?,
        "first" => doc.first()?,
        "last" => doc.last()?,
        "join" => doc.join(&args.string(0, "sep")?)?,
        "to_len" => doc.to_len()?,
        "unique" => doc.unique(args.flag(0, "keep_order")?)?,
        "filter" => match args.required(0, "f")? {
            Arg::Filter(filter) => doc.filter(filter)?,
            Arg::ElementFilter(filter) => doc.filter(filter)?,
            other => return Err(args.error(format!("'f' expects F() or FE(), got {}", other.describe()))),
        },

        "trim" | "ltrim" | "rtrim" => {
            let substr = args.opt_string(0, "substr")?.unwrap_or_else(|| " ".to_string());
            match method {
                "trim" => doc.trim(&substr)?,
                "ltrim" => doc.ltrim(&substr)?,
                _ => doc.rtrim(&substr)?,
            }
        }
        "rm_prefix" => doc.rm_prefix(&args.string(0, "substr")?)?,
        "rm_suffix" => doc.rm_suffix(&args.string(0, "substr")?)?,
        "rm_prefix_suffix" => doc.rm_prefix_suffix(&args.string(0, "substr")?)?,
        "repl" => {
            let old = args.string(0, "old")?;
            doc.repl(&old, &args.string(1, "new")?)?
        }
        "repl_map" => doc.repl_map(args.string_map(0, "replacements")?)?,
        "fmt" => doc.fmt(&args.string(0, "template")?)?,
        "split" => doc.split(&args.string(0, "sep")?)?,
        "unescape" => doc.unescape()?,

        "re" => {
            let pattern = args.string(0, "pattern")?;
            let group = args.opt_usize(1, "group")?.unwrap_or(1);
            let flags = args.regex_flags(2)?;
            doc.re_with(&pattern, group, flags)?
        }
        "re_all" => {
            let pattern = args.string(0, "pattern")?;
            let flags = args.regex_flags(1)?;
            doc.re_all_with(&pattern, flags)?
        }
        "re_sub" => {
            let pattern = args.string(0, "pattern")?;
            let repl = args.opt_string(1, "repl")?.unwrap_or_default();
            let flags = args.regex_flags(2)?;
            doc.re_sub_with(&pattern, &repl, flags)?
        }
        "re_trim" => doc.re_trim(args.opt_string(0, "pattern")?.as_deref())?,

        "to_int" => doc.to_int()?,
        "to_float" => doc.to_float()?,
        "to_bool" => doc.to_bool()?,

        "is_equal" | "is_not_equal" | "is_contains" => {
            let value = args.literal(0, "value")?;
            let msg = args.msg(1)?;
            match method {
                "is_equal" => doc.is_equal(value, &msg)?,
                "is_not_equal" => doc.is_not_equal(value, &msg)?,
                _ => doc.is_contains(value, &msg)?,
            }
        }
        "is_css" => {
            let query = args.string(0, "query")?;
            doc.is_css(&query, &args.msg(1)?)?
        }
        "is_xpath" => {
            let query = args.string(0, "query")?;
            doc.is_xpath(&query, &args.msg(1)?)?
        }
        "is_regex" | "is_re" | "any_is_re" | "all_is_re" => {
            let pattern = args.string(0, "pattern")?;
            let ignore_case = args.flag(1, "ignore_case")?;
            let msg = args.msg(2)?;
            match method {
                "any_is_re" => doc.any_is_re(&pattern, ignore_case, &msg)?,
                "all_is_re" => doc.all_is_re(&pattern, ignore_case, &msg)?,
                _ => doc.is_regex(&pattern, ignore_case, &msg)?,
            }
        }
        "has_attr" => {
            let key = args.string(0, "key")?;
            doc.has_attr(&key, &args.msg(1)?)?
        }

        "sub_parser" => {
            let chain = doc.sub_parser(&args.name(0, "schema")?)?;
            args.finish()?;
            return Ok(ChainBuilder::Done(chain));
        }
        "jsonify" => {
            let schema = args.name(0, "schema")?;
            doc.jsonify(&schema, args.opt_string(1, "start")?.as_deref())?
        }
        "jsonify_dynamic" => doc.jsonify_dynamic(args.opt_string(0, "start")?.as_deref())?,

        _ => return Err(CallError::Args(format!("unknown method '{}'", method))),
    };
    args.finish()?;
    Ok(ChainBuilder::Document(doc))
}

fn apply_nested(nested: Nested, method: &str, mut args: Args) -> Result<ChainBuilder, CallError> {
    let next = match method {
        "css" => ChainBuilder::Nested(nested.css(&args.string(0, "query")?)?),
        "xpath" => ChainBuilder::Nested(nested.xpath(&args.string(0, "query")?)?),
        "is_css" => {
            let query = args.string(0, "query")?;
            ChainBuilder::Nested(nested.is_css(&query, &args.msg(1)?)?)
        }
        "is_xpath" => {
            let query = args.string(0, "query")?;
            ChainBuilder::Nested(nested.is_xpath(&query, &args.msg(1)?)?)
        }
        "has_attr" => {
            let key = args.string(0, "key")?;
            ChainBuilder::Nested(nested.has_attr(&key, &args.msg(1)?)?)
        }
        "sub_parser" => ChainBuilder::Done(nested.sub_parser(&args.name(0, "schema")?)?),
        _ => {
            return Err(CallError::Args(format!(
                "{}() is not available on N(); use css, xpath, is_css, is_xpath, has_attr or sub_parser",
                method
            )));
        }
    };
    args.finish()?;
    Ok(next)
}

fn apply_filter(filter: Filter, method: &str, mut args: Args) -> Result<Filter, CallError> {
    let filter = match method {
        "eq" | "ne" | "contains" | "starts" | "ends" => {
            let values = args.strings()?;
            let values = refs(&values);
            match method {
                "eq" => filter.eq(&values),
                "ne" => filter.ne(&values),
                "contains" => filter.contains(&values),
                "starts" => filter.starts(&values),
                _ => filter.ends(&values),
            }
        }
        "re" => {
            let pattern = args.string(0, "pattern")?;
            filter.re(&pattern, args.flag(1, "ignore_case")?)?
        }
        "len_eq" => filter.len_eq(args.usize(0, "len")?),
        "len_ne" => filter.len_ne(args.usize(0, "len")?),
        "len_lt" => filter.len_lt(args.usize(0, "len")?),
        "len_le" => filter.len_le(args.usize(0, "len")?),
        "len_gt" => filter.len_gt(args.usize(0, "len")?),
        "len_ge" => filter.len_ge(args.usize(0, "len")?),
        "and" => filter.and(args.filter(0, "other")?),
        "or" => filter.or(args.filter(0, "other")?),
        "not" => filter.not(args.filter(0, "other")?),
        _ => return Err(CallError::Args(format!("unknown filter method '{}'", method))),
    };
    args.finish()?;
    Ok(filter)
}

fn apply_element_filter(filter: ElementFilter, method: &str, mut args: Args) -> Result<ElementFilter, CallError> {
    let filter = match method {
        "css" => filter.css(&args.string(0, "query")?)?,
        "xpath" => filter.xpath(&args.string(0, "query")?)?,
        "has_text" | "has_raw" | "has_attr" => {
            let values = args.strings()?;
            let values = refs(&values);
            match method {
                "has_text" => filter.has_text(&values),
                "has_raw" => filter.has_raw(&values),
                _ => filter.has_attr(&values),
            }
        }
        "re_text" | "re_raw" => {
            let pattern = args.string(0, "pattern")?;
            let ignore_case = args.flag(1, "ignore_case")?;
            match method {
                "re_text" => filter.re_text(&pattern, ignore_case)?,
                _ => filter.re_raw(&pattern, ignore_case)?,
            }
        }
        "attr_eq" | "attr_contains" | "attr_starts" | "attr_ends" => {
            let key = args.string(0, "key")?;
            let values = args.strings()?;
            let values = refs(&values);
            match method {
                "attr_eq" => filter.attr_eq(&key, &values),
                "attr_contains" => filter.attr_contains(&key, &values),
                "attr_starts" => filter.attr_starts(&key, &values),
                _ => filter.attr_ends(&key, &values),
            }
        }
        "attr_re" => {
            let key = args.string(0, "key")?;
            let pattern = args.string(1, "pattern")?;
            filter.attr_re(&key, &pattern, args.flag(2, "ignore_case")?)?
        }
        "and" => filter.and(args.element_filter(0, "other")?),
        "or" => filter.or(args.element_filter(0, "other")?),
        "not" => filter.not(args.element_filter(0, "other")?),
        _ => return Err(CallError::Args(format!("unknown element filter method '{}'", method))),
    };
    args.finish()?;
    Ok(filter)
}

// ----------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    position: Position,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        let position = lexer.token_position();
        Ok(Parser {
            lexer,
            current_token,
            position,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        self.position = self.lexer.token_position();
        Ok(())
    }

    /// Moves past the current token and hands it back
    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        self.position = self.lexer.token_position();
        Ok(mem::replace(&mut self.current_token, next))
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_token.to_string(),
            line: self.position.line,
            column: self.position.column,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.check(&expected) {
            self.advance()
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current_token {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(&self.current_token, Token::Identifier(w) if w == word)
    }

    fn take_docstring(&mut self) -> Result<Option<String>, ParseError> {
        if let Token::String(doc) = &self.current_token {
            let doc = doc.clone();
            self.advance()?;
            return Ok(Some(doc));
        }
        Ok(None)
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut module = Module::new();
        module.docstring = self.take_docstring()?;

        loop {
            let start = self.position;
            match self.current_token {
                Token::Eof => break,
                Token::Json => {
                    let schema = self.parse_json_decl()?;
                    module
                        .add_json(schema)
                        .map_err(|e| ParseError::module(start, e))?;
                }
                Token::Schema => {
                    let schema = self.parse_schema_decl()?;
                    module
                        .add_schema(schema)
                        .map_err(|e| ParseError::module(start, e))?;
                }
                _ => return Err(self.unexpected("'schema' or 'json' declaration")),
            }
        }

        debug!(
            schemas = module.registry().len(),
            json = module.json_schemas().len(),
            "module parsed"
        );
        Ok(module)
    }

    // ------------------------------------------------------------------
    // json declarations
    // ------------------------------------------------------------------

    fn parse_json_decl(&mut self) -> Result<JsonSchema, ParseError> {
        self.expect(Token::Json)?;
        let name = self.expect_identifier()?;
        let is_array = self.is_word("array");
        if is_array {
            self.advance()?;
        }
        self.expect(Token::LBrace)?;

        let mut schema = JsonSchema::new(&name).array(is_array);
        while !self.check(&Token::RBrace) {
            let at = self.position;
            let key = self.parse_json_key()?;
            if schema.fields.contains_key(&key) {
                return Err(ParseError::invalid(
                    at,
                    format!("field '{}' declared twice in json '{}'", key, name),
                ));
            }
            self.expect(Token::Colon)?;
            let ty = self.parse_json_type()?;
            schema = schema.field(&key, ty);

            if self.check(&Token::Comma) {
                self.advance()?;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(schema)
    }

    /// Keys are identifiers, keywords or quoted strings
    fn parse_json_key(&mut self) -> Result<String, ParseError> {
        let key = match &self.current_token {
            Token::Identifier(key) | Token::String(key) => key.clone(),
            Token::Schema => "schema".to_string(),
            Token::Json => "json".to_string(),
            Token::Extends => "extends".to_string(),
            Token::Boolean(b) => b.to_string(),
            Token::Null => "null".to_string(),
            _ => return Err(self.unexpected("field name")),
        };
        self.advance()?;
        Ok(key)
    }

    fn parse_json_type(&mut self) -> Result<JsonType, ParseError> {
        let start = self.position;
        let base = match &self.current_token {
            Token::Null => {
                self.advance()?;
                JsonType::Null
            }
            Token::Identifier(word) if word == "list" => {
                self.advance()?;
                self.expect(Token::LBracket)?;
                let item = match self.parse_json_type()? {
                    JsonType::Primitive { item } => JsonType::Array { item },
                    JsonType::Object { name } => JsonType::ArrayObjects { name },
                    other => {
                        return Err(ParseError::invalid(
                            start,
                            format!("list items must be a primitive or a json name, got '{}'", other.declaration()),
                        ));
                    }
                };
                self.expect(Token::RBracket)?;
                item
            }
            Token::Identifier(word) => {
                let word = word.clone();
                self.advance()?;
                match JsonPrimitive::from_keyword(&word) {
                    Some(item) => JsonType::Primitive { item },
                    None => JsonType::Object { name: word },
                }
            }
            _ => return Err(self.unexpected("json type")),
        };

        if !self.check(&Token::Pipe) {
            return Ok(base);
        }
        self.advance()?;
        self.expect(Token::Null)?;
        match base {
            JsonType::Primitive { item } => Ok(JsonType::Optional { item }),
            other => Err(ParseError::invalid(
                start,
                format!("'{} | null' is not supported; only primitives are nullable", other.declaration()),
            )),
        }
    }

    // ------------------------------------------------------------------
    // schema declarations
    // ------------------------------------------------------------------

    fn parse_schema_decl(&mut self) -> Result<Schema, ParseError> {
        self.expect(Token::Schema)?;
        let name = self.expect_identifier()?;
        self.expect(Token::Colon)?;

        let kind_at = self.position;
        let kind_name = self.expect_identifier()?;
        let kind = StructType::from_str(&kind_name).map_err(|message| ParseError::invalid(kind_at, message))?;

        let mut schema = Schema::new(&name, kind);
        if self.check(&Token::Extends) {
            self.advance()?;
            schema = schema.extends(&self.expect_identifier()?);
            while self.check(&Token::Comma) {
                self.advance()?;
                schema = schema.extends(&self.expect_identifier()?);
            }
        }

        self.expect(Token::LBrace)?;
        if let Some(doc) = self.take_docstring()? {
            schema = schema.doc(&doc);
        }
        while !self.check(&Token::RBrace) {
            schema = self.parse_member(schema)?;
        }
        self.expect(Token::RBrace)?;

        debug!(schema = %name, %kind, members = schema.members().len(), "schema parsed");
        Ok(schema)
    }

    fn parse_member(&mut self, schema: Schema) -> Result<Schema, ParseError> {
        let at = self.position;
        let name = self.expect_identifier()?;
        let declared = schema.members().contains_key(&name)
            || (name == SIGNATURE_MEMBER && schema.signature.is_some())
            || (name == EXCLUDE_SIGNATURE_MEMBER && schema.exclude_signature.is_some());
        if declared {
            return Err(ParseError::invalid(
                at,
                format!("member '{}' declared twice in schema '{}'", name, schema.name),
            ));
        }
        self.expect(Token::Equals)?;

        match name.as_str() {
            SIGNATURE_MEMBER => Ok(schema.signature(self.parse_literal()?)),
            EXCLUDE_SIGNATURE_MEMBER => {
                let value_at = self.position;
                let Literal::List(items) = self.parse_literal()? else {
                    return Err(ParseError::invalid(
                        value_at,
                        format!("{} expects a list of field names", EXCLUDE_SIGNATURE_MEMBER),
                    ));
                };
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| {
                            ParseError::invalid(
                                value_at,
                                format!("{} entries must be strings", EXCLUDE_SIGNATURE_MEMBER),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(schema.exclude_signature(&names))
            }
            _ if self.check(&Token::Null) => {
                self.advance()?;
                Ok(schema.missing(&name))
            }
            _ => {
                let chain = self.parse_chain()?;
                Ok(schema.field(&name, chain))
            }
        }
    }

    fn parse_chain(&mut self) -> Result<ExpressionChain, ParseError> {
        let start = self.position;
        let head = self.expect_identifier()?;
        let mut builder = match head.as_str() {
            "D" => ChainBuilder::Document(Document::new()),
            "R" => ChainBuilder::Document(Document::raw_source()),
            "N" => ChainBuilder::Nested(Nested::new()),
            _ => {
                return Err(ParseError::invalid(
                    start,
                    format!("a chain starts with D(), N() or R(), found '{}'", head),
                ));
            }
        };
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;

        while self.check(&Token::Dot) {
            self.advance()?;
            let at = self.position;
            let method = self.expect_identifier()?;
            let args = self.parse_args(&method)?;
            builder = builder.call(&method, args).map_err(|e| e.at(at))?;
        }

        match builder {
            ChainBuilder::Document(doc) => Ok(doc.into_chain()),
            ChainBuilder::Done(chain) => Ok(chain),
            ChainBuilder::Nested(_) => Err(ParseError::invalid(start, "N() chain must end with sub_parser(Name)")),
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, ParseError> {
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;

        let mut filter = Filter::new();
        while self.check(&Token::Dot) {
            self.advance()?;
            let at = self.position;
            let method = self.expect_identifier()?;
            let args = self.parse_args(&method)?;
            filter = apply_filter(filter, &method, args).map_err(|e| e.at(at))?;
        }
        Ok(filter)
    }

    fn parse_element_filter(&mut self) -> Result<ElementFilter, ParseError> {
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;

        let mut filter = ElementFilter::new();
        while self.check(&Token::Dot) {
            self.advance()?;
            let at = self.position;
            let method = self.expect_identifier()?;
            let args = self.parse_args(&method)?;
            filter = apply_element_filter(filter, &method, args).map_err(|e| e.at(at))?;
        }
        Ok(filter)
    }

    fn parse_args(&mut self, method: &str) -> Result<Args, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Args::new(method);

        while !self.check(&Token::RParen) {
            let at = self.position;
            if let Token::Identifier(name) = &self.current_token {
                let name = name.clone();
                self.advance()?;
                if self.check(&Token::Equals) {
                    self.advance()?;
                    let value = self.parse_arg_value()?;
                    if args.keywords.insert(name.clone(), value).is_some() {
                        return Err(ParseError::invalid(at, format!("argument '{}' given twice", name)));
                    }
                } else {
                    let value = self.finish_name(name)?;
                    self.push_positional(&mut args, value, at)?;
                }
            } else {
                let value = Arg::Literal(self.parse_literal()?);
                self.push_positional(&mut args, value, at)?;
            }

            if self.check(&Token::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn push_positional(&self, args: &mut Args, value: Arg, at: Position) -> Result<(), ParseError> {
        if !args.keywords.is_empty() {
            return Err(ParseError::invalid(at, "positional argument after keyword argument"));
        }
        args.positional.push(Some(value));
        Ok(())
    }

    fn parse_arg_value(&mut self) -> Result<Arg, ParseError> {
        if let Token::Identifier(name) = &self.current_token {
            let name = name.clone();
            self.advance()?;
            return self.finish_name(name);
        }
        Ok(Arg::Literal(self.parse_literal()?))
    }

    /// `F(...)` and `FE(...)` start filters; any other identifier is a bare name
    fn finish_name(&mut self, name: String) -> Result<Arg, ParseError> {
        if name == "F" && self.check(&Token::LParen) {
            return self.parse_filter().map(Arg::Filter);
        }
        if name == "FE" && self.check(&Token::LParen) {
            return self.parse_element_filter().map(Arg::ElementFilter);
        }
        Ok(Arg::Name(name))
    }

    // ------------------------------------------------------------------
    // literals
    // ------------------------------------------------------------------

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.current_token {
            Token::LBracket => self.parse_list_literal(),
            Token::LBrace => self.parse_map_literal(),
            Token::Minus => {
                self.advance()?;
                match self.current_token {
                    Token::Integer(n) => {
                        self.advance()?;
                        Ok(Literal::Int(-n))
                    }
                    Token::Float(f) => {
                        self.advance()?;
                        Ok(Literal::Float(-f))
                    }
                    _ => Err(self.unexpected("number after '-'")),
                }
            }
            Token::Integer(_) | Token::Float(_) | Token::String(_) | Token::Boolean(_) | Token::Null => {
                Ok(match self.bump()? {
                    Token::Integer(n) => Literal::Int(n),
                    Token::Float(f) => Literal::Float(f),
                    Token::String(s) => Literal::Str(s),
                    Token::Boolean(b) => Literal::Bool(b),
                    _ => Literal::Null,
                })
            }
            _ => Err(self.unexpected("literal")),
        }
    }

    fn parse_list_literal(&mut self) -> Result<Literal, ParseError> {
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();

        while !self.check(&Token::RBracket) {
            items.push(self.parse_literal()?);

            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Literal::List(items))
    }

    fn parse_map_literal(&mut self) -> Result<Literal, ParseError> {
        self.expect(Token::LBrace)?;
        let mut entries = IndexMap::new();

        while !self.check(&Token::RBrace) {
            let key = match &self.current_token {
                Token::String(key) => key.clone(),
                _ => return Err(self.unexpected("string key")),
            };
            self.advance()?;
            self.expect(Token::Colon)?;
            let value = self.parse_literal()?;
            entries.insert(key, value);

            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Literal::Map(entries))
    }
}
