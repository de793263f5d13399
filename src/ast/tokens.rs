use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::Serialize;

/// Static type carried by every expression and tracked by the type-state cursor.
///
/// The set is closed: every builder operation maps an accepted type onto a
/// returned type from this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    /// A single DOM element or the root document
    Document,
    /// Ordered sequence of DOM elements
    ListDocument,
    String,
    ListString,
    Int,
    Float,
    Bool,
    ListInt,
    ListFloat,
    /// Absence of value (the pre-validate hook "returns" this)
    Null,
    /// Value produced by another schema
    Nested,
    /// Value produced by a JSON deserializer
    Json,
    /// Accept marker for default and return expressions, and the untyped
    /// result of `jsonify_dynamic`
    ///
    /// As a cursor it can only be returned.
    Any,
}

impl VariableType {
    pub fn name(self) -> &'static str {
        match self {
            VariableType::Document => "DOCUMENT",
            VariableType::ListDocument => "LIST_DOCUMENT",
            VariableType::String => "STRING",
            VariableType::ListString => "LIST_STRING",
            VariableType::Int => "INT",
            VariableType::Float => "FLOAT",
            VariableType::Bool => "BOOL",
            VariableType::ListInt => "LIST_INT",
            VariableType::ListFloat => "LIST_FLOAT",
            VariableType::Null => "NULL",
            VariableType::Nested => "NESTED",
            VariableType::Json => "JSON",
            VariableType::Any => "ANY",
        }
    }

    /// `true` for the sequence types
    pub fn is_list(self) -> bool {
        matches!(
            self,
            VariableType::ListDocument
                | VariableType::ListString
                | VariableType::ListInt
                | VariableType::ListFloat
        )
    }

    /// Element type of a sequence type (`LIST_STRING` → `STRING`).
    pub fn item_type(self) -> Option<VariableType> {
        match self {
            VariableType::ListDocument => Some(VariableType::Document),
            VariableType::ListString => Some(VariableType::String),
            VariableType::ListInt => Some(VariableType::Int),
            VariableType::ListFloat => Some(VariableType::Float),
            _ => None,
        }
    }

    /// Whether an expression accepting `self` may follow a cursor of `actual`.
    ///
    /// `ANY` matches in both directions.
    pub fn accepts(self, actual: VariableType) -> bool {
        self == actual || self == VariableType::Any || actual == VariableType::Any
    }

    /// Types a named field may terminate in
    pub fn is_field_terminal(self) -> bool {
        matches!(
            self,
            VariableType::String
                | VariableType::ListString
                | VariableType::Int
                | VariableType::Float
                | VariableType::Bool
                | VariableType::ListInt
                | VariableType::ListFloat
                | VariableType::Nested
                | VariableType::Json
                | VariableType::Any
        )
    }

    /// Human readable type used in generated docstring signatures
    pub fn signature_name(self) -> &'static str {
        match self {
            VariableType::String => "String",
            VariableType::ListString => "Array<String>",
            VariableType::Int => "Int",
            VariableType::ListInt => "Array<Int>",
            VariableType::Float => "Float",
            VariableType::ListFloat => "Array<Float>",
            VariableType::Bool => "Bool",
            VariableType::Null => "null",
            VariableType::Document => "Document",
            VariableType::ListDocument => "Array<Document>",
            VariableType::Nested => "Struct",
            VariableType::Json => "Json",
            VariableType::Any => "Any",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema kind: decides which reserved hooks a schema requires and how the
/// start-parse function dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructType {
    /// One record built from named fields
    Item,
    /// One record per element returned by `__SPLIT_DOC__`
    List,
    /// `__KEY__` → `__VALUE__` mapping over the split elements
    Dict,
    /// Flat sequence of `__ITEM__` values over the split elements
    FlatList,
    /// Every field returns `LIST_STRING`; each result is deduplicated
    AccUniqueList,
}

impl StructType {
    pub fn name(self) -> &'static str {
        match self {
            StructType::Item => "ITEM",
            StructType::List => "LIST",
            StructType::Dict => "DICT",
            StructType::FlatList => "FLAT_LIST",
            StructType::AccUniqueList => "ACC_UNIQUE_LIST",
        }
    }

    /// Hooks that must be present for this kind
    pub fn required_hooks(self) -> &'static [Hook] {
        match self {
            StructType::Item | StructType::AccUniqueList => &[],
            StructType::List => &[Hook::SplitDoc],
            StructType::Dict => &[Hook::SplitDoc, Hook::Key, Hook::Value],
            StructType::FlatList => &[Hook::SplitDoc, Hook::Item],
        }
    }

    /// Required hooks plus the optional ones recognised by every kind
    pub fn allows_hook(self, hook: Hook) -> bool {
        hook == Hook::PreValidate || self.required_hooks().contains(&hook)
    }

    /// Kinds whose records are built from named fields
    pub fn has_named_fields(self) -> bool {
        matches!(
            self,
            StructType::Item | StructType::List | StructType::AccUniqueList
        )
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StructType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(StructType::Item),
            "list" => Ok(StructType::List),
            "dict" => Ok(StructType::Dict),
            "flat_list" => Ok(StructType::FlatList),
            "acc_list" | "acc_unique_list" => Ok(StructType::AccUniqueList),
            other => Err(format!(
                "unknown schema kind '{}' (expected item, list, dict, flat_list or acc_list)",
                other
            )),
        }
    }
}

/// Reserved, uppercase-underscored schema members with a structural role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Hook {
    #[serde(rename = "__PRE_VALIDATE__")]
    PreValidate,
    #[serde(rename = "__SPLIT_DOC__")]
    SplitDoc,
    #[serde(rename = "__KEY__")]
    Key,
    #[serde(rename = "__VALUE__")]
    Value,
    #[serde(rename = "__ITEM__")]
    Item,
}

impl Hook {
    pub const ALL: [Hook; 5] = [
        Hook::PreValidate,
        Hook::SplitDoc,
        Hook::Key,
        Hook::Value,
        Hook::Item,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hook::PreValidate => "__PRE_VALIDATE__",
            Hook::SplitDoc => "__SPLIT_DOC__",
            Hook::Key => "__KEY__",
            Hook::Value => "__VALUE__",
            Hook::Item => "__ITEM__",
        }
    }

    pub fn from_name(name: &str) -> Option<Hook> {
        Hook::ALL.into_iter().find(|hook| hook.name() == name)
    }

    /// Hooks where a `default()` wrapper makes no sense
    pub fn forbids_default(self) -> bool {
        matches!(self, Hook::PreValidate | Hook::SplitDoc)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literal member overriding the generated docstring signature
pub const SIGNATURE_MEMBER: &str = "__SIGNATURE__";

/// Literal member listing fields left out of the generated signature
pub const EXCLUDE_SIGNATURE_MEMBER: &str = "__EXCLUDE_SIGNATURE__";

/// Lexical tokens of the schema declaration language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer literal
    ///
    /// # Examples
    /// ```text
    /// 0
    /// -1
    /// ```
    Integer(i64),

    /// Floating-point literal, kept exact
    ///
    /// # Examples
    /// ```text
    /// 0.5
    /// -12.25
    /// ```
    Float(Decimal),

    /// String literal in single or double quotes, or a raw `r"..."` string
    ///
    /// # Examples
    /// ```text
    /// ".price::text"
    /// 'h2'
    /// r"(\d+)"
    /// ```
    String(String),

    Boolean(bool),
    Null,

    /// Schema, field, method or keyword-argument name
    Identifier(String),

    // Keywords
    /// `schema Name: kind { ... }`
    Schema,
    /// `json Name { ... }`
    Json,
    /// `extends Parent, Other`
    Extends,

    // Punctuation
    Dot,
    Comma,
    Colon,
    Equals,
    Pipe,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "integer {}", n),
            Token::Float(n) => write!(f, "float {}", n),
            Token::String(s) => write!(f, "string {:?}", s),
            Token::Boolean(b) => write!(f, "{}", b),
            Token::Null => f.write_str("null"),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Schema => f.write_str("'schema'"),
            Token::Json => f.write_str("'json'"),
            Token::Extends => f.write_str("'extends'"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
            Token::Colon => f.write_str("':'"),
            Token::Equals => f.write_str("'='"),
            Token::Pipe => f.write_str("'|'"),
            Token::Minus => f.write_str("'-'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}
