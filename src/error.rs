//! Error and warning types shared by the pipeline stages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::ast::VariableType;

fn join_types(types: &[VariableType]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" (hint: {})", h))
        .unwrap_or_default()
}

/// Errors raised synchronously while a chain is being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// CSS/XPath query did not validate
    #[error("invalid {dialect} query {query:?}: {message}{}", hint_suffix(.hint))]
    SelectorSyntax {
        dialect: &'static str,
        query: String,
        message: String,
        hint: Option<String>,
    },

    /// Pattern did not compile, or the capture group is out of range
    #[error("invalid regex {pattern:?}: {message}")]
    RegexSyntax { pattern: String, message: String },

    #[error("format template {template:?} has no '{{{{}}}}' slot")]
    FormatTemplateMissingSlot { template: String },

    /// Cursor type is not accepted by the operation
    #[error("{method}(): expected {}, got {actual}{}", join_types(.expected), hint_suffix(.hint))]
    TypeMismatch {
        method: &'static str,
        expected: Vec<VariableType>,
        actual: VariableType,
        hint: Option<String>,
    },

    #[error("misplaced default: {message}")]
    DefaultMisplaced { message: String },

    #[error("{method}(): {message}")]
    InvalidArgument {
        method: &'static str,
        message: String,
    },
}

/// Failure category reported by the static checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckErrorKind {
    TypeMismatch,
    DefaultMisplaced,
    DefaultTypeMismatch,
    HookMissing,
    HookReturnType,
    SelectorSyntax,
    RegexSyntax,
    FormatTemplateMissingSlot,
    EmptyChain,
    UnexpectedField,
    InvalidFieldType,
    JsonifyWithDefault,
    NestedNotLast,
}

impl CheckErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            CheckErrorKind::TypeMismatch => "TypeMismatch",
            CheckErrorKind::DefaultMisplaced => "DefaultMisplaced",
            CheckErrorKind::DefaultTypeMismatch => "DefaultTypeMismatch",
            CheckErrorKind::HookMissing => "HookMissing",
            CheckErrorKind::HookReturnType => "HookReturnType",
            CheckErrorKind::SelectorSyntax => "SelectorSyntax",
            CheckErrorKind::RegexSyntax => "RegexSyntax",
            CheckErrorKind::FormatTemplateMissingSlot => "FormatTemplateMissingSlot",
            CheckErrorKind::EmptyChain => "EmptyChain",
            CheckErrorKind::UnexpectedField => "UnexpectedField",
            CheckErrorKind::InvalidFieldType => "InvalidFieldType",
            CheckErrorKind::JsonifyWithDefault => "JsonifyWithDefault",
            CheckErrorKind::NestedNotLast => "NestedNotLast",
        }
    }
}

impl fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One static-check diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    pub schema: String,
    /// Field or hook name; `None` for schema-level failures
    pub field: Option<String>,
    /// Position of the offending expression in the chain
    pub position: Option<usize>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub message: String,
    pub tip: Option<String>,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, schema: &str, message: impl Into<String>) -> Self {
        CheckError {
            kind,
            schema: schema.to_string(),
            field: None,
            position: None,
            expected: None,
            actual: None,
            message: message.into(),
            tip: None,
        }
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn types(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = Some(tip.into());
        self
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.schema)?;
        if let Some(field) = &self.field {
            write!(f, ".{}", field)?;
        }
        if let Some(pos) = self.position {
            write!(f, "[{}]", pos)?;
        }
        write!(f, ": {}: {}", self.kind, self.message)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {}, got {})", expected, actual)?;
        }
        if let Some(tip) = &self.tip {
            write!(f, "\n  tip: {}", tip)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckError {}

/// Every diagnostic collected for a module.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    pub errors: Vec<CheckError>,
}

impl CheckFailure {
    pub fn kinds(&self) -> Vec<CheckErrorKind> {
        self.errors.iter().map(|e| e.kind).collect()
    }

    pub fn has(&self, kind: CheckErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckFailure {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("css_to_xpath and xpath_to_css cannot both be enabled")]
    ConflictingConversions,
    #[error("xpath prefix must not be empty")]
    EmptyXpathPrefix,
}

/// Module assembly failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssembleError {
    #[error("unknown schema '{name}' referenced by '{referenced_by}'")]
    UnknownSchema { name: String, referenced_by: String },

    #[error("unknown json schema '{name}' referenced by '{referenced_by}'")]
    UnknownJsonSchema { name: String, referenced_by: String },

    #[error("cyclic nested reference: {}", .0.join(" -> "))]
    CyclicNestedReference(Vec<String>),

    #[error("schema '{0}' is declared twice")]
    DuplicateSchema(String),

    #[error("{0}")]
    Check(#[from] CheckFailure),

    #[error("invalid options: {0}")]
    Options(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum JsonInferError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("start path '{path}' not found at segment '{segment}'")]
    PathNotFound { path: String, segment: String },

    #[error("array '{key}' mixes item types")]
    MixedArray { key: String },

    #[error("array '{key}' contains arrays, which have no json schema form")]
    NestedArray { key: String },

    #[error("'{name}' is not a valid schema or field name")]
    BadName { name: String },

    #[error("expected a json object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Non-fatal finding returned next to a successful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    UnusedHook,
    DefaultWithAssertion,
    UnmatchedExcludeSignature,
    UnreachableNested,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub schema: String,
    pub field: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, schema: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        Warning {
            kind,
            schema: schema.to_string(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "warning: {}.{}: {}", self.schema, field, self.message),
            None => write!(f, "warning: {}: {}", self.schema, self.message),
        }
    }
}
