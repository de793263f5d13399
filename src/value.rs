use indexmap::IndexMap;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use serde::Serialize;

use crate::ast::VariableType;

/// A literal argument carried by an expression: default values, assertion
/// operands and the `__SIGNATURE__` override.
///
/// Floats are stored as [`Decimal`] so the written form survives into the IR
/// unchanged (`0.1` stays `0.1`).
///
/// # Examples
///
/// ```
/// use ssc_gen::Literal;
/// use ssc_gen::ast::VariableType;
///
/// assert_eq!(Literal::from(0).variable_type(), Some(VariableType::Int));
/// assert_eq!(Literal::from("n/a").variable_type(), Some(VariableType::String));
/// assert_eq!(Literal::Null.variable_type(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(Decimal),
    Str(String),
    List(Vec<Literal>),
    Map(IndexMap<String, Literal>),
}

impl Literal {
    /// Scalar type of the literal; `None` for null, lists and maps.
    pub fn variable_type(&self) -> Option<VariableType> {
        match self {
            Literal::Bool(_) => Some(VariableType::Bool),
            Literal::Int(_) => Some(VariableType::Int),
            Literal::Float(_) => Some(VariableType::Float),
            Literal::Str(_) => Some(VariableType::String),
            Literal::Null | Literal::List(_) | Literal::Map(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "str",
            Literal::List(_) => "list",
            Literal::Map(_) => "map",
        }
    }

    /// Converts to a JSON value; floats that cannot be represented as `f64`
    /// become their string form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Int(n) => serde_json::Value::from(*n),
            Literal::Float(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
            Literal::Str(s) => serde_json::Value::String(s.clone()),
            Literal::List(items) => {
                serde_json::Value::Array(items.iter().map(Literal::to_json).collect())
            }
            Literal::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(d) => write!(f, "{}", d),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Literal::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Int(n.into())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<Decimal> for Literal {
    fn from(d: Decimal) -> Self {
        Literal::Float(d)
    }
}

impl From<f64> for Literal {
    /// Non-finite floats have no literal form and become `null`.
    fn from(n: f64) -> Self {
        Decimal::from_f64(n).map_or(Literal::Null, Literal::Float)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(items: Vec<T>) -> Self {
        Literal::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}
