//! JSON shape schemas: targets of `JSONIFY` and their inference from
//! sample documents.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::JsonInferError;

/// Leaf types usable inside arrays and optionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonPrimitive {
    String,
    Number,
    Float,
    Boolean,
}

impl JsonPrimitive {
    pub fn keyword(self) -> &'static str {
        match self {
            JsonPrimitive::String => "str",
            JsonPrimitive::Number => "int",
            JsonPrimitive::Float => "float",
            JsonPrimitive::Boolean => "bool",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "str" => Some(JsonPrimitive::String),
            "int" => Some(JsonPrimitive::Number),
            "float" => Some(JsonPrimitive::Float),
            "bool" => Some(JsonPrimitive::Boolean),
            _ => None,
        }
    }

    pub fn signature_name(self) -> &'static str {
        match self {
            JsonPrimitive::String => "String",
            JsonPrimitive::Number => "Int",
            JsonPrimitive::Float => "Float",
            JsonPrimitive::Boolean => "Bool",
        }
    }
}

/// Type of one JSON field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonType {
    Primitive { item: JsonPrimitive },
    Null,
    /// `T | null`
    Optional { item: JsonPrimitive },
    Array { item: JsonPrimitive },
    /// Array of another JSON schema's objects
    ArrayObjects { name: String },
    /// Object shaped by another JSON schema
    Object { name: String },
}

impl JsonType {
    pub fn primitive(item: JsonPrimitive) -> Self {
        JsonType::Primitive { item }
    }

    /// Schema this type refers to, if any
    pub fn reference(&self) -> Option<&str> {
        match self {
            JsonType::ArrayObjects { name } | JsonType::Object { name } => Some(name),
            _ => None,
        }
    }

    /// Declaration-language spelling (`str`, `list[int]`, `Item`, ...)
    pub fn declaration(&self) -> String {
        match self {
            JsonType::Primitive { item } => item.keyword().to_string(),
            JsonType::Null => "null".to_string(),
            JsonType::Optional { item } => format!("{} | null", item.keyword()),
            JsonType::Array { item } => format!("list[{}]", item.keyword()),
            JsonType::ArrayObjects { name } => format!("list[{}]", name),
            JsonType::Object { name } => name.clone(),
        }
    }
}

/// Named JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonSchema {
    pub name: String,
    /// The document is an array of this object
    pub is_array: bool,
    pub fields: IndexMap<String, JsonType>,
}

impl JsonSchema {
    pub fn new(name: &str) -> Self {
        JsonSchema {
            name: name.to_string(),
            is_array: false,
            fields: IndexMap::new(),
        }
    }

    pub fn array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    pub fn field(mut self, name: &str, ty: JsonType) -> Self {
        self.fields.insert(name.to_string(), ty);
        self
    }

    pub fn references(&self) -> Vec<&str> {
        self.fields.values().filter_map(JsonType::reference).collect()
    }
}

pub fn to_upper_camel_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn starts_badly(name: &str) -> bool {
    name.chars()
        .next()
        .is_none_or(|c| c.is_ascii_digit() || !(c.is_alphanumeric() || c == '_'))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Inference {
    schemas: Vec<JsonSchema>,
}

impl Inference {
    fn sub_schema_name(&self, parent: &str, key: &str) -> Result<String, JsonInferError> {
        let cleaned: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let name = to_upper_camel_case(&cleaned);
        if starts_badly(&name) {
            return Err(JsonInferError::BadName {
                name: key.to_string(),
            });
        }
        if self.schemas.iter().any(|s| s.name == name) {
            return Ok(format!("{}{}", parent, name));
        }
        Ok(name)
    }

    fn object(
        &mut self,
        name: &str,
        is_array: bool,
        object: &serde_json::Map<String, Value>,
    ) -> Result<(), JsonInferError> {
        let mut schema = JsonSchema::new(name).array(is_array);
        for (key, value) in object {
            let ty = self.field(name, key, value)?;
            debug!(schema = name, key = %key, ty = %ty.declaration(), "json field");
            schema.fields.insert(key.clone(), ty);
        }
        self.schemas.push(schema);
        Ok(())
    }

    fn field(&mut self, parent: &str, key: &str, value: &Value) -> Result<JsonType, JsonInferError> {
        let ty = match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::primitive(JsonPrimitive::Boolean),
            Value::Number(n) if n.is_f64() => JsonType::primitive(JsonPrimitive::Float),
            Value::Number(_) => JsonType::primitive(JsonPrimitive::Number),
            Value::String(_) => JsonType::primitive(JsonPrimitive::String),
            Value::Object(object) => {
                let name = self.sub_schema_name(parent, key)?;
                self.object(&name, false, object)?;
                JsonType::Object { name }
            }
            Value::Array(items) => self.array(parent, key, items)?,
        };
        Ok(ty)
    }

    fn array(&mut self, parent: &str, key: &str, items: &[Value]) -> Result<JsonType, JsonInferError> {
        let Some(first) = items.first() else {
            warn!(
                "'{}.{}' is an empty array, assuming list[str]; fix the type by hand or use a richer sample",
                parent, key
            );
            return Ok(JsonType::Array {
                item: JsonPrimitive::String,
            });
        };

        let kind = json_kind(first);
        if items.iter().any(|item| json_kind(item) != kind) {
            return Err(JsonInferError::MixedArray {
                key: key.to_string(),
            });
        }

        let item = match first {
            Value::Object(object) => {
                let name = self.sub_schema_name(parent, key)?;
                self.object(&name, false, object)?;
                return Ok(JsonType::ArrayObjects { name });
            }
            Value::Array(_) => {
                return Err(JsonInferError::NestedArray {
                    key: key.to_string(),
                });
            }
            Value::Bool(_) => JsonPrimitive::Boolean,
            Value::Number(n) if n.is_f64() => JsonPrimitive::Float,
            Value::Number(_) => JsonPrimitive::Number,
            Value::String(_) | Value::Null => JsonPrimitive::String,
        };
        Ok(JsonType::Array { item })
    }
}

fn walk<'a>(mut value: &'a Value, start_path: &str) -> Result<&'a Value, JsonInferError> {
    for segment in start_path.split('.').filter(|s| !s.is_empty()) {
        let next = match value {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(segment),
            _ => None,
        };
        value = next.ok_or_else(|| JsonInferError::PathNotFound {
            path: start_path.to_string(),
            segment: segment.to_string(),
        })?;
    }
    Ok(value)
}

/// Infers JSON schemas from a sample document.
///
/// `start_path` is walked first (`"props.0.items"`); a top-level array is
/// described by its first object. Schemas come back children first, the
/// entry schema last.
///
/// ```
/// use ssc_gen::json_struct::infer_schemas;
///
/// let schemas = infer_schemas(r#"{"a": ["b"], "meta": {"id": 1}}"#, "main", "").unwrap();
/// let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
/// assert_eq!(names, ["Meta", "Main"]);
/// ```
pub fn infer_schemas(
    json: &str,
    entry_name: &str,
    start_path: &str,
) -> Result<Vec<JsonSchema>, JsonInferError> {
    if starts_badly(entry_name) {
        return Err(JsonInferError::BadName {
            name: entry_name.to_string(),
        });
    }
    let document: Value = serde_json::from_str(json)?;
    let value = walk(&document, start_path)?;

    let (object, is_array) = match value {
        Value::Object(object) => (object, false),
        Value::Array(items) => match items.first() {
            Some(Value::Object(object)) => (object, true),
            Some(other) => {
                return Err(JsonInferError::NotAnObject {
                    found: json_kind(other),
                });
            }
            None => return Err(JsonInferError::NotAnObject { found: "empty array" }),
        },
        other => {
            return Err(JsonInferError::NotAnObject {
                found: json_kind(other),
            });
        }
    };

    let mut inference = Inference {
        schemas: Vec::new(),
    };
    let entry = to_upper_camel_case(entry_name);
    debug!(entry = %entry, is_array, "inferring json schemas");
    inference.object(&entry, is_array, object)?;
    Ok(inference.schemas)
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Prints schemas as `json` declarations, in the given order.
pub fn render_declarations(schemas: &[JsonSchema]) -> String {
    schemas
        .iter()
        .map(|schema| {
            let mut out = format!("json {}", schema.name);
            if schema.is_array {
                out.push_str(" array");
            }
            out.push_str(" {\n");
            for (key, ty) in &schema.fields {
                let key = if is_identifier(key) {
                    key.clone()
                } else {
                    format!("{:?}", key)
                };
                out.push_str(&format!("    {}: {}\n", key, ty.declaration()));
            }
            out.push('}');
            out
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
