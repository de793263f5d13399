//! Output signatures appended to struct docstrings.
//!
//! A signature is a JSON sketch of what the generated parser returns:
//!
//! ```text
//! ITEM        {"title": "String", "price": "Int | null"}
//! LIST        [{"name": "String"}, "..."]
//! DICT        {"<K>": "String", "<KN>": "..."}
//! FLAT_LIST   ["String", "..."]
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::ast::{ExpressionChain, Hook, StructType};
use crate::error::AssembleError;
use crate::json_struct::{JsonSchema, JsonType};
use crate::schema::{Resolved, SchemaRegistry};

const ELLIPSIS: &str = "...";

/// Signature of a JSON struct; unknown names render as the bare name.
pub fn json_signature(json: &IndexMap<String, JsonSchema>, name: &str) -> Value {
    let mut visiting = HashSet::new();
    json_object(json, name, &mut visiting, true)
}

fn json_object(
    json: &IndexMap<String, JsonSchema>,
    name: &str,
    visiting: &mut HashSet<String>,
    top: bool,
) -> Value {
    let Some(schema) = json.get(name) else {
        return Value::String(name.to_string());
    };
    if !visiting.insert(name.to_string()) {
        return Value::String(name.to_string());
    }
    let mut fields = Map::new();
    for (key, ty) in &schema.fields {
        let value = match ty {
            JsonType::Primitive { item } => json!(item.signature_name()),
            JsonType::Null => json!("null"),
            JsonType::Optional { item } => json!(format!("{} | null", item.signature_name())),
            JsonType::Array { item } => json!(format!("Array<{}>", item.signature_name())),
            JsonType::ArrayObjects { name } => json!([json_object(json, name, visiting, false), ELLIPSIS]),
            JsonType::Object { name } => json_object(json, name, visiting, false),
        };
        fields.insert(key.clone(), value);
    }
    visiting.remove(name);
    if top && schema.is_array {
        json!([Value::Object(fields), ELLIPSIS])
    } else {
        Value::Object(fields)
    }
}

/// Builds struct signatures, expanding nested schemas and JSON fields.
pub struct Signatures<'a> {
    registry: &'a SchemaRegistry,
    json: &'a IndexMap<String, JsonSchema>,
}

impl<'a> Signatures<'a> {
    pub fn new(registry: &'a SchemaRegistry, json: &'a IndexMap<String, JsonSchema>) -> Self {
        Signatures { registry, json }
    }

    pub fn schema(&self, name: &str) -> Result<Value, AssembleError> {
        let mut visiting = HashSet::new();
        self.schema_inner(name, &mut visiting)
    }

    fn schema_inner(&self, name: &str, visiting: &mut HashSet<String>) -> Result<Value, AssembleError> {
        if !visiting.insert(name.to_string()) {
            return Ok(Value::String(name.to_string()));
        }
        let kind = self.registry.resolve(name, name)?.kind;
        let resolved = self.registry.linearise(name)?;

        let value = if let Some(signature) = &resolved.signature {
            signature.to_json()
        } else {
            let excluded: Vec<&str> = resolved
                .exclude_signature
                .iter()
                .flatten()
                .map(String::as_str)
                .collect();
            match kind {
                StructType::Item => self.record(&resolved, &excluded, visiting)?,
                StructType::List => json!([self.record(&resolved, &excluded, visiting)?, ELLIPSIS]),
                StructType::Dict => {
                    let value = match resolved.hook(Hook::Value) {
                        Some(chain) => self.field(chain, visiting)?,
                        None => json!("Any"),
                    };
                    json!({ "<K>": value, "<KN>": ELLIPSIS })
                }
                StructType::FlatList => {
                    let item = match resolved.hook(Hook::Item) {
                        Some(chain) => self.field(chain, visiting)?,
                        None => json!("Any"),
                    };
                    json!([item, ELLIPSIS])
                }
                StructType::AccUniqueList => json!(["String", ELLIPSIS]),
            }
        };
        visiting.remove(name);
        Ok(value)
    }

    fn record(
        &self,
        resolved: &Resolved,
        excluded: &[&str],
        visiting: &mut HashSet<String>,
    ) -> Result<Value, AssembleError> {
        let mut fields = Map::new();
        for (field, chain) in resolved.named() {
            if !excluded.contains(&field) {
                fields.insert(field.to_string(), self.field(chain, visiting)?);
            }
        }
        Ok(Value::Object(fields))
    }

    fn field(&self, chain: &ExpressionChain, visiting: &mut HashSet<String>) -> Result<Value, AssembleError> {
        if let Some(nested) = chain.nested_ref() {
            return self.schema_inner(nested, visiting);
        }
        if let Some(json) = chain.json_ref() {
            return Ok(json_signature(self.json, json));
        }
        let name = chain.cursor().signature_name();
        Ok(if chain.default_value().is_some_and(|v| v.is_null()) {
            json!(format!("{} | null", name))
        } else {
            json!(name)
        })
    }

    /// Schema docstring followed by its pretty-printed signature
    pub fn docstring(&self, name: &str, docstring: &str) -> Result<String, AssembleError> {
        let signature = format!("{:#}", self.schema(name)?);
        Ok(if docstring.trim().is_empty() {
            signature
        } else {
            format!("{}\n\n{}", docstring.trim_end(), signature)
        })
    }
}
