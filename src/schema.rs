//! Schema declarations and the registry that linearises them.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{ExpressionChain, Hook, StructType};
use crate::error::AssembleError;
use crate::value::Literal;

/// Declared member value.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Chain(ExpressionChain),
    /// Explicitly unset; masks the member inherited from a parent
    Missing,
}

/// One schema declaration.
///
/// ```
/// use ssc_gen::document::D;
/// use ssc_gen::schema::Schema;
/// use ssc_gen::ast::{Hook, StructType};
///
/// let books = Schema::new("Books", StructType::List)
///     .hook(Hook::SplitDoc, D().css_all(".card").unwrap())
///     .field("name", D().css("h2::text").unwrap());
/// assert_eq!(books.member_names(), ["__SPLIT_DOC__", "name"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub kind: StructType,
    /// Direct parents, nearest first
    pub parents: Vec<String>,
    pub docstring: Option<String>,
    members: IndexMap<String, Member>,
    pub signature: Option<Literal>,
    pub exclude_signature: Option<Vec<String>>,
}

impl Schema {
    pub fn new(name: &str, kind: StructType) -> Self {
        Schema {
            name: name.to_string(),
            kind,
            parents: Vec::new(),
            docstring: None,
            members: IndexMap::new(),
            signature: None,
            exclude_signature: None,
        }
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn doc(mut self, docstring: &str) -> Self {
        self.docstring = Some(docstring.to_string());
        self
    }

    pub fn field(mut self, name: &str, chain: impl Into<ExpressionChain>) -> Self {
        self.members
            .insert(name.to_string(), Member::Chain(chain.into()));
        self
    }

    pub fn hook(self, hook: Hook, chain: impl Into<ExpressionChain>) -> Self {
        self.field(hook.name(), chain)
    }

    pub fn missing(mut self, name: &str) -> Self {
        self.members.insert(name.to_string(), Member::Missing);
        self
    }

    pub fn signature(mut self, signature: Literal) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn exclude_signature(mut self, names: &[&str]) -> Self {
        self.exclude_signature = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn members(&self) -> &IndexMap<String, Member> {
        &self.members
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    /// Declared chains, `Missing` members skipped
    pub fn chains_mut(&mut self) -> impl Iterator<Item = (&str, &mut ExpressionChain)> {
        self.members.iter_mut().filter_map(|(name, member)| match member {
            Member::Chain(chain) => Some((name.as_str(), chain)),
            Member::Missing => None,
        })
    }
}

/// Names the registry treats as fields: reserved hooks and non-dunder names
fn is_field_name(name: &str) -> bool {
    Hook::from_name(name).is_some() || !name.starts_with('_')
}

/// Linearised view of one schema, child members first.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub fields: IndexMap<String, ExpressionChain>,
    pub docstring: Option<String>,
    pub signature: Option<Literal>,
    pub exclude_signature: Option<Vec<String>>,
}

impl Resolved {
    pub fn hook(&self, hook: Hook) -> Option<&ExpressionChain> {
        self.fields.get(hook.name())
    }

    pub fn hooks(&self) -> impl Iterator<Item = (Hook, &ExpressionChain)> {
        self.fields
            .iter()
            .filter_map(|(name, chain)| Hook::from_name(name).map(|h| (h, chain)))
    }

    /// Named (non-hook) fields in declaration order
    pub fn named(&self) -> impl Iterator<Item = (&str, &ExpressionChain)> {
        self.fields
            .iter()
            .filter(|(name, _)| Hook::from_name(name).is_none())
            .map(|(name, chain)| (name.as_str(), chain))
    }
}

/// Declared schemas, keyed by name in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: Schema) -> Result<(), AssembleError> {
        if self.schemas.contains_key(&schema.name) {
            return Err(AssembleError::DuplicateSchema(schema.name));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Schema> {
        self.schemas.values_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Looks up the target of a `NESTED` reference made by `referenced_by`
    pub fn resolve(&self, nested_ref: &str, referenced_by: &str) -> Result<&Schema, AssembleError> {
        self.schemas
            .get(nested_ref)
            .ok_or_else(|| AssembleError::UnknownSchema {
                name: nested_ref.to_string(),
                referenced_by: referenced_by.to_string(),
            })
    }

    /// Same-kind ancestors of `name`, depth-first, nearest first (the
    /// schema itself leads)
    pub fn lineage(&self, name: &str) -> Result<Vec<&Schema>, AssembleError> {
        let root = self.resolve(name, name)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.visit(root, root.kind, &mut seen, &mut out)?;
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        schema: &'a Schema,
        kind: StructType,
        seen: &mut HashSet<&'a str>,
        out: &mut Vec<&'a Schema>,
    ) -> Result<(), AssembleError> {
        if !seen.insert(schema.name.as_str()) {
            return Ok(());
        }
        out.push(schema);
        for parent in &schema.parents {
            let parent = self.resolve(parent, &schema.name)?;
            if parent.kind != kind {
                debug!(schema = %schema.name, parent = %parent.name, "skipping parent of another kind");
                continue;
            }
            self.visit(parent, kind, seen, out)?;
        }
        Ok(())
    }

    /// Ordered fields of `name`, inherited ones included.
    ///
    /// A member declared closer to the schema shadows the same name further
    /// up; `Missing` members mask without contributing.
    pub fn fields(&self, name: &str) -> Result<IndexMap<String, ExpressionChain>, AssembleError> {
        Ok(self.linearise(name)?.fields)
    }

    pub fn linearise(&self, name: &str) -> Result<Resolved, AssembleError> {
        let lineage = self.lineage(name)?;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut fields = IndexMap::new();
        for schema in &lineage {
            for (member, value) in &schema.members {
                if !is_field_name(member) || !seen.insert(member.as_str()) {
                    continue;
                }
                if let Member::Chain(chain) = value {
                    fields.insert(member.clone(), chain.clone());
                }
            }
        }

        Ok(Resolved {
            fields,
            docstring: lineage.iter().find_map(|s| s.docstring.clone()),
            signature: lineage.iter().find_map(|s| s.signature.clone()),
            exclude_signature: lineage.iter().find_map(|s| s.exclude_signature.clone()),
        })
    }
}
