//! Module assembly: reference resolution, ordering, checking and lowering
//! of every declared schema into one [`ModuleProgram`].

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{
    Expr, ImportTag, JsonStruct, JsonStructField, ModuleImports, ModuleNode, ModuleProgram,
    StructId, StructMember, StructParser, TypeDef,
};
use crate::builder::AstBuilder;
use crate::checker;
use crate::config::BuildOptions;
use crate::error::{AssembleError, Warning};
use crate::json_struct::JsonSchema;
use crate::schema::{Schema, SchemaRegistry};
use crate::signature::Signatures;
use crate::transform::{self, Conversion};

/// Successful assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub program: ModuleProgram,
    pub warnings: Vec<Warning>,
}

/// Schemas and JSON shapes declared in one source module.
///
/// ```
/// use ssc_gen::config::BuildOptions;
/// use ssc_gen::document::D;
/// use ssc_gen::module::Module;
/// use ssc_gen::schema::Schema;
/// use ssc_gen::ast::StructType;
///
/// let mut module = Module::new();
/// module
///     .add_schema(Schema::new("Main", StructType::Item).field("title", D().css("title::text").unwrap()))
///     .unwrap();
/// let assembled = module.assemble(&BuildOptions::default()).unwrap();
/// assert_eq!(assembled.program.struct_names(), ["Main"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub docstring: Option<String>,
    registry: SchemaRegistry,
    json: IndexMap<String, JsonSchema>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docstring(mut self, docstring: &str) -> Self {
        self.docstring = Some(docstring.to_string());
        self
    }

    pub fn add_schema(&mut self, schema: Schema) -> Result<&mut Self, AssembleError> {
        self.registry.register(schema)?;
        Ok(self)
    }

    pub fn add_json(&mut self, schema: JsonSchema) -> Result<&mut Self, AssembleError> {
        if self.json.contains_key(&schema.name) {
            return Err(AssembleError::DuplicateSchema(schema.name));
        }
        self.json.insert(schema.name.clone(), schema);
        Ok(self)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn json_schemas(&self) -> &IndexMap<String, JsonSchema> {
        &self.json
    }

    /// Every `NESTED` and `JSONIFY` reference names a declared schema
    fn resolve_references(&self) -> Result<(), AssembleError> {
        for schema in self.registry.iter() {
            for chain in self.registry.fields(&schema.name)?.values() {
                if let Some(nested) = chain.nested_ref() {
                    self.registry.resolve(nested, &schema.name)?;
                }
                if let Some(json) = chain.json_ref()
                    && !self.json.contains_key(json)
                {
                    return Err(AssembleError::UnknownJsonSchema {
                        name: json.to_string(),
                        referenced_by: schema.name.clone(),
                    });
                }
            }
        }
        for schema in self.json.values() {
            for reference in schema.references() {
                if !self.json.contains_key(reference) {
                    return Err(AssembleError::UnknownJsonSchema {
                        name: reference.to_string(),
                        referenced_by: schema.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Schema names with nested dependencies first, declaration order
    /// among independent peers.
    pub fn struct_order(&self) -> Result<Vec<String>, AssembleError> {
        let mut edges: IndexMap<String, Vec<String>> = IndexMap::new();
        for name in self.registry.names() {
            let refs = self
                .registry
                .fields(name)?
                .values()
                .filter_map(|chain| chain.nested_ref().map(str::to_string))
                .collect();
            edges.insert(name.to_string(), refs);
        }
        topological_order(&edges)
    }

    fn json_order(&self) -> Result<Vec<String>, AssembleError> {
        let edges: IndexMap<String, Vec<String>> = self
            .json
            .values()
            .map(|schema| {
                let refs = schema.references().into_iter().map(str::to_string).collect();
                (schema.name.clone(), refs)
            })
            .collect();
        topological_order(&edges)
    }

    /// Resolves, checks and lowers the module.
    ///
    /// Fails on the first unresolved reference or cycle; check diagnostics
    /// of all schemas are reported together.
    pub fn assemble(&self, options: &BuildOptions) -> Result<Assembled, AssembleError> {
        options.validate()?;
        self.resolve_references()?;
        let order = self.struct_order()?;
        let json_order = self.json_order()?;
        debug!(structs = ?order, json = ?json_order, "module order");

        let warnings = checker::check(&self.registry)?.into_result()?;

        let mut registry = self.registry.clone();
        if let Some(conversion) = Conversion::from_options(options) {
            let rewritten = transform::convert_registry(&mut registry, &conversion);
            debug!(?conversion, rewritten, "selector conversion applied");
        }

        let builder = AstBuilder::new(&registry, &self.json);
        let signatures = Signatures::new(&registry, &self.json);
        let ids: IndexMap<&str, StructId> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), StructId(i)))
            .collect();

        let mut typedefs = Vec::with_capacity(order.len());
        let mut structs = Vec::with_capacity(order.len());
        for name in &order {
            let mut typedef = builder.build_typedef(name)?;
            link_typedef(&mut typedef, &ids);
            typedefs.push(typedef);

            let mut parser = builder.build_struct(name)?;
            self.link_struct(&mut parser, &ids);
            parser.docstring = if options.gen_docstring {
                signatures.docstring(name, &parser.docstring)?
            } else {
                String::new()
            };
            structs.push(parser);
        }

        let json_structs: Vec<JsonStruct> = json_order
            .iter()
            .filter_map(|name| self.json.get(name))
            .map(|schema| JsonStruct {
                name: schema.name.clone(),
                is_array: schema.is_array,
                fields: schema
                    .fields
                    .iter()
                    .map(|(name, ty)| JsonStructField {
                        name: name.clone(),
                        ty: ty.clone(),
                    })
                    .collect(),
            })
            .collect();

        let mut body = Vec::new();
        if options.gen_docstring
            && let Some(docstring) = self.docstring.as_deref().filter(|d| !d.trim().is_empty())
        {
            body.push(ModuleNode::Docstring {
                value: docstring.to_string(),
            });
        }
        body.push(ModuleNode::Imports(imports(&structs, !json_structs.is_empty())));
        body.extend(json_structs.into_iter().map(ModuleNode::JsonStruct));
        body.extend(typedefs.into_iter().map(ModuleNode::TypeDef));
        body.extend(structs.into_iter().map(ModuleNode::Struct));

        debug!(nodes = body.len(), warnings = warnings.len(), "module assembled");
        Ok(Assembled {
            program: ModuleProgram { body },
            warnings,
        })
    }

    /// Points `NESTED` nodes at their struct and stamps `JSONIFY` nodes
    /// with the target's array flag
    fn link_struct(&self, parser: &mut StructParser, ids: &IndexMap<&str, StructId>) {
        for member in &mut parser.body {
            let body = match member {
                StructMember::PreValidateFunction(f)
                | StructMember::PartDocFunction(f)
                | StructMember::KeyFunction(f)
                | StructMember::ValueFunction(f)
                | StructMember::ItemFunction(f) => &mut f.body,
                StructMember::FieldFunction(f) => &mut f.body,
                StructMember::Init(_) | StructMember::StartParseFunction(_) => continue,
            };
            for expression in body.iter_mut() {
                match &mut expression.expr {
                    Expr::Nested { schema, target } => *target = ids.get(schema.as_str()).copied(),
                    Expr::Jsonify { schema, is_array, .. } => {
                        *is_array = self.json.get(schema.as_str()).is_some_and(|s| s.is_array);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn link_typedef(typedef: &mut TypeDef, ids: &IndexMap<&str, StructId>) {
    use crate::ast::TypeShape;

    let fields = match &mut typedef.shape {
        TypeShape::Record { fields } => fields.iter_mut().collect::<Vec<_>>(),
        TypeShape::Map { value } => vec![value],
        TypeShape::List { item } => vec![item],
    };
    for field in fields {
        if let Some(nested) = &mut field.nested {
            nested.target = ids.get(nested.name.as_str()).copied();
        }
    }
}

fn imports(structs: &[StructParser], has_json: bool) -> ModuleImports {
    let mut tags = Vec::new();
    let expressions = || structs.iter().flat_map(|s| s.bodies()).flatten();
    if expressions().any(|e| !e.expr.patterns().is_empty()) {
        tags.push(ImportTag::Regex);
    }
    if !structs.is_empty() {
        tags.push(ImportTag::Selector);
    }
    let parses_json = expressions()
        .any(|e| matches!(e.expr, Expr::Jsonify { .. } | Expr::JsonifyDynamic { .. }));
    if has_json || parses_json {
        tags.push(ImportTag::Json);
    }
    ModuleImports { tags }
}

/// Depth-first topological order over `edges` (name → dependencies).
///
/// Dependencies come first; ties keep the map's order. A cycle fails with
/// the path that closes it, e.g. `["A", "B", "A"]`.
pub fn topological_order(edges: &IndexMap<String, Vec<String>>) -> Result<Vec<String>, AssembleError> {
    fn visit<'a>(
        name: &'a str,
        edges: &'a IndexMap<String, Vec<String>>,
        done: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        out: &mut Vec<String>,
    ) -> Result<(), AssembleError> {
        if done.contains(name) || !edges.contains_key(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(AssembleError::CyclicNestedReference(cycle));
        }
        path.push(name);
        for dependency in edges.get(name).into_iter().flatten() {
            visit(dependency, edges, done, path, out)?;
        }
        path.pop();
        done.insert(name);
        out.push(name.to_string());
        Ok(())
    }

    let mut done = HashSet::new();
    let mut out = Vec::with_capacity(edges.len());
    for name in edges.keys() {
        visit(name, edges, &mut done, &mut Vec::new(), &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(pairs: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(name, deps)| (name.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn dependencies_first() {
        let edges = graph(&[("Main", &["Books", "Meta"]), ("Books", &["Price"]), ("Meta", &[]), ("Price", &[])]);
        assert_eq!(topological_order(&edges).unwrap(), ["Price", "Books", "Meta", "Main"]);
    }

    #[test]
    fn cycle_path() {
        let edges = graph(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(
            topological_order(&edges).unwrap_err(),
            AssembleError::CyclicNestedReference(vec!["A".into(), "B".into(), "A".into()])
        );
    }

    #[test]
    fn self_reference() {
        let edges = graph(&[("A", &["A"])]);
        assert_eq!(
            topological_order(&edges).unwrap_err(),
            AssembleError::CyclicNestedReference(vec!["A".into(), "A".into()])
        );
    }
}
