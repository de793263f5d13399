//! Lowering of checked schemas into [`StructParser`] and [`TypeDef`] nodes.

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{
    DefaultValueWrapper, Expr, Expression, ExpressionChain, Hook, HookFunction, StartParseFunction,
    StructFieldFunction, StructInit, StructMember, StructParser, StructType, TypeDef, TypeDefField,
    TypeRef, TypeShape, Variable, VariableType,
};
use crate::error::AssembleError;
use crate::json_struct::JsonSchema;
use crate::schema::{Resolved, SchemaRegistry};

/// A chain with its leading `DEFAULT` stripped and every node numbered.
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub default: Option<DefaultValueWrapper>,
    /// Numbered nodes followed by the `RETURN`/`NO_RETURN` terminal
    pub body: Vec<Expression>,
    pub ret_type: VariableType,
    /// A `null` default was stripped
    pub nullable: bool,
}

/// Lowers one chain.
///
/// Nodes are numbered `0..n` after the `DEFAULT` strip and stamped with
/// their accept type. The terminal reuses the slot of the last node:
/// `RETURN` carries the chain's return type, `NO_RETURN` carries `NULL`.
///
/// ```
/// use ssc_gen::builder::lower_chain;
/// use ssc_gen::document::D;
///
/// let chain = D().default(0).unwrap().css(".price").unwrap().text().unwrap().to_int().unwrap();
/// let lowered = lower_chain(chain.chain(), true);
/// assert!(lowered.default.is_some());
/// let kinds: Vec<_> = lowered.body.iter().map(|e| e.name()).collect();
/// assert_eq!(kinds, ["CSS", "TEXT", "TO_INT", "RETURN"]);
/// ```
pub fn lower_chain(chain: &ExpressionChain, returns: bool) -> Lowered {
    let default = chain
        .default_value()
        .map(|value| DefaultValueWrapper { value: value.clone() });
    let nullable = default.as_ref().is_some_and(DefaultValueWrapper::is_nullable);
    let ret_type = chain.cursor();

    let mut body: Vec<Expression> = chain.iter().filter(|e| !e.is_default()).cloned().collect();
    let count = body.len();
    for (num, expression) in body.iter_mut().enumerate() {
        expression.variable = Some(Variable {
            num,
            count,
            ty: expression.accept_type,
        });
    }

    let last = count.saturating_sub(1);
    let terminal = if returns {
        let mut ret = Expression::same(Expr::Return, ret_type);
        ret.variable = Some(Variable {
            num: last,
            count,
            ty: ret_type,
        });
        ret
    } else {
        let mut ret = Expression::new(Expr::NoReturn, ret_type, VariableType::Null);
        ret.variable = Some(Variable {
            num: last,
            count,
            ty: VariableType::Null,
        });
        ret
    };
    body.push(terminal);

    Lowered {
        default,
        body,
        ret_type,
        nullable,
    }
}

fn call(name: &str, accept: VariableType, ret: VariableType) -> Expression {
    Expression::new(
        Expr::CallStructFunction {
            name: name.to_string(),
        },
        accept,
        ret,
    )
}

/// Builds IR nodes for schemas of one registry.
///
/// JSON schemas are consulted for the `is_array` flag of `JSONIFY`
/// references; struct targets stay unresolved until module assembly.
pub struct AstBuilder<'a> {
    registry: &'a SchemaRegistry,
    json: &'a IndexMap<String, JsonSchema>,
}

impl<'a> AstBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, json: &'a IndexMap<String, JsonSchema>) -> Self {
        AstBuilder { registry, json }
    }

    pub fn build_struct(&self, name: &str) -> Result<StructParser, AssembleError> {
        let kind = self.registry.resolve(name, name)?.kind;
        let resolved = self.registry.linearise(name)?;
        Ok(self.lower_struct(name, kind, &resolved))
    }

    fn lower_struct(&self, name: &str, kind: StructType, resolved: &Resolved) -> StructParser {
        let mut body = vec![StructMember::Init(StructInit {
            name: name.to_string(),
            accept: vec![VariableType::String, VariableType::Document],
        })];

        let hooks = Hook::ALL
            .into_iter()
            .filter(|hook| kind.allows_hook(*hook))
            .filter_map(|hook| resolved.hook(hook).map(|chain| (hook, chain)));
        for (hook, chain) in hooks {
            let lowered = lower_chain(chain, hook != Hook::PreValidate);
            let function = HookFunction {
                hook,
                ret_type: lowered.ret_type,
                nullable: lowered.nullable,
                default: lowered.default,
                body: lowered.body,
            };
            body.push(match hook {
                Hook::PreValidate => StructMember::PreValidateFunction(function),
                Hook::SplitDoc => StructMember::PartDocFunction(function),
                Hook::Key => StructMember::KeyFunction(function),
                Hook::Value => StructMember::ValueFunction(function),
                Hook::Item => StructMember::ItemFunction(function),
            });
        }

        if kind.has_named_fields() {
            for (field, chain) in resolved.named() {
                let lowered = lower_chain(chain, true);
                body.push(StructMember::FieldFunction(StructFieldFunction {
                    name: field.to_string(),
                    ret_type: lowered.ret_type,
                    nullable: lowered.nullable,
                    default: lowered.default,
                    body: lowered.body,
                }));
            }
        }

        body.push(StructMember::StartParseFunction(start_parse(kind, resolved)));
        debug!(schema = name, %kind, members = body.len(), "schema lowered");

        StructParser {
            name: name.to_string(),
            struct_type: kind,
            docstring: resolved.docstring.clone().unwrap_or_default(),
            body,
        }
    }

    pub fn build_typedef(&self, name: &str) -> Result<TypeDef, AssembleError> {
        let kind = self.registry.resolve(name, name)?.kind;
        let resolved = self.registry.linearise(name)?;

        let shape = match kind {
            StructType::Item | StructType::List | StructType::AccUniqueList => TypeShape::Record {
                fields: resolved
                    .named()
                    .map(|(field, chain)| self.typedef_field(field, chain))
                    .collect(),
            },
            StructType::Dict => TypeShape::Map {
                value: self.hook_field(&resolved, Hook::Value),
            },
            StructType::FlatList => TypeShape::List {
                item: self.hook_field(&resolved, Hook::Item),
            },
        };
        Ok(TypeDef {
            name: name.to_string(),
            struct_type: kind,
            shape,
        })
    }

    fn hook_field(&self, resolved: &Resolved, hook: Hook) -> TypeDefField {
        match resolved.hook(hook) {
            Some(chain) => self.typedef_field(hook.name(), chain),
            None => TypeDefField {
                name: hook.name().to_string(),
                ret_type: VariableType::Any,
                nullable: false,
                nested: None,
                json: None,
            },
        }
    }

    fn typedef_field(&self, name: &str, chain: &ExpressionChain) -> TypeDefField {
        let nested = chain.nested_ref().map(|schema| TypeRef {
            name: schema.to_string(),
            is_array: self
                .registry
                .get(schema)
                .is_some_and(|s| matches!(s.kind, StructType::List | StructType::FlatList)),
            target: None,
        });
        let json = chain.json_ref().map(|schema| TypeRef {
            name: schema.to_string(),
            is_array: self.json.get(schema).is_some_and(|s| s.is_array),
            target: None,
        });
        TypeDefField {
            name: name.to_string(),
            ret_type: chain.cursor(),
            nullable: chain.default_value().is_some_and(|v| v.is_null()),
            nested,
            json,
        }
    }
}

/// Kind-specific call sequence of the start-parse function
fn start_parse(kind: StructType, resolved: &Resolved) -> StartParseFunction {
    use VariableType::{Document, ListDocument, Null};

    let mut body = Vec::new();
    if resolved.hook(Hook::PreValidate).is_some() {
        body.push(call(Hook::PreValidate.name(), Document, Null));
    }
    if kind.required_hooks().contains(&Hook::SplitDoc) {
        body.push(call(Hook::SplitDoc.name(), Document, ListDocument));
    }

    let ret = |chain: Option<&ExpressionChain>| chain.map_or(VariableType::Any, ExpressionChain::cursor);
    match kind {
        StructType::Item | StructType::List | StructType::AccUniqueList => {
            for (field, chain) in resolved.named() {
                body.push(call(field, Document, chain.cursor()));
            }
        }
        StructType::Dict => {
            body.push(call(Hook::Key.name(), Document, ret(resolved.hook(Hook::Key))));
            body.push(call(Hook::Value.name(), Document, ret(resolved.hook(Hook::Value))));
        }
        StructType::FlatList => {
            body.push(call(Hook::Item.name(), Document, ret(resolved.hook(Hook::Item))));
        }
    }

    StartParseFunction {
        struct_type: kind,
        body,
    }
}
