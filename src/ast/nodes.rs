use serde::Serialize;

use super::{Expression, Hook, StructType, VariableType};
use crate::json_struct::JsonType;
use crate::value::Literal;

/// Index of a [`StructParser`] in the module's struct arena.
///
/// Arena order equals the order of `STRUCT` nodes in [`ModuleProgram::body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StructId(pub usize);

/// Root of the IR handed to emitters.
///
/// Body order: docstring, imports, JSON structs, typedefs, structs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleProgram {
    pub body: Vec<ModuleNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleNode {
    Docstring { value: String },
    Imports(ModuleImports),
    JsonStruct(JsonStruct),
    TypeDef(TypeDef),
    Struct(StructParser),
}

impl ModuleProgram {
    pub fn docstring(&self) -> Option<&str> {
        self.body.iter().find_map(|node| match node {
            ModuleNode::Docstring { value } => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn imports(&self) -> Option<&ModuleImports> {
        self.body.iter().find_map(|node| match node {
            ModuleNode::Imports(imports) => Some(imports),
            _ => None,
        })
    }

    pub fn json_structs(&self) -> impl Iterator<Item = &JsonStruct> {
        self.body.iter().filter_map(|node| match node {
            ModuleNode::JsonStruct(s) => Some(s),
            _ => None,
        })
    }

    pub fn typedefs(&self) -> impl Iterator<Item = &TypeDef> {
        self.body.iter().filter_map(|node| match node {
            ModuleNode::TypeDef(t) => Some(t),
            _ => None,
        })
    }

    /// Structs in arena order
    pub fn structs(&self) -> impl Iterator<Item = &StructParser> {
        self.body.iter().filter_map(|node| match node {
            ModuleNode::Struct(s) => Some(s),
            _ => None,
        })
    }

    pub fn struct_at(&self, id: StructId) -> Option<&StructParser> {
        self.structs().nth(id.0)
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructParser> {
        self.structs().find(|s| s.name == name)
    }

    pub fn find_typedef(&self, name: &str) -> Option<&TypeDef> {
        self.typedefs().find(|t| t.name == name)
    }

    /// Struct names in emission order
    pub fn struct_names(&self) -> Vec<&str> {
        self.structs().map(|s| s.name.as_str()).collect()
    }
}

/// Abstract dependency tags; emitters map them onto concrete imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportTag {
    Regex,
    Selector,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleImports {
    pub tags: Vec<ImportTag>,
}

impl ModuleImports {
    pub fn contains(&self, tag: ImportTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Deserialisation target for `JSONIFY`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonStruct {
    pub name: String,
    pub is_array: bool,
    pub fields: Vec<JsonStructField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonStructField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: JsonType,
}

/// Structural type descriptor of a schema's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub struct_type: StructType,
    pub shape: TypeShape,
}

/// - ITEM, LIST and AccUniqueList: ordered record of fields
///   (LIST wraps it in a sequence)
/// - DICT: `map<string, value>`
/// - FLAT_LIST: `list<item>`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeShape {
    Record { fields: Vec<TypeDefField> },
    Map { value: TypeDefField },
    List { item: TypeDefField },
}

impl TypeDef {
    pub fn fields(&self) -> Vec<&TypeDefField> {
        match &self.shape {
            TypeShape::Record { fields } => fields.iter().collect(),
            TypeShape::Map { value } => vec![value],
            TypeShape::List { item } => vec![item],
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeDefField> {
        self.fields().into_iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefField {
    pub name: String,
    pub ret_type: VariableType,
    pub nullable: bool,
    /// Typedef of the nested schema for `NESTED` fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<TypeRef>,
    /// JSON struct for `JSONIFY` fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<TypeRef>,
}

/// By-name reference, resolved to an arena index during assembly.
///
/// `is_array` marks sequence-shaped targets: LIST and FLAT_LIST schemas,
/// or JSON structs declared as arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeRef {
    pub name: String,
    pub is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<StructId>,
}

/// One lowered schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructParser {
    pub name: String,
    pub struct_type: StructType,
    pub docstring: String,
    pub body: Vec<StructMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructMember {
    Init(StructInit),
    PreValidateFunction(HookFunction),
    PartDocFunction(HookFunction),
    KeyFunction(HookFunction),
    ValueFunction(HookFunction),
    ItemFunction(HookFunction),
    FieldFunction(StructFieldFunction),
    StartParseFunction(StartParseFunction),
}

impl StructParser {
    pub fn init(&self) -> Option<&StructInit> {
        self.body.iter().find_map(|m| match m {
            StructMember::Init(init) => Some(init),
            _ => None,
        })
    }

    pub fn hook(&self, hook: Hook) -> Option<&HookFunction> {
        self.body.iter().find_map(|m| match m {
            StructMember::PreValidateFunction(f)
            | StructMember::PartDocFunction(f)
            | StructMember::KeyFunction(f)
            | StructMember::ValueFunction(f)
            | StructMember::ItemFunction(f)
                if f.hook == hook =>
            {
                Some(f)
            }
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &StructFieldFunction> {
        self.body.iter().filter_map(|m| match m {
            StructMember::FieldFunction(f) => Some(f),
            _ => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&StructFieldFunction> {
        self.fields().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields().map(|f| f.name.as_str()).collect()
    }

    pub fn start_parse(&self) -> Option<&StartParseFunction> {
        self.body.iter().find_map(|m| match m {
            StructMember::StartParseFunction(f) => Some(f),
            _ => None,
        })
    }

    /// Every lowered expression body of the struct, hooks first
    pub fn bodies(&self) -> Vec<&[Expression]> {
        self.body
            .iter()
            .filter_map(|m| match m {
                StructMember::PreValidateFunction(f)
                | StructMember::PartDocFunction(f)
                | StructMember::KeyFunction(f)
                | StructMember::ValueFunction(f)
                | StructMember::ItemFunction(f) => Some(f.body.as_slice()),
                StructMember::FieldFunction(f) => Some(f.body.as_slice()),
                _ => None,
            })
            .collect()
    }
}

/// Entry point: the struct takes raw HTML or an already parsed element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructInit {
    pub name: String,
    pub accept: Vec<VariableType>,
}

/// Recovery value carried out of a chain's leading `DEFAULT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultValueWrapper {
    pub value: Literal,
}

impl DefaultValueWrapper {
    pub fn is_nullable(&self) -> bool {
        self.value.is_null()
    }
}

/// Lowered reserved hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookFunction {
    pub hook: Hook,
    pub ret_type: VariableType,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValueWrapper>,
    pub body: Vec<Expression>,
}

/// Lowered named field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructFieldFunction {
    pub name: String,
    pub ret_type: VariableType,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValueWrapper>,
    pub body: Vec<Expression>,
}

/// Kind-specific dispatch over the struct's functions.
///
/// `body` holds `CALL_STRUCT_FUNCTION` nodes in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartParseFunction {
    pub struct_type: StructType,
    pub body: Vec<Expression>,
}

impl StartParseFunction {
    pub fn calls(&self) -> Vec<&str> {
        self.body
            .iter()
            .filter_map(|e| match &e.expr {
                super::Expr::CallStructFunction { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}
