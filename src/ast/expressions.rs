use indexmap::IndexMap;
use serde::Serialize;

use super::{ElementPredicate, FilterPredicate, StructId, VariableType};
use crate::value::Literal;

/// Expression node: the operation plus its operands.
///
/// Accept/return types live on the surrounding [`Expression`]; the same
/// operation can appear with different arities (string ops accept `STRING`
/// or `LIST_STRING` and keep it).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Expr {
    // Default / initial
    /// Recovery value returned when any later step fails
    ///
    /// Only valid as the first node; stripped into a wrapper during lowering.
    Default { value: Literal },

    // HTML selection
    /// First element matching a CSS query
    ///
    /// # Examples
    /// ```text
    /// D().css("div.price")
    /// ```
    Css { query: String },
    /// First element matching an XPath query
    Xpath { query: String },
    /// All elements matching a CSS query
    CssAll { query: String },
    /// All elements matching an XPath query
    XpathAll { query: String },
    /// Drops matching elements from the document (DOCUMENT → DOCUMENT)
    CssRemove { query: String },
    XpathRemove { query: String },

    // HTML extraction
    /// Attribute value; several keys yield every present value
    Attr { keys: Vec<String> },
    AttrAll { keys: Vec<String> },
    Text,
    TextAll,
    /// Outer HTML of the element
    Raw,
    RawAll,
    /// Attribute values of the element
    AttrsMap,
    AttrsMapAll,

    // Collections
    /// Element at `index`; negative counts from the end (`-1` is the last)
    Index { index: i64 },
    Join { sep: String },
    ToLen,
    Unique { keep_order: bool },
    Filter { predicate: FilterPredicate },
    /// Keeps the elements of a `LIST_DOCUMENT` matching the predicate
    DocumentFilter { predicate: ElementPredicate },

    // Strings (arity preserving)
    Trim { substr: String },
    Ltrim { substr: String },
    Rtrim { substr: String },
    RmPrefix { substr: String },
    RmSuffix { substr: String },
    RmPrefixSuffix { substr: String },
    Replace { old: String, new: String },
    ReplaceMap { table: IndexMap<String, String> },
    /// Template with one `{{}}` slot
    ///
    /// # Examples
    /// ```text
    /// D().css("a::attr(href)").fmt("https://example.com{{}}")
    /// ```
    Format { template: String },
    Split { sep: String },
    Unescape,

    // Regex
    Regex {
        pattern: String,
        group: usize,
        ignore_case: bool,
        dotall: bool,
    },
    RegexAll {
        pattern: String,
        ignore_case: bool,
        dotall: bool,
    },
    RegexSub {
        pattern: String,
        repl: String,
        ignore_case: bool,
        dotall: bool,
    },

    // Casts
    ToInt,
    ToListInt,
    ToFloat,
    ToListFloat,
    ToBool,

    // Assertions: accept and return types are identical
    IsEqual { value: Literal, msg: String },
    IsNotEqual { value: Literal, msg: String },
    IsContains { value: Literal, msg: String },
    IsCss { query: String, msg: String },
    IsXpath { query: String, msg: String },
    IsRegex {
        pattern: String,
        ignore_case: bool,
        msg: String,
    },
    AnyIsRegex {
        pattern: String,
        ignore_case: bool,
        msg: String,
    },
    AllIsRegex {
        pattern: String,
        ignore_case: bool,
        msg: String,
    },
    HasAttr { key: String, msg: String },
    HasListAttr { key: String, msg: String },

    // Structural sinks
    /// Value parsed by another schema, referenced by name
    ///
    /// `target` is filled in by the module assembler.
    Nested {
        schema: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<StructId>,
    },
    /// String deserialised into a JSON shape schema
    Jsonify {
        schema: String,
        /// Dotted path walked before deserialising (`"props.0.items"`)
        start: String,
        is_array: bool,
    },
    /// String parsed as untyped JSON (`ANY`); no shape schema
    JsonifyDynamic {
        /// Dotted path walked after parsing
        start: String,
    },

    // Synthesised during lowering
    Return,
    NoReturn,
    CallStructFunction { name: String },
}

impl Expr {
    /// Token name of the operation (`"CSS_ALL"`, `"TO_INT"`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            Expr::Default { .. } => "DEFAULT",
            Expr::Css { .. } => "CSS",
            Expr::Xpath { .. } => "XPATH",
            Expr::CssAll { .. } => "CSS_ALL",
            Expr::XpathAll { .. } => "XPATH_ALL",
            Expr::CssRemove { .. } => "CSS_REMOVE",
            Expr::XpathRemove { .. } => "XPATH_REMOVE",
            Expr::Attr { .. } => "ATTR",
            Expr::AttrAll { .. } => "ATTR_ALL",
            Expr::Text => "TEXT",
            Expr::TextAll => "TEXT_ALL",
            Expr::Raw => "RAW",
            Expr::RawAll => "RAW_ALL",
            Expr::AttrsMap => "ATTRS_MAP",
            Expr::AttrsMapAll => "ATTRS_MAP_ALL",
            Expr::Index { .. } => "INDEX",
            Expr::Join { .. } => "JOIN",
            Expr::ToLen => "TO_LEN",
            Expr::Unique { .. } => "UNIQUE",
            Expr::Filter { .. } => "FILTER",
            Expr::DocumentFilter { .. } => "DOCUMENT_FILTER",
            Expr::Trim { .. } => "TRIM",
            Expr::Ltrim { .. } => "LTRIM",
            Expr::Rtrim { .. } => "RTRIM",
            Expr::RmPrefix { .. } => "RM_PREFIX",
            Expr::RmSuffix { .. } => "RM_SUFFIX",
            Expr::RmPrefixSuffix { .. } => "RM_PREFIX_SUFFIX",
            Expr::Replace { .. } => "REPLACE",
            Expr::ReplaceMap { .. } => "REPLACE_MAP",
            Expr::Format { .. } => "FORMAT",
            Expr::Split { .. } => "SPLIT",
            Expr::Unescape => "UNESCAPE",
            Expr::Regex { .. } => "REGEX",
            Expr::RegexAll { .. } => "REGEX_ALL",
            Expr::RegexSub { .. } => "REGEX_SUB",
            Expr::ToInt => "TO_INT",
            Expr::ToListInt => "TO_LIST_INT",
            Expr::ToFloat => "TO_FLOAT",
            Expr::ToListFloat => "TO_LIST_FLOAT",
            Expr::ToBool => "TO_BOOL",
            Expr::IsEqual { .. } => "IS_EQUAL",
            Expr::IsNotEqual { .. } => "IS_NOT_EQUAL",
            Expr::IsContains { .. } => "IS_CONTAINS",
            Expr::IsCss { .. } => "IS_CSS",
            Expr::IsXpath { .. } => "IS_XPATH",
            Expr::IsRegex { .. } => "IS_REGEX",
            Expr::AnyIsRegex { .. } => "ANY_IS_REGEX",
            Expr::AllIsRegex { .. } => "ALL_IS_REGEX",
            Expr::HasAttr { .. } => "HAS_ATTR",
            Expr::HasListAttr { .. } => "HAS_LIST_ATTR",
            Expr::Nested { .. } => "NESTED",
            Expr::Jsonify { .. } => "JSONIFY",
            Expr::JsonifyDynamic { .. } => "JSONIFY_DYNAMIC",
            Expr::Return => "RETURN",
            Expr::NoReturn => "NO_RETURN",
            Expr::CallStructFunction { .. } => "CALL_STRUCT_FUNCTION",
        }
    }

    /// Builder method that produces this node, used in diagnostics
    pub fn method_name(&self) -> &'static str {
        match self {
            Expr::Default { .. } => "default",
            Expr::Css { .. } => "css",
            Expr::Xpath { .. } => "xpath",
            Expr::CssAll { .. } => "css_all",
            Expr::XpathAll { .. } => "xpath_all",
            Expr::CssRemove { .. } => "css_remove",
            Expr::XpathRemove { .. } => "xpath_remove",
            Expr::Attr { .. } | Expr::AttrAll { .. } => "attr",
            Expr::Text | Expr::TextAll => "text",
            Expr::Raw | Expr::RawAll => "raw",
            Expr::AttrsMap | Expr::AttrsMapAll => "attrs_map",
            Expr::Index { .. } => "index",
            Expr::Join { .. } => "join",
            Expr::ToLen => "to_len",
            Expr::Unique { .. } => "unique",
            Expr::Filter { .. } | Expr::DocumentFilter { .. } => "filter",
            Expr::Trim { .. } => "trim",
            Expr::Ltrim { .. } => "ltrim",
            Expr::Rtrim { .. } => "rtrim",
            Expr::RmPrefix { .. } => "rm_prefix",
            Expr::RmSuffix { .. } => "rm_suffix",
            Expr::RmPrefixSuffix { .. } => "rm_prefix_suffix",
            Expr::Replace { .. } => "repl",
            Expr::ReplaceMap { .. } => "repl_map",
            Expr::Format { .. } => "fmt",
            Expr::Split { .. } => "split",
            Expr::Unescape => "unescape",
            Expr::Regex { .. } => "re",
            Expr::RegexAll { .. } => "re_all",
            Expr::RegexSub { .. } => "re_sub",
            Expr::ToInt | Expr::ToListInt => "to_int",
            Expr::ToFloat | Expr::ToListFloat => "to_float",
            Expr::ToBool => "to_bool",
            Expr::IsEqual { .. } => "is_equal",
            Expr::IsNotEqual { .. } => "is_not_equal",
            Expr::IsContains { .. } => "is_contains",
            Expr::IsCss { .. } => "is_css",
            Expr::IsXpath { .. } => "is_xpath",
            Expr::IsRegex { .. } => "is_regex",
            Expr::AnyIsRegex { .. } => "any_is_re",
            Expr::AllIsRegex { .. } => "all_is_re",
            Expr::HasAttr { .. } | Expr::HasListAttr { .. } => "has_attr",
            Expr::Nested { .. } => "sub_parser",
            Expr::Jsonify { .. } => "jsonify",
            Expr::JsonifyDynamic { .. } => "jsonify_dynamic",
            Expr::Return => "return",
            Expr::NoReturn => "no_return",
            Expr::CallStructFunction { .. } => "call",
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Expr::IsEqual { .. }
                | Expr::IsNotEqual { .. }
                | Expr::IsContains { .. }
                | Expr::IsCss { .. }
                | Expr::IsXpath { .. }
                | Expr::IsRegex { .. }
                | Expr::AnyIsRegex { .. }
                | Expr::AllIsRegex { .. }
                | Expr::HasAttr { .. }
                | Expr::HasListAttr { .. }
        )
    }

    /// CSS or XPath query carried by the node, if any
    pub fn query(&self) -> Option<&str> {
        match self {
            Expr::Css { query }
            | Expr::Xpath { query }
            | Expr::CssAll { query }
            | Expr::XpathAll { query }
            | Expr::CssRemove { query }
            | Expr::XpathRemove { query }
            | Expr::IsCss { query, .. }
            | Expr::IsXpath { query, .. } => Some(query),
            _ => None,
        }
    }

    pub fn is_css(&self) -> bool {
        matches!(
            self,
            Expr::Css { .. } | Expr::CssAll { .. } | Expr::CssRemove { .. } | Expr::IsCss { .. }
        )
    }

    pub fn is_xpath(&self) -> bool {
        matches!(
            self,
            Expr::Xpath { .. }
                | Expr::XpathAll { .. }
                | Expr::XpathRemove { .. }
                | Expr::IsXpath { .. }
        )
    }

    /// Regex patterns carried by the node (filters may carry several)
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Expr::Regex { pattern, .. }
            | Expr::RegexAll { pattern, .. }
            | Expr::RegexSub { pattern, .. }
            | Expr::IsRegex { pattern, .. }
            | Expr::AnyIsRegex { pattern, .. }
            | Expr::AllIsRegex { pattern, .. } => vec![pattern.as_str()],
            Expr::Filter { predicate } => predicate.patterns(),
            Expr::DocumentFilter { predicate } => predicate.patterns(),
            _ => Vec::new(),
        }
    }
}

/// Numbered binding slot assigned during lowering.
///
/// Emitters name intermediate variables by joining a prefix with `num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Position in the chain after `DEFAULT` stripping, 0-based
    pub num: usize,
    /// Total number of nodes in the stripped chain
    pub count: usize,
    /// Accept type of the expression
    #[serde(rename = "type")]
    pub ty: VariableType,
}

/// An [`Expr`] stamped with its accept/return types and (after lowering)
/// its variable slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    #[serde(flatten)]
    pub expr: Expr,
    pub accept_type: VariableType,
    pub ret_type: VariableType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<Variable>,
}

impl Expression {
    pub fn new(expr: Expr, accept_type: VariableType, ret_type: VariableType) -> Self {
        Expression {
            expr,
            accept_type,
            ret_type,
            variable: None,
        }
    }

    /// Shortcut for assertions and other nodes that keep the cursor type
    pub fn same(expr: Expr, ty: VariableType) -> Self {
        Expression::new(expr, ty, ty)
    }

    pub fn name(&self) -> &'static str {
        self.expr.name()
    }

    pub fn is_default(&self) -> bool {
        matches!(self.expr, Expr::Default { .. })
    }
}

/// Ordered list of expressions produced by the builder.
///
/// The chain is plain data: passes read it, lowering clones it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExpressionChain {
    exprs: Vec<Expression>,
}

impl ExpressionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exprs(exprs: Vec<Expression>) -> Self {
        ExpressionChain { exprs }
    }

    pub fn push(&mut self, expr: Expression) {
        self.exprs.push(expr);
    }

    pub fn exprs(&self) -> &[Expression] {
        &self.exprs
    }

    pub fn exprs_mut(&mut self) -> &mut [Expression] {
        &mut self.exprs
    }

    pub fn into_exprs(self) -> Vec<Expression> {
        self.exprs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expression> {
        self.exprs.iter()
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Current type-state cursor.
    ///
    /// An empty chain (or one holding only `DEFAULT`) sits on `DOCUMENT`.
    pub fn cursor(&self) -> VariableType {
        self.exprs
            .iter()
            .rev()
            .find(|e| !e.is_default())
            .map_or(VariableType::Document, |e| e.ret_type)
    }

    /// Leading `DEFAULT` literal, if the chain starts with one
    pub fn default_value(&self) -> Option<&Literal> {
        match self.exprs.first().map(|e| &e.expr) {
            Some(Expr::Default { value }) => Some(value),
            _ => None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.exprs.iter().any(Expression::is_default)
    }

    /// Schema named by a `NESTED` node
    pub fn nested_ref(&self) -> Option<&str> {
        self.exprs.iter().find_map(|e| match &e.expr {
            Expr::Nested { schema, .. } => Some(schema.as_str()),
            _ => None,
        })
    }

    /// JSON schema named by a `JSONIFY` node
    pub fn json_ref(&self) -> Option<&str> {
        self.exprs.iter().find_map(|e| match &e.expr {
            Expr::Jsonify { schema, .. } => Some(schema.as_str()),
            _ => None,
        })
    }

    /// Ordered token names, handy for comparing chains by shape
    pub fn kinds(&self) -> Vec<&'static str> {
        self.exprs.iter().map(Expression::name).collect()
    }
}

impl<'a> IntoIterator for &'a ExpressionChain {
    type Item = &'a Expression;
    type IntoIter = std::slice::Iter<'a, Expression>;

    fn into_iter(self) -> Self::IntoIter {
        self.exprs.iter()
    }
}
