//! Fluent expression builder.
//!
//! Each call appends one [`Expression`] and advances the type-state cursor.
//! Incompatible calls fail immediately with [`BuildError::TypeMismatch`]:
//!
//! ```
//! use ssc_gen::document::D;
//!
//! let price = D().default(0).unwrap()
//!     .css(".price").unwrap()
//!     .text().unwrap()
//!     .re(r"(\d+)").unwrap()
//!     .to_int().unwrap();
//! assert_eq!(price.chain().kinds(), ["DEFAULT", "CSS", "TEXT", "REGEX", "TO_INT"]);
//!
//! assert!(D().css("a").unwrap().to_int().is_err());
//! ```

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{
    ElementPredicate, Expr, Expression, ExpressionChain, FilterPredicate, LenOp, VariableType,
};
use crate::error::BuildError;
use crate::pattern;
use crate::pseudo::{self, PseudoAction, SplitQuery};
use crate::selector;
use crate::value::Literal;

use VariableType::{
    Any, Bool, Document as Doc, Float, Int, Json, ListDocument, ListFloat, ListInt, ListString,
    Nested as NestedType, String as Str,
};

/// Default pattern of [`Document::re_trim`]
pub const TRIM_PATTERN: &str = r"(?:^\s+)|(?:\s+$)";

/// Regex flags shared by the pattern operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub dotall: bool,
}

/// Chain builder starting on a `DOCUMENT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    chain: ExpressionChain,
    raw_source: bool,
}

/// Starts a chain on the parsed document
#[allow(non_snake_case)]
pub fn D() -> Document {
    Document::new()
}

/// Starts a chain on the raw page source (`D().raw()`)
#[allow(non_snake_case)]
pub fn R() -> Document {
    Document::raw_source()
}

/// Starts a nested-schema reference
#[allow(non_snake_case)]
pub fn N() -> Nested {
    Nested::new()
}

/// Starts a filter predicate
#[allow(non_snake_case)]
pub fn F() -> Filter {
    Filter::new()
}

/// Starts an element filter predicate
#[allow(non_snake_case)]
pub fn FE() -> ElementFilter {
    ElementFilter::new()
}

impl Document {
    pub fn new() -> Self {
        Document {
            chain: ExpressionChain::new(),
            raw_source: false,
        }
    }

    pub fn raw_source() -> Self {
        let mut doc = Document::new();
        doc.chain.push(Expression::new(Expr::Raw, Doc, Str));
        doc.raw_source = true;
        doc
    }

    pub fn chain(&self) -> &ExpressionChain {
        &self.chain
    }

    pub fn into_chain(self) -> ExpressionChain {
        self.chain
    }

    pub fn cursor(&self) -> VariableType {
        self.chain.cursor()
    }

    fn push(mut self, expr: Expr, accept: VariableType, ret: VariableType) -> Self {
        trace!(op = expr.name(), %accept, %ret, "append expression");
        self.chain.push(Expression::new(expr, accept, ret));
        self.raw_source = false;
        self
    }

    /// Checks the cursor against the accepted types and returns it.
    ///
    /// An untyped (`ANY`) cursor ends the chain: nothing accepts it.
    fn expect(
        &self,
        method: &'static str,
        accepted: &[VariableType],
    ) -> Result<VariableType, BuildError> {
        let cursor = self.cursor();
        if cursor != Any && accepted.iter().any(|t| t.accepts(cursor)) {
            return Ok(cursor);
        }
        Err(BuildError::TypeMismatch {
            method,
            expected: accepted.to_vec(),
            actual: cursor,
            hint: self.hint(accepted, cursor),
        })
    }

    fn hint(&self, accepted: &[VariableType], cursor: VariableType) -> Option<String> {
        let wants_string = accepted.contains(&Str) || accepted.contains(&ListString);
        if !wants_string || !matches!(cursor, Doc | ListDocument) {
            return None;
        }
        let after_default = self
            .chain
            .exprs()
            .last()
            .is_some_and(Expression::is_default);
        Some(if after_default {
            "after default() extract text/attribute first".to_string()
        } else {
            "extract text/attribute after selector".to_string()
        })
    }

    // ------------------------------------------------------------------
    // Default
    // ------------------------------------------------------------------

    /// Recovery value returned when any later step fails.
    ///
    /// Must be the first call. `[]` is the only accepted list literal.
    pub fn default(mut self, value: impl Into<Literal>) -> Result<Self, BuildError> {
        let value = value.into();
        let at_start = self.chain.is_empty() || (self.raw_source && self.chain.len() == 1);
        if !at_start {
            return Err(BuildError::DefaultMisplaced {
                message: "default() must be the first call of a chain".to_string(),
            });
        }
        match &value {
            Literal::List(items) if !items.is_empty() => {
                return Err(BuildError::InvalidArgument {
                    method: "default",
                    message: "only an empty list is allowed as a list default".to_string(),
                });
            }
            Literal::Map(_) => {
                return Err(BuildError::InvalidArgument {
                    method: "default",
                    message: "mappings cannot be used as a default".to_string(),
                });
            }
            _ => {}
        }
        trace!(%value, "append default");
        let mut exprs = vec![Expression::new(Expr::Default { value }, Any, Any)];
        exprs.extend(self.chain.into_exprs());
        self.chain = ExpressionChain::from_exprs(exprs);
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn apply_pseudo(
        self,
        split: SplitQuery,
        original: &str,
    ) -> Result<Self, BuildError> {
        match split.action {
            None => Ok(self),
            Some(action) => {
                debug!(query = original, selector = %split.query, ?action, "pseudo-selector decomposed");
                match action {
                    PseudoAction::Text => self.text(),
                    PseudoAction::Raw => self.raw(),
                    PseudoAction::Attr(keys) => self.attr_keys(keys),
                }
            }
        }
    }

    pub fn css(self, query: &str) -> Result<Self, BuildError> {
        self.expect("css", &[Doc])?;
        let split = pseudo::split_css(query)?;
        selector::validate_css(&split.query)?;
        let expr = Expr::Css {
            query: split.query.clone(),
        };
        self.push(expr, Doc, Doc).apply_pseudo(split, query)
    }

    pub fn css_all(self, query: &str) -> Result<Self, BuildError> {
        self.expect("css_all", &[Doc])?;
        let split = pseudo::split_css(query)?;
        selector::validate_css(&split.query)?;
        let expr = Expr::CssAll {
            query: split.query.clone(),
        };
        self.push(expr, Doc, ListDocument).apply_pseudo(split, query)
    }

    pub fn xpath(self, query: &str) -> Result<Self, BuildError> {
        self.expect("xpath", &[Doc])?;
        let split = pseudo::split_xpath(query);
        selector::validate_xpath(&split.query)?;
        let expr = Expr::Xpath {
            query: split.query.clone(),
        };
        self.push(expr, Doc, Doc).apply_pseudo(split, query)
    }

    pub fn xpath_all(self, query: &str) -> Result<Self, BuildError> {
        self.expect("xpath_all", &[Doc])?;
        let split = pseudo::split_xpath(query);
        selector::validate_xpath(&split.query)?;
        let expr = Expr::XpathAll {
            query: split.query.clone(),
        };
        self.push(expr, Doc, ListDocument).apply_pseudo(split, query)
    }

    /// Drops every element matching `query` from the document
    pub fn css_remove(self, query: &str) -> Result<Self, BuildError> {
        self.expect("css_remove", &[Doc])?;
        pseudo::reject_css("css_remove", query)?;
        let query = query.trim();
        selector::validate_css(query)?;
        Ok(self.push(
            Expr::CssRemove {
                query: query.to_string(),
            },
            Doc,
            Doc,
        ))
    }

    pub fn xpath_remove(self, query: &str) -> Result<Self, BuildError> {
        self.expect("xpath_remove", &[Doc])?;
        pseudo::reject_xpath("xpath_remove", query)?;
        let query = query.trim();
        selector::validate_xpath(query)?;
        Ok(self.push(
            Expr::XpathRemove {
                query: query.to_string(),
            },
            Doc,
            Doc,
        ))
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    pub fn attr(self, key: &str) -> Result<Self, BuildError> {
        self.attr_keys(vec![key.to_string()])
    }

    /// Several keys: every present value is collected into `LIST_STRING`
    pub fn attrs(self, keys: &[&str]) -> Result<Self, BuildError> {
        self.attr_keys(keys.iter().map(|k| k.to_string()).collect())
    }

    fn attr_keys(self, keys: Vec<String>) -> Result<Self, BuildError> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(BuildError::InvalidArgument {
                method: "attr",
                message: "at least one attribute name is required".to_string(),
            });
        }
        match self.expect("attr", &[Doc, ListDocument])? {
            Doc if keys.len() == 1 => Ok(self.push(Expr::Attr { keys }, Doc, Str)),
            Doc => Ok(self.push(Expr::Attr { keys }, Doc, ListString)),
            _ => Ok(self.push(Expr::AttrAll { keys }, ListDocument, ListString)),
        }
    }

    pub fn text(self) -> Result<Self, BuildError> {
        match self.expect("text", &[Doc, ListDocument])? {
            Doc => Ok(self.push(Expr::Text, Doc, Str)),
            _ => Ok(self.push(Expr::TextAll, ListDocument, ListString)),
        }
    }

    pub fn raw(self) -> Result<Self, BuildError> {
        match self.expect("raw", &[Doc, ListDocument])? {
            Doc => Ok(self.push(Expr::Raw, Doc, Str)),
            _ => Ok(self.push(Expr::RawAll, ListDocument, ListString)),
        }
    }

    /// Attribute values of the element(s); emitters materialise the map
    pub fn attrs_map(self) -> Result<Self, BuildError> {
        match self.expect("attrs_map", &[Doc, ListDocument])? {
            Doc => Ok(self.push(Expr::AttrsMap, Doc, ListString)),
            _ => Ok(self.push(Expr::AttrsMapAll, ListDocument, ListString)),
        }
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Element at `index`; `-1` is the last element
    pub fn index(self, index: i64) -> Result<Self, BuildError> {
        let cursor = self.expect("index", &[ListDocument, ListString, ListInt, ListFloat])?;
        let item = cursor.item_type().unwrap_or(cursor);
        Ok(self.push(Expr::Index { index }, cursor, item))
    }

    pub fn first(self) -> Result<Self, BuildError> {
        self.index(0)
    }

    pub fn last(self) -> Result<Self, BuildError> {
        self.index(-1)
    }

    pub fn join(self, sep: &str) -> Result<Self, BuildError> {
        self.expect("join", &[ListString])?;
        Ok(self.push(
            Expr::Join {
                sep: sep.to_string(),
            },
            ListString,
            Str,
        ))
    }

    pub fn to_len(self) -> Result<Self, BuildError> {
        let cursor = self.expect("to_len", &[ListDocument, ListString, ListInt, ListFloat])?;
        Ok(self.push(Expr::ToLen, cursor, Int))
    }

    pub fn unique(self, keep_order: bool) -> Result<Self, BuildError> {
        self.expect("unique", &[ListString])?;
        Ok(self.push(Expr::Unique { keep_order }, ListString, ListString))
    }

    /// `F()` filters a `LIST_STRING`, `FE()` a `LIST_DOCUMENT`.
    pub fn filter(self, filter: impl ChainFilter) -> Result<Self, BuildError> {
        let ty = filter.list_type();
        self.expect("filter", &[ty])?;
        let expr = filter.into_expr()?;
        Ok(self.push(expr, ty, ty))
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Arity-preserving string op: STRING → STRING, LIST_STRING → LIST_STRING
    fn string_op(self, method: &'static str, expr: Expr) -> Result<Self, BuildError> {
        let cursor = self.expect(method, &[Str, ListString])?;
        Ok(self.push(expr, cursor, cursor))
    }

    pub fn trim(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op("trim", Expr::Trim { substr: substr.to_string() })
    }

    pub fn ltrim(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op("ltrim", Expr::Ltrim { substr: substr.to_string() })
    }

    pub fn rtrim(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op("rtrim", Expr::Rtrim { substr: substr.to_string() })
    }

    pub fn rm_prefix(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op("rm_prefix", Expr::RmPrefix { substr: substr.to_string() })
    }

    pub fn rm_suffix(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op("rm_suffix", Expr::RmSuffix { substr: substr.to_string() })
    }

    pub fn rm_prefix_suffix(self, substr: &str) -> Result<Self, BuildError> {
        self.string_op(
            "rm_prefix_suffix",
            Expr::RmPrefixSuffix { substr: substr.to_string() },
        )
    }

    pub fn repl(self, old: &str, new: &str) -> Result<Self, BuildError> {
        self.string_op(
            "repl",
            Expr::Replace {
                old: old.to_string(),
                new: new.to_string(),
            },
        )
    }

    pub fn repl_map(self, table: IndexMap<String, String>) -> Result<Self, BuildError> {
        if table.is_empty() {
            return Err(BuildError::InvalidArgument {
                method: "repl_map",
                message: "replacement table is empty".to_string(),
            });
        }
        self.string_op("repl_map", Expr::ReplaceMap { table })
    }

    /// Template with a `{{}}` slot, applied element-wise on lists
    pub fn fmt(self, template: &str) -> Result<Self, BuildError> {
        if !template.contains("{{}}") {
            return Err(BuildError::FormatTemplateMissingSlot {
                template: template.to_string(),
            });
        }
        self.string_op(
            "fmt",
            Expr::Format {
                template: template.to_string(),
            },
        )
    }

    pub fn split(self, sep: &str) -> Result<Self, BuildError> {
        self.expect("split", &[Str])?;
        Ok(self.push(Expr::Split { sep: sep.to_string() }, Str, ListString))
    }

    pub fn unescape(self) -> Result<Self, BuildError> {
        self.string_op("unescape", Expr::Unescape)
    }

    // ------------------------------------------------------------------
    // Regex
    // ------------------------------------------------------------------

    /// First capturing group of `pattern`
    pub fn re(self, pattern: &str) -> Result<Self, BuildError> {
        self.re_with(pattern, 1, RegexFlags::default())
    }

    pub fn re_with(self, pattern: &str, group: usize, flags: RegexFlags) -> Result<Self, BuildError> {
        self.expect("re", &[Str])?;
        let p = pattern::normalize(pattern, flags.ignore_case, flags.dotall);
        let re = pattern::compile(&p.pattern, p.ignore_case, p.dotall)?;
        pattern::check_group(&p.pattern, pattern::capture_groups(&re), group)?;
        Ok(self.push(
            Expr::Regex {
                pattern: p.pattern,
                group,
                ignore_case: p.ignore_case,
                dotall: p.dotall,
            },
            Str,
            Str,
        ))
    }

    pub fn re_all(self, pattern: &str) -> Result<Self, BuildError> {
        self.re_all_with(pattern, RegexFlags::default())
    }

    pub fn re_all_with(self, pattern: &str, flags: RegexFlags) -> Result<Self, BuildError> {
        self.expect("re_all", &[Str])?;
        let p = pattern::normalize(pattern, flags.ignore_case, flags.dotall);
        let re = pattern::compile(&p.pattern, p.ignore_case, p.dotall)?;
        pattern::check_findall(&p.pattern, pattern::capture_groups(&re))?;
        Ok(self.push(
            Expr::RegexAll {
                pattern: p.pattern,
                ignore_case: p.ignore_case,
                dotall: p.dotall,
            },
            Str,
            ListString,
        ))
    }

    pub fn re_sub(self, pattern: &str, repl: &str) -> Result<Self, BuildError> {
        self.re_sub_with(pattern, repl, RegexFlags::default())
    }

    pub fn re_sub_with(self, pattern: &str, repl: &str, flags: RegexFlags) -> Result<Self, BuildError> {
        let cursor = self.expect("re_sub", &[Str, ListString])?;
        let p = pattern::normalize(pattern, flags.ignore_case, flags.dotall);
        pattern::compile(&p.pattern, p.ignore_case, p.dotall)?;
        Ok(self.push(
            Expr::RegexSub {
                pattern: p.pattern,
                repl: repl.to_string(),
                ignore_case: p.ignore_case,
                dotall: p.dotall,
            },
            cursor,
            cursor,
        ))
    }

    /// `re_sub(pattern, "")`, stripping surrounding whitespace by default
    pub fn re_trim(self, pattern: Option<&str>) -> Result<Self, BuildError> {
        self.re_sub(pattern.unwrap_or(TRIM_PATTERN), "")
    }

    // ------------------------------------------------------------------
    // Casts
    // ------------------------------------------------------------------

    pub fn to_int(self) -> Result<Self, BuildError> {
        match self.expect("to_int", &[Str, ListString])? {
            Str => Ok(self.push(Expr::ToInt, Str, Int)),
            _ => Ok(self.push(Expr::ToListInt, ListString, ListInt)),
        }
    }

    pub fn to_float(self) -> Result<Self, BuildError> {
        match self.expect("to_float", &[Str, ListString])? {
            Str => Ok(self.push(Expr::ToFloat, Str, Float)),
            _ => Ok(self.push(Expr::ToListFloat, ListString, ListFloat)),
        }
    }

    /// Truthiness of a document, scalar or list
    pub fn to_bool(self) -> Result<Self, BuildError> {
        let accepted = [Doc, ListDocument, Str, ListString, Int, ListInt, Float, ListFloat, Bool];
        let cursor = self.expect("to_bool", &accepted)?;
        Ok(self.push(Expr::ToBool, cursor, Bool))
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    fn assertion(self, method: &'static str, accepted: &[VariableType], expr: Expr) -> Result<Self, BuildError> {
        let cursor = self.expect(method, accepted)?;
        Ok(self.push(expr, cursor, cursor))
    }

    fn scalar_operand(
        &self,
        method: &'static str,
        value: &Literal,
    ) -> Result<(), BuildError> {
        let cursor = self.expect(method, &[Str, Int, Float, Bool])?;
        if value.variable_type() != Some(cursor) {
            return Err(BuildError::InvalidArgument {
                method,
                message: format!("{} operand does not match cursor type {}", value.type_name(), cursor),
            });
        }
        Ok(())
    }

    pub fn is_equal(self, value: impl Into<Literal>, msg: &str) -> Result<Self, BuildError> {
        let value = value.into();
        self.scalar_operand("is_equal", &value)?;
        let expr = Expr::IsEqual { value, msg: msg.to_string() };
        self.assertion("is_equal", &[Str, Int, Float, Bool], expr)
    }

    pub fn is_not_equal(self, value: impl Into<Literal>, msg: &str) -> Result<Self, BuildError> {
        let value = value.into();
        self.scalar_operand("is_not_equal", &value)?;
        let expr = Expr::IsNotEqual { value, msg: msg.to_string() };
        self.assertion("is_not_equal", &[Str, Int, Float, Bool], expr)
    }

    pub fn is_contains(self, value: impl Into<Literal>, msg: &str) -> Result<Self, BuildError> {
        let value = value.into();
        let cursor = self.expect("is_contains", &[ListString, ListInt, ListFloat])?;
        if value.variable_type() != cursor.item_type() {
            return Err(BuildError::InvalidArgument {
                method: "is_contains",
                message: format!("{} operand does not match items of {}", value.type_name(), cursor),
            });
        }
        let expr = Expr::IsContains { value, msg: msg.to_string() };
        Ok(self.push(expr, cursor, cursor))
    }

    pub fn is_css(self, query: &str, msg: &str) -> Result<Self, BuildError> {
        self.expect("is_css", &[Doc])?;
        pseudo::reject_css("is_css", query)?;
        let query = query.trim();
        selector::validate_css(query)?;
        let expr = Expr::IsCss {
            query: query.to_string(),
            msg: msg.to_string(),
        };
        Ok(self.push(expr, Doc, Doc))
    }

    pub fn is_xpath(self, query: &str, msg: &str) -> Result<Self, BuildError> {
        self.expect("is_xpath", &[Doc])?;
        pseudo::reject_xpath("is_xpath", query)?;
        let query = query.trim();
        selector::validate_xpath(query)?;
        let expr = Expr::IsXpath {
            query: query.to_string(),
            msg: msg.to_string(),
        };
        Ok(self.push(expr, Doc, Doc))
    }

    pub fn is_regex(self, pattern: &str, ignore_case: bool, msg: &str) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        let expr = Expr::IsRegex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
            msg: msg.to_string(),
        };
        self.assertion("is_regex", &[Str], expr)
    }

    /// At least one item of the list matches
    pub fn any_is_re(self, pattern: &str, ignore_case: bool, msg: &str) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        let expr = Expr::AnyIsRegex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
            msg: msg.to_string(),
        };
        self.assertion("any_is_re", &[ListString], expr)
    }

    /// Every item of the list matches
    pub fn all_is_re(self, pattern: &str, ignore_case: bool, msg: &str) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        let expr = Expr::AllIsRegex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
            msg: msg.to_string(),
        };
        self.assertion("all_is_re", &[ListString], expr)
    }

    pub fn has_attr(self, key: &str, msg: &str) -> Result<Self, BuildError> {
        let key = key.trim().to_string();
        let msg = msg.to_string();
        match self.expect("has_attr", &[Doc, ListDocument])? {
            Doc => Ok(self.push(Expr::HasAttr { key, msg }, Doc, Doc)),
            _ => Ok(self.push(Expr::HasListAttr { key, msg }, ListDocument, ListDocument)),
        }
    }

    // ------------------------------------------------------------------
    // Structural sinks
    // ------------------------------------------------------------------

    /// Deserialises the string into the JSON struct `schema`.
    ///
    /// `start` is a dotted path walked first (`"props.0.items"`).
    pub fn jsonify(self, schema: &str, start: Option<&str>) -> Result<Self, BuildError> {
        self.expect("jsonify", &[Str])?;
        let expr = Expr::Jsonify {
            schema: schema.to_string(),
            start: start.unwrap_or_default().to_string(),
            is_array: false,
        };
        Ok(self.push(expr, Str, Json))
    }

    /// Parses the string (or each string of the list) as untyped JSON.
    pub fn jsonify_dynamic(self, start: Option<&str>) -> Result<Self, BuildError> {
        let cursor = self.expect("jsonify_dynamic", &[Str, ListString])?;
        let expr = Expr::JsonifyDynamic {
            start: start.unwrap_or_default().to_string(),
        };
        Ok(self.push(expr, cursor, Any))
    }

    /// Hands the element to the schema `schema`. Nothing may follow, so
    /// the finished chain is returned.
    pub fn sub_parser(self, schema: &str) -> Result<ExpressionChain, BuildError> {
        self.expect("sub_parser", &[Doc])?;
        let expr = Expr::Nested {
            schema: schema.to_string(),
            target: None,
        };
        Ok(self.push(expr, Doc, NestedType).into_chain())
    }
}

impl From<Document> for ExpressionChain {
    fn from(doc: Document) -> Self {
        doc.into_chain()
    }
}

/// Restricted builder for nested-schema references.
///
/// Admits an optional element narrowing (`css`, `xpath`, `is_css`,
/// `is_xpath`, `has_attr`) followed by the terminal [`Nested::sub_parser`].
#[derive(Debug, Clone, PartialEq)]
pub struct Nested {
    doc: Document,
}

impl Nested {
    pub fn new() -> Self {
        Nested {
            doc: Document::new(),
        }
    }

    pub fn css(self, query: &str) -> Result<Self, BuildError> {
        pseudo::reject_css("css", query)?;
        Ok(Nested {
            doc: self.doc.css(query)?,
        })
    }

    pub fn xpath(self, query: &str) -> Result<Self, BuildError> {
        pseudo::reject_xpath("xpath", query)?;
        Ok(Nested {
            doc: self.doc.xpath(query)?,
        })
    }

    pub fn is_css(self, query: &str, msg: &str) -> Result<Self, BuildError> {
        Ok(Nested {
            doc: self.doc.is_css(query, msg)?,
        })
    }

    pub fn is_xpath(self, query: &str, msg: &str) -> Result<Self, BuildError> {
        Ok(Nested {
            doc: self.doc.is_xpath(query, msg)?,
        })
    }

    pub fn has_attr(self, key: &str, msg: &str) -> Result<Self, BuildError> {
        Ok(Nested {
            doc: self.doc.has_attr(key, msg)?,
        })
    }

    pub fn sub_parser(self, schema: &str) -> Result<ExpressionChain, BuildError> {
        self.doc.sub_parser(schema)
    }
}

/// Builder for [`FilterPredicate`] trees.
///
/// Successive calls are joined with AND; `or` and `not` combine whole
/// filters.
///
/// ```
/// use ssc_gen::document::F;
///
/// let f = F().starts(&["http"]).len_gt(10).or(F().eq(&["#"]));
/// assert_eq!(f.predicate().unwrap().to_string(), "((starts([\"http\"]) & len > 10) | eq([\"#\"]))");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicate: Option<FilterPredicate>,
}

fn checked_pattern(pattern: &str, ignore_case: bool) -> Result<pattern::Pattern, BuildError> {
    let p = pattern::normalize(pattern, ignore_case, false);
    pattern::compile(&p.pattern, p.ignore_case, p.dotall)?;
    Ok(p)
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate(&self) -> Option<&FilterPredicate> {
        self.predicate.as_ref()
    }

    pub fn into_predicate(self) -> Option<FilterPredicate> {
        self.predicate
    }

    fn push(self, next: FilterPredicate) -> Self {
        let predicate = match self.predicate {
            Some(current) => current.and(next),
            None => next,
        };
        Filter {
            predicate: Some(predicate),
        }
    }

    pub fn eq(self, values: &[&str]) -> Self {
        self.push(FilterPredicate::Eq { values: owned(values) })
    }

    pub fn ne(self, values: &[&str]) -> Self {
        self.push(FilterPredicate::Neq { values: owned(values) })
    }

    pub fn contains(self, values: &[&str]) -> Self {
        self.push(FilterPredicate::Contains { values: owned(values) })
    }

    pub fn starts(self, values: &[&str]) -> Self {
        self.push(FilterPredicate::Starts { values: owned(values) })
    }

    pub fn ends(self, values: &[&str]) -> Self {
        self.push(FilterPredicate::Ends { values: owned(values) })
    }

    pub fn re(self, pattern: &str, ignore_case: bool) -> Result<Self, BuildError> {
        let p = pattern::normalize(pattern, ignore_case, false);
        pattern::compile(&p.pattern, p.ignore_case, p.dotall)?;
        Ok(self.push(FilterPredicate::Regex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
        }))
    }

    pub fn len_cmp(self, cmp: LenOp, len: usize) -> Self {
        self.push(FilterPredicate::LenCmp { cmp, len })
    }

    pub fn len_eq(self, len: usize) -> Self {
        self.len_cmp(LenOp::Eq, len)
    }

    pub fn len_ne(self, len: usize) -> Self {
        self.len_cmp(LenOp::Ne, len)
    }

    pub fn len_lt(self, len: usize) -> Self {
        self.len_cmp(LenOp::Lt, len)
    }

    pub fn len_le(self, len: usize) -> Self {
        self.len_cmp(LenOp::Le, len)
    }

    pub fn len_gt(self, len: usize) -> Self {
        self.len_cmp(LenOp::Gt, len)
    }

    pub fn len_ge(self, len: usize) -> Self {
        self.len_cmp(LenOp::Ge, len)
    }

    pub fn and(self, other: Filter) -> Self {
        match other.predicate {
            Some(p) => self.push(p),
            None => self,
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match (self.predicate, other.predicate) {
            (Some(left), Some(right)) => Filter {
                predicate: Some(left.or(right)),
            },
            (left, right) => Filter {
                predicate: left.or(right),
            },
        }
    }

    /// Negates `other` and joins it with AND; an empty receiver just
    /// negates
    pub fn not(self, other: Filter) -> Self {
        match other.predicate {
            Some(p) => self.push(p.negate()),
            None => self,
        }
    }
}

/// Argument of [`Document::filter`].
pub trait ChainFilter {
    /// List type the filter applies to
    fn list_type(&self) -> VariableType;

    fn into_expr(self) -> Result<Expr, BuildError>;
}

fn empty_filter() -> BuildError {
    BuildError::InvalidArgument {
        method: "filter",
        message: "empty filter".to_string(),
    }
}

impl ChainFilter for Filter {
    fn list_type(&self) -> VariableType {
        ListString
    }

    fn into_expr(self) -> Result<Expr, BuildError> {
        let predicate = self.into_predicate().ok_or_else(empty_filter)?;
        for p in predicate.patterns() {
            pattern::compile(p, false, false)?;
        }
        Ok(Expr::Filter { predicate })
    }
}

/// Builder for [`ElementPredicate`] trees, applied to `LIST_DOCUMENT`.
///
/// Calls are joined with AND like [`Filter`]. The `attr_*` checks add a
/// `has_attr(key)` guard unless one is already present.
///
/// ```
/// use ssc_gen::document::{D, FE};
///
/// let links = D()
///     .css_all("a").unwrap()
///     .filter(FE().attr_starts("href", &["https"]).not(FE().has_text(&["Ad"]))).unwrap();
/// assert_eq!(links.chain().kinds(), ["CSS_ALL", "DOCUMENT_FILTER"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    predicate: Option<ElementPredicate>,
}

impl ElementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate(&self) -> Option<&ElementPredicate> {
        self.predicate.as_ref()
    }

    pub fn into_predicate(self) -> Option<ElementPredicate> {
        self.predicate
    }

    fn push(self, next: ElementPredicate) -> Self {
        let predicate = match self.predicate {
            Some(current) => current.and(next),
            None => next,
        };
        ElementFilter {
            predicate: Some(predicate),
        }
    }

    fn guarded(self, key: &str, next: ElementPredicate) -> Self {
        let has_guard = self
            .predicate
            .as_ref()
            .is_some_and(|p| p.requires_attr(key));
        let filter = if has_guard {
            self
        } else {
            self.has_attr(&[key])
        };
        filter.push(next)
    }

    /// Element contains a match for `query`
    pub fn css(self, query: &str) -> Result<Self, BuildError> {
        pseudo::reject_css("css", query)?;
        let query = query.trim();
        selector::validate_css(query)?;
        Ok(self.push(ElementPredicate::Css {
            query: query.to_string(),
        }))
    }

    pub fn xpath(self, query: &str) -> Result<Self, BuildError> {
        pseudo::reject_xpath("xpath", query)?;
        let query = query.trim();
        selector::validate_xpath(query)?;
        Ok(self.push(ElementPredicate::Xpath {
            query: query.to_string(),
        }))
    }

    /// Text contains any of `values`
    pub fn has_text(self, values: &[&str]) -> Self {
        self.push(ElementPredicate::HasText { values: owned(values) })
    }

    /// Outer HTML contains any of `values`
    pub fn has_raw(self, values: &[&str]) -> Self {
        self.push(ElementPredicate::HasRaw { values: owned(values) })
    }

    pub fn re_text(self, pattern: &str, ignore_case: bool) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        Ok(self.push(ElementPredicate::TextRegex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
        }))
    }

    pub fn re_raw(self, pattern: &str, ignore_case: bool) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        Ok(self.push(ElementPredicate::RawRegex {
            pattern: p.pattern,
            ignore_case: p.ignore_case,
        }))
    }

    /// Any of `keys` is present
    pub fn has_attr(self, keys: &[&str]) -> Self {
        self.push(ElementPredicate::HasAttr { keys: owned(keys) })
    }

    pub fn attr_eq(self, key: &str, values: &[&str]) -> Self {
        let next = ElementPredicate::AttrEq {
            key: key.to_string(),
            values: owned(values),
        };
        self.guarded(key, next)
    }

    pub fn attr_contains(self, key: &str, values: &[&str]) -> Self {
        let next = ElementPredicate::AttrContains {
            key: key.to_string(),
            values: owned(values),
        };
        self.guarded(key, next)
    }

    pub fn attr_starts(self, key: &str, values: &[&str]) -> Self {
        let next = ElementPredicate::AttrStarts {
            key: key.to_string(),
            values: owned(values),
        };
        self.guarded(key, next)
    }

    pub fn attr_ends(self, key: &str, values: &[&str]) -> Self {
        let next = ElementPredicate::AttrEnds {
            key: key.to_string(),
            values: owned(values),
        };
        self.guarded(key, next)
    }

    pub fn attr_re(self, key: &str, pattern: &str, ignore_case: bool) -> Result<Self, BuildError> {
        let p = checked_pattern(pattern, ignore_case)?;
        let next = ElementPredicate::AttrRegex {
            key: key.to_string(),
            pattern: p.pattern,
            ignore_case: p.ignore_case,
        };
        Ok(self.guarded(key, next))
    }

    pub fn and(self, other: ElementFilter) -> Self {
        match other.predicate {
            Some(p) => self.push(p),
            None => self,
        }
    }

    pub fn or(self, other: ElementFilter) -> Self {
        match (self.predicate, other.predicate) {
            (Some(left), Some(right)) => ElementFilter {
                predicate: Some(left.or(right)),
            },
            (left, right) => ElementFilter {
                predicate: left.or(right),
            },
        }
    }

    pub fn not(self, other: ElementFilter) -> Self {
        match other.predicate {
            Some(p) => self.push(p.negate()),
            None => self,
        }
    }
}

impl ChainFilter for ElementFilter {
    fn list_type(&self) -> VariableType {
        ListDocument
    }

    fn into_expr(self) -> Result<Expr, BuildError> {
        let predicate = self.into_predicate().ok_or_else(empty_filter)?;
        Ok(Expr::DocumentFilter { predicate })
    }
}
