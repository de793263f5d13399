// tests/checker_tests.rs

use pretty_assertions::assert_eq;
use ssc_gen::ast::{ElementPredicate, Expr, Expression, ExpressionChain, Hook, StructType, VariableType};
use ssc_gen::checker::{self, Report};
use ssc_gen::config::BuildOptions;
use ssc_gen::document::{D, FE, N};
use ssc_gen::error::{AssembleError, CheckErrorKind, WarningKind};
use ssc_gen::module::Module;
use ssc_gen::schema::{Schema, SchemaRegistry};
use ssc_gen::value::Literal;

fn registry(schemas: Vec<Schema>) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    for schema in schemas {
        registry.register(schema).unwrap();
    }
    registry
}

fn check(schemas: Vec<Schema>) -> Report {
    checker::check(&registry(schemas)).unwrap()
}

fn kinds(report: &Report) -> Vec<CheckErrorKind> {
    report.errors.iter().map(|e| e.kind).collect()
}

fn warning_kinds(report: &Report) -> Vec<WarningKind> {
    report.warnings.iter().map(|w| w.kind).collect()
}

fn split(query: &str) -> ssc_gen::document::Document {
    D().css_all(query).unwrap()
}

fn text(query: &str) -> ssc_gen::document::Document {
    D().css(query).unwrap().text().unwrap()
}

// ============================================================================
// Clean Schemas
// ============================================================================

#[test]
fn test_every_kind_passes_when_complete() {
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("title", text("title")),
        Schema::new("Books", StructType::List)
            .hook(Hook::SplitDoc, split(".book"))
            .field("name", text("h2")),
        Schema::new("Links", StructType::Dict)
            .hook(Hook::SplitDoc, split("a"))
            .hook(Hook::Key, text("a"))
            .hook(Hook::Value, D().attr("href").unwrap()),
        Schema::new("Tags", StructType::FlatList)
            .hook(Hook::SplitDoc, split(".tag"))
            .hook(Hook::Item, D().text().unwrap()),
        Schema::new("Images", StructType::AccUniqueList)
            .field("src", D().css_all("img::attr(src)").unwrap()),
    ]);
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(report.warnings.is_empty());
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn test_missing_split_doc() {
    let report = check(vec![
        Schema::new("Books", StructType::List).field("name", text("h2")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::HookMissing]);
    assert_eq!(report.errors[0].field.as_deref(), Some("__SPLIT_DOC__"));
}

#[test]
fn test_dict_requires_key_and_value() {
    let report = check(vec![
        Schema::new("Links", StructType::Dict).hook(Hook::SplitDoc, split("a")),
    ]);
    let fields: Vec<_> = report
        .errors
        .iter()
        .map(|e| (e.kind, e.field.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        fields,
        vec![
            (CheckErrorKind::HookMissing, "__KEY__".to_string()),
            (CheckErrorKind::HookMissing, "__VALUE__".to_string()),
        ]
    );
}

#[test]
fn test_split_doc_must_return_list() {
    let report = check(vec![
        Schema::new("Books", StructType::List)
            .hook(Hook::SplitDoc, D().css(".book").unwrap())
            .field("name", text("h2")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::HookReturnType]);
    let error = &report.errors[0];
    assert_eq!(error.expected.as_deref(), Some("LIST_DOCUMENT"));
    assert_eq!(error.actual.as_deref(), Some("DOCUMENT"));
    assert_eq!(error.tip, None);
}

#[test]
fn test_key_must_return_string() {
    let report = check(vec![
        Schema::new("Links", StructType::Dict)
            .hook(Hook::SplitDoc, split("a"))
            .hook(Hook::Key, text("a").to_int().unwrap())
            .hook(Hook::Value, text("a")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::HookReturnType]);
    assert_eq!(report.errors[0].expected.as_deref(), Some("STRING"));
}

#[test]
fn test_item_cannot_return_element() {
    let report = check(vec![
        Schema::new("Tags", StructType::FlatList)
            .hook(Hook::SplitDoc, split(".tag"))
            .hook(Hook::Item, D().css("span").unwrap()),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::HookReturnType]);
    assert_eq!(
        report.errors[0].tip.as_deref(),
        Some("extract text/attribute after selector")
    );
}

#[test]
fn test_split_doc_rejects_default() {
    let report = check(vec![
        Schema::new("Books", StructType::List)
            .hook(
                Hook::SplitDoc,
                D().default(Vec::<String>::new()).unwrap().css_all(".book").unwrap(),
            )
            .field("name", text("h2")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::DefaultMisplaced]);
    assert_eq!(report.errors[0].position, Some(0));
}

#[test]
fn test_key_default_cannot_be_null() {
    let report = check(vec![
        Schema::new("Links", StructType::Dict)
            .hook(Hook::SplitDoc, split("a"))
            .hook(Hook::Key, D().default(Literal::Null).unwrap().css("a::text").unwrap())
            .hook(Hook::Value, text("a")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::DefaultTypeMismatch]);
    assert_eq!(report.errors[0].field.as_deref(), Some("__KEY__"));
}

#[test]
fn test_unused_hook_is_a_warning() {
    let report = check(vec![
        Schema::new("Main", StructType::Item)
            .hook(Hook::Item, text("p"))
            .field("title", text("title")),
    ]);
    assert!(report.is_ok());
    assert_eq!(warning_kinds(&report), [WarningKind::UnusedHook]);
    assert_eq!(report.warnings[0].field.as_deref(), Some("__ITEM__"));
}

#[test]
fn test_pre_validate_allowed_everywhere() {
    let validate = D().is_css("body", "no body").unwrap();
    let report = check(vec![
        Schema::new("Main", StructType::Item)
            .hook(Hook::PreValidate, validate.clone())
            .field("title", text("title")),
        Schema::new("Tags", StructType::FlatList)
            .hook(Hook::PreValidate, validate)
            .hook(Hook::SplitDoc, split(".tag"))
            .hook(Hook::Item, D().text().unwrap()),
    ]);
    assert!(report.is_ok(), "{:?}", report.errors);
    assert!(report.warnings.is_empty());
}

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_dict_rejects_named_fields() {
    let report = check(vec![
        Schema::new("Links", StructType::Dict)
            .hook(Hook::SplitDoc, split("a"))
            .hook(Hook::Key, text("a"))
            .hook(Hook::Value, text("a"))
            .field("extra", text("a")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::UnexpectedField]);
    assert_eq!(report.errors[0].field.as_deref(), Some("extra"));
}

#[test]
fn test_field_cannot_end_on_element() {
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("block", D().css("div").unwrap()),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::InvalidFieldType]);
    assert_eq!(
        report.errors[0].tip.as_deref(),
        Some("extract text/attribute after selector, or use sub_parser()")
    );
}

#[test]
fn test_accumulating_fields_are_string_lists() {
    let report = check(vec![
        Schema::new("Images", StructType::AccUniqueList)
            .field("ok", D().css_all("img::attr(src)").unwrap())
            .field("bad", text("img")),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::InvalidFieldType]);
    assert_eq!(report.errors[0].field.as_deref(), Some("bad"));
    assert_eq!(report.errors[0].expected.as_deref(), Some("LIST_STRING"));
}

#[test]
fn test_empty_chain() {
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("nothing", ExpressionChain::new()),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::EmptyChain]);
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_default_must_fit_result() {
    let test_cases: Vec<(Literal, ssc_gen::document::Document, bool)> = vec![
        (Literal::from(0), text("p").to_int().unwrap(), true),
        (Literal::from("0"), text("p").to_int().unwrap(), false),
        (Literal::Null, text("p"), true),
        (Literal::Null, D().css("p").unwrap().to_bool().unwrap(), false),
        (Literal::List(vec![]), D().css_all("p::text").unwrap(), true),
        (Literal::List(vec![]), text("p"), false),
        (Literal::from(false), D().css("p").unwrap().to_bool().unwrap(), true),
    ];

    for (value, doc, fits) in test_cases {
        let chain = prepend_default(value.clone(), doc.into_chain());
        let report = check(vec![Schema::new("Main", StructType::Item).field("x", chain)]);
        assert_eq!(report.is_ok(), fits, "Failed for default: {}", value);
        if !fits {
            assert_eq!(kinds(&report), [CheckErrorKind::DefaultTypeMismatch]);
        }
    }
}

fn prepend_default(value: Literal, chain: ExpressionChain) -> ExpressionChain {
    let mut exprs = vec![Expression::new(
        Expr::Default { value },
        VariableType::Any,
        VariableType::Any,
    )];
    exprs.extend(chain.into_exprs());
    ExpressionChain::from_exprs(exprs)
}

#[test]
fn test_jsonify_with_default() {
    let chain = D()
        .default(Literal::Null)
        .unwrap()
        .css("script::text")
        .unwrap()
        .jsonify("Meta", None)
        .unwrap();
    let report = check(vec![Schema::new("Main", StructType::Item).field("meta", chain)]);
    assert_eq!(kinds(&report), [CheckErrorKind::JsonifyWithDefault]);
}

#[test]
fn test_default_swallows_assertion() {
    let chain = D()
        .default("")
        .unwrap()
        .css("title::text")
        .unwrap()
        .is_regex("^A", false, "")
        .unwrap();
    let report = check(vec![Schema::new("Main", StructType::Item).field("title", chain)]);
    assert!(report.is_ok());
    assert_eq!(warning_kinds(&report), [WarningKind::DefaultWithAssertion]);
}

// ============================================================================
// Hand-Built Chains
// ============================================================================

#[test]
fn test_hand_built_chain_rechecked() {
    let chain = ExpressionChain::from_exprs(vec![
        Expression::new(
            Expr::Css { query: "p".to_string() },
            VariableType::Document,
            VariableType::Document,
        ),
        Expression::new(Expr::Text, VariableType::Document, VariableType::String),
        Expression::same(
            Expr::Regex {
                pattern: r"(\d+)".to_string(),
                group: 2,
                ignore_case: false,
                dotall: false,
            },
            VariableType::String,
        ),
        Expression::new(Expr::ToInt, VariableType::ListString, VariableType::ListInt),
    ]);
    let report = check(vec![Schema::new("Main", StructType::Item).field("n", chain)]);
    let positioned: Vec<_> = report.errors.iter().map(|e| (e.kind, e.position)).collect();
    assert_eq!(
        positioned,
        vec![
            (CheckErrorKind::RegexSyntax, Some(2)),
            (CheckErrorKind::TypeMismatch, Some(3)),
        ]
    );
}

// ============================================================================
// Inheritance
// ============================================================================

#[test]
fn test_inherited_hook_satisfies_kind() {
    let report = check(vec![
        Schema::new("Base", StructType::List).hook(Hook::SplitDoc, split(".row")),
        Schema::new("Rows", StructType::List)
            .extends("Base")
            .field("cell", text("td")),
    ]);
    assert!(report.is_ok(), "{:?}", report.errors);
}

#[test]
fn test_masked_hook_is_missing() {
    let report = check(vec![
        Schema::new("Base", StructType::List)
            .hook(Hook::SplitDoc, split(".row"))
            .field("cell", text("td")),
        Schema::new("Rows", StructType::List)
            .extends("Base")
            .missing("__SPLIT_DOC__"),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::HookMissing]);
    assert_eq!(report.errors[0].schema, "Rows");
}

#[test]
fn test_unknown_parent() {
    let registry = registry(vec![
        Schema::new("Rows", StructType::List).extends("Nowhere"),
    ]);
    assert_eq!(
        checker::check(&registry).unwrap_err(),
        AssembleError::UnknownSchema {
            name: "Nowhere".to_string(),
            referenced_by: "Rows".to_string(),
        }
    );
}

// ============================================================================
// Signatures and Nested Schemas
// ============================================================================

#[test]
fn test_unmatched_exclude_signature() {
    let report = check(vec![
        Schema::new("Main", StructType::Item)
            .field("title", text("title"))
            .exclude_signature(&["title", "missing"]),
    ]);
    assert!(report.is_ok());
    assert_eq!(warning_kinds(&report), [WarningKind::UnmatchedExcludeSignature]);
    assert!(report.warnings[0].message.contains("'missing'"));
}

#[test]
fn test_nested_split_on_same_query() {
    let report = check(vec![
        Schema::new("Books", StructType::List)
            .hook(Hook::SplitDoc, split(".book"))
            .field("name", text("h2")),
        Schema::new("Main", StructType::Item).field(
            "books",
            N().css(".book").unwrap().sub_parser("Books").unwrap(),
        ),
    ]);
    assert!(report.is_ok());
    assert_eq!(warning_kinds(&report), [WarningKind::UnreachableNested]);
    assert_eq!(report.warnings[0].schema, "Main");
}

#[test]
fn test_nested_split_on_other_query() {
    let report = check(vec![
        Schema::new("Books", StructType::List)
            .hook(Hook::SplitDoc, split(".book"))
            .field("name", text("h2")),
        Schema::new("Main", StructType::Item).field(
            "books",
            N().css(".shelf").unwrap().sub_parser("Books").unwrap(),
        ),
    ]);
    assert!(report.warnings.is_empty());
}

#[test]
fn test_nothing_after_nested() {
    let chain = ExpressionChain::from_exprs(vec![
        Expression::new(
            Expr::Nested {
                schema: "Other".into(),
                target: None,
            },
            VariableType::Document,
            VariableType::Nested,
        ),
        Expression::new(Expr::ToBool, VariableType::Any, VariableType::Bool),
    ]);
    let report = check(vec![
        Schema::new("Other", StructType::Item).field("title", text("title")),
        Schema::new("Main", StructType::Item).field("flag", chain),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::NestedNotLast]);
    assert_eq!(report.errors[0].position, Some(1));
    assert_eq!(report.errors[0].field.as_deref(), Some("flag"));
}

// ============================================================================
// Element Filters and Dynamic JSON
// ============================================================================

#[test]
fn test_element_filter_passes() {
    let chain = D()
        .css_all("a")
        .unwrap()
        .filter(FE().css("img").unwrap().attr_re("href", "^https?://", false).unwrap())
        .unwrap()
        .attr("href")
        .unwrap();
    let report = check(vec![Schema::new("Main", StructType::Item).field("links", chain)]);
    assert!(report.is_ok(), "{:?}", report.errors);
}

#[test]
fn test_element_filter_queries_checked() {
    let filter = Expression::same(
        Expr::DocumentFilter {
            predicate: ElementPredicate::Css {
                query: "div[".into(),
            }
            .and(ElementPredicate::HasText {
                values: vec!["x".into()],
            }),
        },
        VariableType::ListDocument,
    );
    let mut exprs = D().css_all("a").unwrap().into_chain().into_exprs();
    exprs.push(filter);
    exprs.push(Expression::new(Expr::TextAll, VariableType::ListDocument, VariableType::ListString));
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("links", ExpressionChain::from_exprs(exprs)),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::SelectorSyntax]);
    assert_eq!(report.errors[0].position, Some(1));
}

#[test]
fn test_jsonify_dynamic_is_a_field_terminal() {
    let chain = text("script").jsonify_dynamic(Some("props")).unwrap();
    let report = check(vec![Schema::new("Main", StructType::Item).field("data", chain)]);
    assert!(report.is_ok(), "{:?}", report.errors);
}

#[test]
fn test_jsonify_dynamic_with_default() {
    let chain = D()
        .default(Literal::Null)
        .unwrap()
        .css("script::text")
        .unwrap()
        .jsonify_dynamic(None)
        .unwrap();
    let report = check(vec![Schema::new("Main", StructType::Item).field("data", chain)]);
    assert_eq!(kinds(&report), [CheckErrorKind::JsonifyWithDefault]);
    assert!(report.errors[0].message.contains("jsonify_dynamic()"));
}

#[test]
fn test_nothing_after_dynamic_json() {
    let mut exprs = text("script").jsonify_dynamic(None).unwrap().into_chain().into_exprs();
    exprs.push(Expression::new(Expr::ToInt, VariableType::String, VariableType::Int));
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("n", ExpressionChain::from_exprs(exprs)),
    ]);
    assert_eq!(kinds(&report), [CheckErrorKind::TypeMismatch]);
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_module_reports_every_failure() {
    let mut module = Module::new();
    module
        .add_schema(Schema::new("Books", StructType::List).field("name", text("h2")))
        .unwrap()
        .add_schema(Schema::new("Main", StructType::Item).field("block", D().css("div").unwrap()))
        .unwrap();

    match module.assemble(&BuildOptions::default()) {
        Err(AssembleError::Check(failure)) => {
            assert_eq!(
                failure.kinds(),
                [CheckErrorKind::HookMissing, CheckErrorKind::InvalidFieldType]
            );
            assert!(failure.to_string().starts_with("2 check error(s)"));
        }
        other => panic!("expected check failure, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let report = check(vec![
        Schema::new("Main", StructType::Item).field("block", D().css("div").unwrap()),
    ]);
    assert_eq!(
        report.errors[0].to_string(),
        "Main.block: InvalidFieldType: field cannot return DOCUMENT \
         (expected STRING, INT, FLOAT, BOOL, a list of them, NESTED, JSON or ANY, got DOCUMENT)\n  \
         tip: extract text/attribute after selector, or use sub_parser()"
    );
}
