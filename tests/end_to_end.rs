// tests/end_to_end.rs

use pretty_assertions::assert_eq;
use ssc_gen::ast::{Expr, Hook, TypeShape};
use ssc_gen::error::CheckErrorKind;
use ssc_gen::{
    AssembleError, BuildOptions, D, Literal, ModuleProgram, VariableType, parse_module, to_json,
};

fn build(source: &str) -> ModuleProgram {
    let module = parse_module(source).unwrap_or_else(|e| panic!("parse failed: {}", e));
    match module.assemble(&BuildOptions::default()) {
        Ok(assembled) => assembled.program,
        Err(e) => panic!("assemble failed: {}", e),
    }
}

fn build_err(source: &str) -> AssembleError {
    let module = parse_module(source).unwrap_or_else(|e| panic!("parse failed: {}", e));
    match module.assemble(&BuildOptions::default()) {
        Ok(_) => panic!("expected assembly to fail"),
        Err(e) => e,
    }
}

fn check_kinds(err: &AssembleError) -> Vec<CheckErrorKind> {
    match err {
        AssembleError::Check(failure) => failure.kinds(),
        other => panic!("expected check failure, got {:?}", other),
    }
}

fn kinds(body: &[ssc_gen::ast::Expression]) -> Vec<&'static str> {
    body.iter().map(|e| e.name()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_item_with_one_field() {
    let program = build(
        r#"
        schema Main: item {
            title = D().css('title').text()
        }
        "#,
    );

    let main = program.find_struct("Main").unwrap();
    let title = main.field("title").unwrap();
    assert_eq!(kinds(&title.body), ["CSS", "TEXT", "RETURN"]);
    assert_eq!(title.body[0].expr, Expr::Css { query: "title".to_string() });

    let nums: Vec<_> = title.body.iter().map(|e| e.variable.map(|v| v.num)).collect();
    assert_eq!(nums, [Some(0), Some(1), Some(1)]);

    let typedef = program.find_typedef("Main").unwrap();
    let fields: Vec<_> = typedef.fields().iter().map(|f| (f.name.as_str(), f.ret_type)).collect();
    assert_eq!(fields, [("title", VariableType::String)]);
}

#[test]
fn test_field_with_default_and_regex() {
    let program = build(
        r#"
        schema Main: item {
            price = D().default(0).css('.price').text().re(r'(\d+)').to_int()
        }
        "#,
    );

    let price = program.find_struct("Main").unwrap().field("price").unwrap();
    assert_eq!(price.default.as_ref().map(|d| &d.value), Some(&Literal::Int(0)));
    assert_eq!(kinds(&price.body), ["CSS", "TEXT", "REGEX", "TO_INT", "RETURN"]);
    assert_eq!(
        price.body[2].expr,
        Expr::Regex {
            pattern: r"(\d+)".to_string(),
            group: 1,
            ignore_case: false,
            dotall: false,
        }
    );

    let field = program.find_typedef("Main").unwrap().field("price").unwrap();
    assert_eq!(field.ret_type, VariableType::Int);
    assert!(!field.nullable);
}

#[test]
fn test_list_with_split_doc() {
    let program = build(
        r#"
        schema Books: list {
            __SPLIT_DOC__ = D().css_all('.card')
            name = D().css('h2').text()
        }
        "#,
    );

    let books = program.find_struct("Books").unwrap();
    assert_eq!(books.struct_type, ssc_gen::StructType::List);

    let split = books.hook(Hook::SplitDoc).unwrap();
    assert_eq!(kinds(&split.body), ["CSS_ALL", "RETURN"]);
    assert_eq!(split.body[0].expr, Expr::CssAll { query: ".card".to_string() });
    assert_eq!(books.start_parse().unwrap().calls(), ["__SPLIT_DOC__", "name"]);

    match &program.find_typedef("Books").unwrap().shape {
        TypeShape::Record { fields } => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].name, "name");
            assert_eq!(fields[0].ret_type, VariableType::String);
        }
        other => panic!("expected record shape, got {:?}", other),
    }
}

#[test]
fn test_dict_key_must_be_string() {
    let err = build_err(
        r#"
        schema Links: dict {
            __SPLIT_DOC__ = D().css_all('li')
            __KEY__ = D().css_all('p').text()
            __VALUE__ = D().css('a::attr(href)')
        }
        "#,
    );
    assert_eq!(check_kinds(&err), [CheckErrorKind::HookReturnType]);

    let AssembleError::Check(failure) = err else {
        unreachable!()
    };
    assert_eq!(failure.errors[0].field.as_deref(), Some("__KEY__"));
    assert_eq!(failure.errors[0].actual.as_deref(), Some("LIST_STRING"));
}

#[test]
fn test_nested_reference_cycle() {
    let err = build_err(
        r#"
        schema A: item {
            x = N().sub_parser(B)
        }
        schema B: item {
            y = N().sub_parser(A)
        }
        "#,
    );
    match err {
        AssembleError::CyclicNestedReference(path) => assert_eq!(path, ["A", "B", "A"]),
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_pseudo_selector_matches_explicit_form() {
    let test_cases = vec![
        (D().css("a::attr(href)").unwrap(), D().css("a").unwrap().attr("href").unwrap()),
        (D().css("p::text").unwrap(), D().css("p").unwrap().text().unwrap()),
        (D().css_all("li::text").unwrap(), D().css_all("li").unwrap().text().unwrap()),
        (D().xpath("//a/@href").unwrap(), D().xpath("//a").unwrap().attr("href").unwrap()),
    ];
    for (pseudo, explicit) in test_cases {
        assert_eq!(pseudo.chain(), explicit.chain(), "Failed for input: {:?}", pseudo.chain().kinds());
    }
}

// ============================================================================
// Invariants
// ============================================================================

const CATALOGUE: &str = r#"
"Shop catalogue"

json Offer {
    price: float
    currency: str | null
}

schema Books: list {
    __SPLIT_DOC__ = D().css_all('.book')
    name = D().css('h2::text').trim()
    tags = D().css_all('.tag::text').fmt('#{{}}')
    rating = D().default(null).css('.rating::attr(data-value)').to_float()
}

schema Main: item {
    "Landing page"
    __PRE_VALIDATE__ = D().is_css('main', msg='no main block')
    title = D().css('title::text').is_regex(r'\w+').rm_suffix(' | Shop')
    books = N().css('.shelf').sub_parser(Books)
    offer = D().css('script::text').jsonify(Offer)
    last_link = D().css_all('a::attr(href)').index(-1)
    footer = D().default('').css('footer').raw()
}
"#;

#[test]
fn test_adjacent_types_line_up() {
    let program = build(CATALOGUE);
    for parser in program.structs() {
        for field in parser.fields() {
            for pair in field.body.windows(2) {
                assert!(
                    pair[0].ret_type.accepts(pair[1].accept_type),
                    "Failed for {}.{}: {} -> {}",
                    parser.name,
                    field.name,
                    pair[0].name(),
                    pair[1].name()
                );
            }
        }
    }
}

#[test]
fn test_default_must_fit_terminal_type() {
    let err = build_err(
        r#"
        schema Main: item {
            count = D().default('none').css('.count::text').to_int()
        }
        "#,
    );
    assert_eq!(check_kinds(&err), [CheckErrorKind::DefaultTypeMismatch]);

    let program = build(CATALOGUE);
    let footer = program.find_struct("Main").unwrap().field("footer").unwrap();
    assert_eq!(footer.default.as_ref().map(|d| &d.value), Some(&Literal::Str(String::new())));
    assert_eq!(footer.ret_type, VariableType::String);
}

#[test]
fn test_required_hooks_enforced() {
    let test_cases = vec![
        "schema A: list { name = D().css('a::text') }",
        "schema A: dict { __SPLIT_DOC__ = D().css_all('a')\n __VALUE__ = D().text() }",
        "schema A: flat_list { __SPLIT_DOC__ = D().css_all('a') }",
    ];
    for source in test_cases {
        let err = build_err(source);
        assert_eq!(
            check_kinds(&err),
            [CheckErrorKind::HookMissing],
            "Failed for input: {}",
            source
        );
    }
}

#[test]
fn test_field_order_follows_declaration() {
    let program = build(CATALOGUE);
    assert_eq!(
        program.find_struct("Main").unwrap().field_names(),
        ["title", "books", "offer", "last_link", "footer"]
    );
    assert_eq!(
        program.find_struct("Books").unwrap().field_names(),
        ["name", "tags", "rating"]
    );
}

#[test]
fn test_structs_in_dependency_order() {
    let program = build(CATALOGUE);
    assert_eq!(program.struct_names(), ["Books", "Main"]);
    assert!(program.json_structs().any(|s| s.name == "Offer"));
}

#[test]
fn test_negative_index_kept_in_ir() {
    let program = build(CATALOGUE);
    let field = program.find_struct("Main").unwrap().field("last_link").unwrap();
    assert_eq!(kinds(&field.body), ["CSS_ALL", "ATTR_ALL", "INDEX", "RETURN"]);
    assert_eq!(field.body[2].expr, Expr::Index { index: -1 });
    assert_eq!(field.ret_type, VariableType::String);
}

#[test]
fn test_format_arity_follows_cursor() {
    let on_list = D().css_all("a::attr(href)").unwrap().fmt("https://x{{}}").unwrap();
    let on_string = D().css("a::attr(href)").unwrap().fmt("https://x{{}}").unwrap();

    let list_fmt = on_list.chain().exprs().last().unwrap();
    assert_eq!(list_fmt.name(), "FORMAT");
    assert_eq!((list_fmt.accept_type, list_fmt.ret_type), (VariableType::ListString, VariableType::ListString));

    let str_fmt = on_string.chain().exprs().last().unwrap();
    assert_eq!((str_fmt.accept_type, str_fmt.ret_type), (VariableType::String, VariableType::String));
}

#[test]
fn test_assertions_keep_cursor() {
    let base = D().css_all("li::text").unwrap();
    let before = base.cursor();
    let asserted = base
        .any_is_re(r"\d", false, "")
        .unwrap()
        .is_contains("new", "missing")
        .unwrap();
    assert_eq!(asserted.cursor(), before);

    for expr in asserted.chain().iter().skip(2) {
        assert_eq!(expr.accept_type, expr.ret_type, "Failed for input: {}", expr.name());
        assert_eq!(expr.ret_type, before);
    }

    let program = build(CATALOGUE);
    let title = program.find_struct("Main").unwrap().field("title").unwrap();
    assert_eq!(kinds(&title.body), ["CSS", "TEXT", "IS_REGEX", "RM_SUFFIX", "RETURN"]);
    assert_eq!(title.body[2].accept_type, title.body[2].ret_type);
    assert!(title.body.iter().all(|e| e.variable.map(|v| v.count) == Some(4)));
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_program_serializes_with_kind_tags() {
    let program = build(CATALOGUE);
    let json = to_json(&program).unwrap();

    let fragments = vec![
        r#"{"body":[{"kind":"DOCSTRING","value":"Shop catalogue"}"#,
        r#""kind":"FIELD_FUNCTION","name":"title""#,
        r#""kind":"CSS","query":"title""#,
        r#""kind":"START_PARSE_FUNCTION""#,
    ];
    for fragment in fragments {
        assert!(json.contains(fragment), "Failed for fragment: {}", fragment);
    }
}

#[cfg(feature = "cli")]
mod command_line {
    use super::CATALOGUE;
    use pretty_assertions::assert_eq;
    use ssc_gen::cli::{
        AstOptions, CliError, JsonSchemaOptions, execute_ast, execute_check, execute_json_schema,
    };

    #[test]
    fn test_check_lists_schemas() {
        let report = execute_check(CATALOGUE).unwrap();
        assert_eq!(report.schemas, ["Books", "Main"]);
        assert_eq!(report.json_schemas, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_check_reports_failures() {
        let err = execute_check("schema A: list { name = D().css('a::text') }").unwrap_err();
        assert!(matches!(err, CliError::Assemble(_)), "{:?}", err);
        assert!(err.to_string().contains("HookMissing"));
    }

    #[test]
    fn test_ast_pretty_and_compact() {
        let compact = AstOptions {
            source: CATALOGUE.to_string(),
            ..Default::default()
        };
        let (json, _) = execute_ast(&compact).unwrap();
        assert!(!json.contains('\n'));

        let pretty = AstOptions {
            pretty: true,
            ..compact
        };
        let (json, _) = execute_ast(&pretty).unwrap();
        assert!(json.starts_with("{\n  \"body\": ["));
    }

    #[test]
    fn test_json_schema_requires_input() {
        let err = execute_json_schema(&JsonSchemaOptions::default()).unwrap_err();
        assert!(matches!(err, CliError::NoInput));

        let rendered = execute_json_schema(&JsonSchemaOptions {
            input: Some(r#"{"id": 1}"#.to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(rendered, "json Main {\n    id: int\n}");
    }
}
