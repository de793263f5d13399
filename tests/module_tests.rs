// tests/module_tests.rs

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use ssc_gen::ast::{ElementPredicate, Expr, Hook, ImportTag, ModuleNode, StructType};
use ssc_gen::config::BuildOptions;
use ssc_gen::document::{D, Document, FE, N};
use ssc_gen::error::{AssembleError, ConfigError};
use ssc_gen::json_struct::{JsonPrimitive, JsonSchema, JsonType};
use ssc_gen::module::{Assembled, Module};
use ssc_gen::schema::Schema;
use ssc_gen::value::Literal;

fn module(schemas: Vec<Schema>) -> Module {
    let mut module = Module::new();
    for schema in schemas {
        module.add_schema(schema).unwrap();
    }
    module
}

fn assemble(module: &Module) -> Assembled {
    module.assemble(&BuildOptions::default()).unwrap()
}

fn text(query: &str) -> Document {
    D().css(query).unwrap().text().unwrap()
}

fn books() -> Schema {
    Schema::new("Books", StructType::List)
        .hook(Hook::SplitDoc, D().css_all(".book").unwrap())
        .field("name", text("h2"))
}

fn node_kinds(module: &Assembled) -> Vec<&'static str> {
    module
        .program
        .body
        .iter()
        .map(|node| match node {
            ModuleNode::Docstring { .. } => "docstring",
            ModuleNode::Imports(_) => "imports",
            ModuleNode::JsonStruct(_) => "json",
            ModuleNode::TypeDef(_) => "typedef",
            ModuleNode::Struct(_) => "struct",
        })
        .collect()
}

// ============================================================================
// Body Layout
// ============================================================================

#[test]
fn test_body_order() {
    let mut m = module(vec![Schema::new("Main", StructType::Item).field(
        "meta",
        D().css("script::text").unwrap().jsonify("Meta", None).unwrap(),
    )])
    .with_docstring("Example page");
    m.add_json(JsonSchema::new("Meta").field("id", JsonType::primitive(JsonPrimitive::Number)))
        .unwrap();

    let assembled = assemble(&m);
    assert_eq!(
        node_kinds(&assembled),
        ["docstring", "imports", "json", "typedef", "struct"]
    );
    assert_eq!(assembled.program.docstring(), Some("Example page"));
}

#[test]
fn test_empty_module() {
    let assembled = assemble(&Module::new());
    assert_eq!(node_kinds(&assembled), ["imports"]);
    assert!(assembled.program.imports().unwrap().tags.is_empty());
}

#[test]
fn test_blank_docstring_omitted() {
    let m = module(vec![Schema::new("Main", StructType::Item).field("t", text("title"))])
        .with_docstring("   ");
    assert_eq!(assemble(&m).program.docstring(), None);
}

#[test]
fn test_dependencies_first_then_declaration_order() {
    let m = module(vec![
        Schema::new("Main", StructType::Item)
            .field("books", N().css(".shelf").unwrap().sub_parser("Books").unwrap())
            .field("title", text("title")),
        Schema::new("Footer", StructType::Item).field("copy", text("footer")),
        books(),
    ]);
    let assembled = assemble(&m);
    assert_eq!(assembled.program.struct_names(), ["Books", "Main", "Footer"]);

    let typedefs: Vec<&str> = assembled.program.typedefs().map(|t| t.name.as_str()).collect();
    assert_eq!(typedefs, ["Books", "Main", "Footer"]);
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_imports_follow_usage() {
    let plain = module(vec![Schema::new("Main", StructType::Item).field("t", text("title"))]);
    assert_eq!(
        assemble(&plain).program.imports().unwrap().tags,
        [ImportTag::Selector]
    );

    let with_regex = module(vec![Schema::new("Main", StructType::Item).field(
        "n",
        text("p").re(r"(\d+)").unwrap(),
    )]);
    assert_eq!(
        assemble(&with_regex).program.imports().unwrap().tags,
        [ImportTag::Regex, ImportTag::Selector]
    );
}

#[test]
fn test_filter_patterns_need_regex() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "links",
        D().css_all("a::attr(href)")
            .unwrap()
            .filter(ssc_gen::F().re("^https", false).unwrap())
            .unwrap(),
    )]);
    assert!(assemble(&m).program.imports().unwrap().contains(ImportTag::Regex));
}

#[test]
fn test_element_filter_patterns_need_regex() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "links",
        D().css_all("a")
            .unwrap()
            .filter(FE().attr_re("href", "^https", false).unwrap())
            .unwrap()
            .attr("href")
            .unwrap(),
    )]);
    assert!(assemble(&m).program.imports().unwrap().contains(ImportTag::Regex));
}

#[test]
fn test_dynamic_json_needs_json_import() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "data",
        text("script").jsonify_dynamic(Some("props")).unwrap(),
    )]);
    let program = assemble(&m).program;
    assert_eq!(
        program.imports().unwrap().tags,
        [ImportTag::Selector, ImportTag::Json]
    );
    assert_eq!(program.json_structs().count(), 0);
}

// ============================================================================
// Docstrings and Signatures
// ============================================================================

#[test]
fn test_item_signature() {
    let m = module(vec![
        Schema::new("Main", StructType::Item)
            .doc("Product page")
            .field("title", text("title"))
            .field(
                "price",
                D().default(Literal::Null).unwrap().css(".price::text").unwrap().to_int().unwrap(),
            ),
    ]);
    let assembled = assemble(&m);
    assert_eq!(
        assembled.program.find_struct("Main").unwrap().docstring,
        "Product page\n\n{\n  \"title\": \"String\",\n  \"price\": \"Int | null\"\n}"
    );
}

#[test]
fn test_nested_signatures_expand() {
    let m = module(vec![
        books(),
        Schema::new("Main", StructType::Item)
            .field("books", N().css(".shelf").unwrap().sub_parser("Books").unwrap()),
    ]);
    let assembled = assemble(&m);
    assert_eq!(
        assembled.program.find_struct("Main").unwrap().docstring,
        "{\n  \"books\": [\n    {\n      \"name\": \"String\"\n    },\n    \"...\"\n  ]\n}"
    );
}

#[test]
fn test_dict_and_flat_list_signatures() {
    let m = module(vec![
        Schema::new("Links", StructType::Dict)
            .hook(Hook::SplitDoc, D().css_all("a").unwrap())
            .hook(Hook::Key, D().text().unwrap())
            .hook(Hook::Value, D().attr("href").unwrap()),
        Schema::new("Sizes", StructType::FlatList)
            .hook(Hook::SplitDoc, D().css_all(".size").unwrap())
            .hook(Hook::Item, D().text().unwrap().to_int().unwrap()),
    ]);
    let program = assemble(&m).program;
    assert_eq!(
        program.find_struct("Links").unwrap().docstring,
        "{\n  \"<K>\": \"String\",\n  \"<KN>\": \"...\"\n}"
    );
    assert_eq!(
        program.find_struct("Sizes").unwrap().docstring,
        "[\n  \"Int\",\n  \"...\"\n]"
    );
}

#[test]
fn test_signature_override_and_exclusion() {
    let mut custom = IndexMap::new();
    custom.insert("title".to_string(), Literal::from("headline"));
    let m = module(vec![
        Schema::new("Custom", StructType::Item)
            .field("title", text("title"))
            .signature(Literal::Map(custom)),
        Schema::new("Trimmed", StructType::Item)
            .field("title", text("title"))
            .field("raw", D().css("body").unwrap().raw().unwrap())
            .exclude_signature(&["raw"]),
    ]);
    let program = assemble(&m).program;
    assert_eq!(
        program.find_struct("Custom").unwrap().docstring,
        "{\n  \"title\": \"headline\"\n}"
    );
    assert_eq!(
        program.find_struct("Trimmed").unwrap().docstring,
        "{\n  \"title\": \"String\"\n}"
    );
}

#[test]
fn test_json_field_signature() {
    let mut m = module(vec![Schema::new("Main", StructType::Item).field(
        "meta",
        D().css("script::text").unwrap().jsonify("Meta", None).unwrap(),
    )]);
    m.add_json(
        JsonSchema::new("Meta")
            .field("id", JsonType::primitive(JsonPrimitive::Number))
            .field("tags", JsonType::Array { item: JsonPrimitive::String })
            .field("note", JsonType::Optional { item: JsonPrimitive::String }),
    )
    .unwrap();
    assert_eq!(
        assemble(&m).program.find_struct("Main").unwrap().docstring,
        "{\n  \"meta\": {\n    \"id\": \"Int\",\n    \"tags\": \"Array<String>\",\n    \"note\": \"String | null\"\n  }\n}"
    );
}

#[test]
fn test_docstrings_disabled() {
    let m = module(vec![
        Schema::new("Main", StructType::Item).doc("Page").field("t", text("title")),
    ])
    .with_docstring("Module");
    let program = m
        .assemble(&BuildOptions::default().gen_docstring(false))
        .unwrap()
        .program;
    assert_eq!(program.docstring(), None);
    assert_eq!(program.find_struct("Main").unwrap().docstring, "");
}

// ============================================================================
// JSON Structs
// ============================================================================

#[test]
fn test_json_structs_dependencies_first() {
    let mut m = Module::new();
    m.add_json(
        JsonSchema::new("Page")
            .field("author", JsonType::Object { name: "Author".to_string() })
            .field("items", JsonType::ArrayObjects { name: "Item".to_string() }),
    )
    .unwrap()
    .add_json(JsonSchema::new("Item").field("id", JsonType::primitive(JsonPrimitive::Number)))
    .unwrap()
    .add_json(JsonSchema::new("Author").field("name", JsonType::primitive(JsonPrimitive::String)))
    .unwrap();

    let program = assemble(&m).program;
    let names: Vec<&str> = program.json_structs().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Author", "Item", "Page"]);
    assert!(program.imports().unwrap().contains(ImportTag::Json));
    assert!(!program.imports().unwrap().contains(ImportTag::Selector));
}

#[test]
fn test_unknown_json_reference() {
    let mut m = Module::new();
    m.add_json(JsonSchema::new("Page").field("author", JsonType::Object { name: "Author".to_string() }))
        .unwrap();
    assert_eq!(
        m.assemble(&BuildOptions::default()).unwrap_err(),
        AssembleError::UnknownJsonSchema {
            name: "Author".to_string(),
            referenced_by: "Page".to_string(),
        }
    );
}

// ============================================================================
// Reference Errors
// ============================================================================

#[test]
fn test_unknown_nested_schema() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "books",
        N().sub_parser("Books").unwrap(),
    )]);
    assert_eq!(
        m.assemble(&BuildOptions::default()).unwrap_err(),
        AssembleError::UnknownSchema {
            name: "Books".to_string(),
            referenced_by: "Main".to_string(),
        }
    );
}

#[test]
fn test_unknown_jsonify_schema() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "meta",
        D().css("script::text").unwrap().jsonify("Meta", None).unwrap(),
    )]);
    assert!(matches!(
        m.assemble(&BuildOptions::default()),
        Err(AssembleError::UnknownJsonSchema { .. })
    ));
}

#[test]
fn test_cyclic_nested_reference() {
    let m = module(vec![
        Schema::new("A", StructType::Item).field("b", N().sub_parser("B").unwrap()),
        Schema::new("B", StructType::Item).field("a", N().sub_parser("A").unwrap()),
    ]);
    assert_eq!(
        m.assemble(&BuildOptions::default()).unwrap_err(),
        AssembleError::CyclicNestedReference(vec!["A".into(), "B".into(), "A".into()])
    );
}

#[test]
fn test_duplicate_schema() {
    let mut m = Module::new();
    m.add_schema(Schema::new("Main", StructType::Item)).unwrap();
    assert_eq!(
        m.add_schema(Schema::new("Main", StructType::List)).unwrap_err(),
        AssembleError::DuplicateSchema("Main".to_string())
    );
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_conflicting_conversions() {
    let m = module(vec![Schema::new("Main", StructType::Item).field("t", text("title"))]);
    let options = BuildOptions::default().css_to_xpath(true).xpath_to_css(true);
    assert_eq!(
        m.assemble(&options).unwrap_err(),
        AssembleError::Options(ConfigError::ConflictingConversions)
    );
}

#[test]
fn test_css_to_xpath_option() {
    let m = module(vec![
        books(),
        Schema::new("Main", StructType::Item)
            .hook(Hook::PreValidate, D().is_css("title", "").unwrap())
            .field("title", text("title")),
    ]);
    let options = BuildOptions::default().css_to_xpath(true);
    let program = m.assemble(&options).unwrap().program;

    let main = program.find_struct("Main").unwrap();
    assert_eq!(
        main.field("title").unwrap().body[0].expr,
        Expr::Xpath {
            query: "descendant-or-self::title".to_string()
        }
    );
    assert!(matches!(
        main.hook(Hook::PreValidate).unwrap().body[0].expr,
        Expr::IsXpath { .. }
    ));
    let split = &program.find_struct("Books").unwrap().hook(Hook::SplitDoc).unwrap().body[0];
    assert_eq!(split.name(), "XPATH_ALL");
}

#[test]
fn test_custom_xpath_prefix() {
    let m = module(vec![Schema::new("Main", StructType::Item).field("t", text("title"))]);
    let options = BuildOptions::default().css_to_xpath(true).xpath_prefix("//");
    let program = m.assemble(&options).unwrap().program;
    assert_eq!(
        program.find_struct("Main").unwrap().field("t").unwrap().body[0].expr,
        Expr::Xpath {
            query: "//title".to_string()
        }
    );
}

#[test]
fn test_xpath_to_css_option() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "t",
        D().xpath("//div/h1/text()").unwrap(),
    )]);
    let options = BuildOptions::default().xpath_to_css(true);
    let program = m.assemble(&options).unwrap().program;
    let body = &program.find_struct("Main").unwrap().field("t").unwrap().body;
    assert_eq!(
        body[0].expr,
        Expr::Css {
            query: "div > h1".to_string()
        }
    );
    assert_eq!(body[1].name(), "TEXT");
}

#[test]
fn test_element_filter_queries_converted() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "links",
        D().css_all("a")
            .unwrap()
            .filter(FE().css("img").unwrap().has_text(&["Buy"]))
            .unwrap()
            .attr("href")
            .unwrap(),
    )]);
    let options = BuildOptions::default().css_to_xpath(true);
    let program = m.assemble(&options).unwrap().program;
    let body = &program.find_struct("Main").unwrap().field("links").unwrap().body;
    assert_eq!(
        body[1].expr,
        Expr::DocumentFilter {
            predicate: ElementPredicate::Xpath {
                query: "descendant-or-self::img".into()
            }
            .and(ElementPredicate::HasText {
                values: vec!["Buy".into()]
            })
        }
    );
}

#[test]
fn test_unconvertible_query_kept() {
    let m = module(vec![Schema::new("Main", StructType::Item).field(
        "t",
        D().css("a:hover::text").unwrap(),
    )]);
    let options = BuildOptions::default().css_to_xpath(true);
    let program = m.assemble(&options).unwrap().program;
    assert_eq!(
        program.find_struct("Main").unwrap().field("t").unwrap().body[0].expr,
        Expr::Css {
            query: "a:hover".to_string()
        }
    );
}
