use fuse_ast::{Node, ParseOptions};
use fuse_emitter::{CodeGenerator, GenerateOptions, Printer};
use fuse_test_support::parse_module;

fn parse_located(source: &str, file_name: &str) -> Node {
    let options = ParseOptions {
        file_name: file_name.to_string(),
        jsx: false,
        locations: true,
    };
    parse_module(source, &options).unwrap()
}

fn with_map(file: Option<&str>, source_name: Option<&str>) -> GenerateOptions {
    GenerateOptions {
        compact: false,
        source_map: true,
        file: file.map(str::to_string),
        source_name: source_name.map(str::to_string),
    }
}

#[test]
fn test_map_records_sources_names_and_file() {
    let tree = parse_located("var answer = 42;\nanswer;", "src/a.js");
    let generated = Printer.generate(&tree, &with_map(Some("a.js"), None)).unwrap();
    assert_eq!(generated.code, "var answer = 42;\nanswer;");

    let map = generated.map.unwrap();
    assert_eq!(map.version, 3);
    assert_eq!(map.file.as_deref(), Some("a.js"));
    assert_eq!(map.sources, vec!["src/a.js".to_string()]);
    assert_eq!(map.names, vec!["answer".to_string()]);
    assert!(map.sources_content.is_none());
}

#[test]
fn test_mappings_point_at_original_positions() {
    let tree = parse_located("var answer = 42;\nanswer;", "src/a.js");
    let map = Printer
        .generate(&tree, &with_map(None, None))
        .unwrap()
        .map
        .unwrap();
    let mappings = map.decoded_mappings().unwrap();

    let at = |line: u32, column: u32| {
        mappings
            .iter()
            .find(|m| m.generated_line == line && m.generated_column == column)
            .and_then(|m| m.original)
            .unwrap_or_else(|| panic!("no mapping at {line}:{column} in {mappings:?}"))
    };

    let var_keyword = at(0, 0);
    assert_eq!((var_keyword.line, var_keyword.column), (0, 0));

    let declared = at(0, 4);
    assert_eq!((declared.line, declared.column), (0, 4));
    assert_eq!(declared.name, Some(0));

    let literal = at(0, 13);
    assert_eq!((literal.line, literal.column), (0, 13));

    let reference = at(1, 0);
    assert_eq!((reference.line, reference.column), (1, 0));
    assert_eq!(reference.name, Some(0));
}

#[test]
fn test_generated_columns_follow_reindentation() {
    let tree = parse_located("function f() {\nreturn 1;\n}", "f.js");
    let generated = Printer.generate(&tree, &with_map(None, None)).unwrap();
    assert_eq!(generated.code, "function f() {\n    return 1;\n}");

    let mappings = generated.map.unwrap().decoded_mappings().unwrap();
    let ret = mappings
        .iter()
        .find(|m| m.generated_line == 1 && m.generated_column == 4)
        .and_then(|m| m.original)
        .unwrap();
    assert_eq!((ret.line, ret.column), (1, 0));
}

#[test]
fn test_source_name_fallback_for_unnamed_locations() {
    let tree = parse_located("x;", "");
    let map = Printer
        .generate(&tree, &with_map(None, Some("fallback.js")))
        .unwrap()
        .map
        .unwrap();
    assert_eq!(map.sources, vec!["fallback.js".to_string()]);
    assert!(!map.mappings.is_empty());
}

#[test]
fn test_unlocated_tree_produces_empty_map() {
    let tree = fuse_test_support::parse_program("x;");
    let map = Printer
        .generate(&tree, &with_map(None, Some("fallback.js")))
        .unwrap()
        .map
        .unwrap();
    assert!(map.sources.is_empty());
    assert_eq!(map.mappings, "");
}

#[test]
fn test_no_map_unless_requested() {
    let tree = parse_located("x;", "a.js");
    let generated = Printer.generate(&tree, &GenerateOptions::default()).unwrap();
    assert!(generated.map.is_none());
}

#[test]
fn test_map_serializes_to_camel_case_json() {
    let tree = parse_located("x;", "a.js");
    let map = Printer
        .generate(&tree, &with_map(Some("out.js"), None))
        .unwrap()
        .map
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&map.to_json()).unwrap();
    assert_eq!(json["version"], 3);
    assert_eq!(json["file"], "out.js");
    assert_eq!(json["sources"][0], "a.js");
    assert!(json.get("sourcesContent").is_none());
}
