//! Tests for ESTree JSON conversion.

use fuse_ast::{EstreeJsonParser, Node, NodeKind, ParseOptions, Parser, Value};
use serde_json::json;

fn member_fixture() -> serde_json::Value {
    json!({
        "type": "Program",
        "sourceType": "module",
        "body": [{
            "type": "ExpressionStatement",
            "expression": {
                "type": "MemberExpression",
                "object": { "type": "Identifier", "name": "a" },
                "property": { "type": "Identifier", "name": "b" },
                "computed": false,
                "optional": false,
                "loc": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 3 } }
            }
        }]
    })
}

#[test]
fn test_from_estree_builds_nodes_and_locations() {
    let tree = Node::from_estree(&member_fixture()).unwrap();
    assert_eq!(tree.kind, NodeKind::Program);
    assert_eq!(tree.str_field("sourceType"), Some("module"));

    let stmt = tree.nodes("body").next().unwrap();
    let member = stmt.node("expression").unwrap();
    assert_eq!(member.kind, NodeKind::MemberExpression);
    assert_eq!(member.node("object").and_then(Node::name), Some("a"));
    assert!(!member.flag("computed"));

    let loc = member.loc.as_ref().expect("loc should be lifted");
    assert_eq!(loc.start.line, 1);
    assert_eq!(loc.end.column, 3);
    assert!(
        !member.fields.contains_key("loc"),
        "loc must not remain a plain field"
    );
}

#[test]
fn test_round_trip_preserves_json() {
    let fixture = member_fixture();
    let tree = Node::from_estree(&fixture).unwrap();
    assert_eq!(tree.to_estree(), fixture);
}

#[test]
fn test_unknown_kinds_and_plain_objects_round_trip() {
    let fixture = json!({
        "type": "Literal",
        "value": null,
        "raw": "/ab+c/gi",
        "regex": { "pattern": "ab+c", "flags": "gi" },
        "extra": { "type": "DecoratorThing", "depth": 2.5 }
    });
    let node = Node::from_estree(&fixture).unwrap();
    assert!(matches!(node.get("regex"), Some(Value::Map(_))));
    let extra = node.node("extra").unwrap();
    assert_eq!(extra.kind, NodeKind::Other("DecoratorThing".to_string()));
    assert_eq!(extra.kind.as_str(), "DecoratorThing");
    assert_eq!(node.to_estree(), fixture);
}

#[test]
fn test_integral_numbers_serialize_without_fraction() {
    let node = fuse_ast::builders::number(42.0);
    assert_eq!(node.to_estree()["value"].to_string(), "42");
}

#[test]
fn test_root_must_be_a_node() {
    assert!(Node::from_estree(&json!([1, 2])).is_err());
    assert!(Node::from_estree(&json!({ "name": "x" })).is_err());
    assert!(Node::from_estree_str("{ not json").is_err());
}

#[test]
fn test_json_parser_strips_locations_unless_requested() {
    let text = member_fixture().to_string();
    let without = EstreeJsonParser
        .parse(
            &text,
            &ParseOptions {
                file_name: "src/a.js".to_string(),
                ..ParseOptions::default()
            },
        )
        .unwrap();
    let member = without.nodes("body").next().unwrap().node("expression").unwrap();
    assert!(member.loc.is_none());

    let with = EstreeJsonParser
        .parse(
            &text,
            &ParseOptions {
                file_name: "src/a.js".to_string(),
                locations: true,
                jsx: true,
            },
        )
        .unwrap();
    let member = with.nodes("body").next().unwrap().node("expression").unwrap();
    assert_eq!(
        member.loc.as_ref().and_then(|loc| loc.source.as_deref()),
        Some("src/a.js")
    );
}

#[test]
fn test_json_parser_error_names_file() {
    let err = EstreeJsonParser
        .parse(
            "[]",
            &ParseOptions {
                file_name: "src/broken.js".to_string(),
                ..ParseOptions::default()
            },
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("src/broken.js"), "{err}");
}
