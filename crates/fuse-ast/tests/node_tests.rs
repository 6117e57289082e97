//! Tests for node field access and the parser seam.

use fuse_ast::builders::{call, ident, member, number, string};
use fuse_ast::{Node, NodeKind, ParseError, ParseOptions, Parser, Value};

#[test]
fn test_set_keeps_field_position() {
    let mut node = member(ident("a"), "b");
    let order: Vec<&str> = node.fields.keys().map(String::as_str).collect();
    assert_eq!(order, ["object", "property", "computed", "optional"]);

    node.set("object", ident("z"));
    let order: Vec<&str> = node.fields.keys().map(String::as_str).collect();
    assert_eq!(order[0], "object");
    assert_eq!(node.node("object").and_then(Node::name), Some("z"));
}

#[test]
fn test_take_leaves_null() {
    let mut node = call(ident("f"), vec![number(1.0), string("x")]);
    let callee = node.take_node("callee").unwrap();
    assert_eq!(callee.name(), Some("f"));
    assert!(node.get("callee").unwrap().is_null());
    assert!(node.take("missing").is_null());
    assert_eq!(node.nodes("arguments").count(), 2);
}

#[test]
fn test_kind_names_round_trip() {
    for name in [
        "OptionalMemberExpression",
        "JSXSpreadAttribute",
        "TSSatisfiesExpression",
        "StaticBlock",
    ] {
        let kind = NodeKind::from_name(name);
        assert!(!matches!(kind, NodeKind::Other(_)), "{name} should be known");
        assert_eq!(kind.as_str(), name);
    }
}

#[test]
fn test_kind_classification() {
    assert_eq!(NodeKind::Program.statement_list_field(), Some("body"));
    assert_eq!(NodeKind::SwitchCase.statement_list_field(), Some("consequent"));
    assert_eq!(NodeKind::IfStatement.statement_list_field(), None);
    assert!(NodeKind::TSNonNullExpression.is_transparent_wrapper());
    assert!(!NodeKind::ChainExpression.is_transparent_wrapper());
    assert!(NodeKind::JSXText.is_jsx());
    assert!(NodeKind::OptionalCallExpression.is_optional_chain());
}

#[test]
fn test_count_nodes() {
    let node = call(member(ident("a"), "b"), vec![number(1.0)]);
    // call, member, a, b, 1
    assert_eq!(node.count_nodes(), 5);
}

#[test]
fn test_closures_are_parsers() {
    let parser = |source: &str, options: &ParseOptions| -> Result<Node, ParseError> {
        if source.is_empty() {
            return Err(ParseError::new("unexpected end of input").at(1, 0));
        }
        Ok(Node::new(NodeKind::Program)
            .with("body", Value::List(Vec::new()))
            .with("sourceType", options.file_name.as_str()))
    };
    let options = ParseOptions {
        file_name: "a.js".to_string(),
        ..ParseOptions::default()
    };
    let tree = parser.parse("1", &options).unwrap();
    assert_eq!(tree.str_field("sourceType"), Some("a.js"));

    let err = Parser::parse(&parser, "", &options).unwrap_err();
    assert_eq!(err.to_string(), "unexpected end of input (1:0)");
}
