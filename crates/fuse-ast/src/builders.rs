//! Constructors for synthesized nodes.
//!
//! Everything here produces plain ESTree shapes without locations. Callers
//! that lower a located node copy its `loc` onto the replacement.

use crate::node::{Node, NodeKind, Value};

pub fn ident(name: impl Into<String>) -> Node {
    Node::new(NodeKind::Identifier).with("name", Value::String(name.into()))
}

pub fn string(value: impl Into<String>) -> Node {
    Node::new(NodeKind::Literal).with("value", Value::String(value.into()))
}

pub fn number(value: f64) -> Node {
    Node::new(NodeKind::Literal).with("value", value)
}

pub fn boolean(value: bool) -> Node {
    Node::new(NodeKind::Literal).with("value", value)
}

pub fn null() -> Node {
    Node::new(NodeKind::Literal).with("value", Value::Null)
}

/// `void 0`
pub fn void_zero() -> Node {
    unary("void", number(0.0))
}

pub fn unary(operator: &str, argument: Node) -> Node {
    Node::new(NodeKind::UnaryExpression)
        .with("operator", operator)
        .with("prefix", true)
        .with("argument", argument)
}

/// `object.name`
pub fn member(object: Node, name: impl Into<String>) -> Node {
    member_expr(object, ident(name), false)
}

/// `object[property]`
pub fn computed_member(object: Node, property: Node) -> Node {
    member_expr(object, property, true)
}

pub fn member_expr(object: Node, property: Node, computed: bool) -> Node {
    Node::new(NodeKind::MemberExpression)
        .with("object", object)
        .with("property", property)
        .with("computed", computed)
        .with("optional", false)
}

pub fn call(callee: Node, arguments: Vec<Node>) -> Node {
    call_values(callee, arguments.into_iter().map(Value::from).collect())
}

/// Call whose argument list is passed through as-is (spread elements and
/// holes included).
pub fn call_values(callee: Node, arguments: Vec<Value>) -> Node {
    Node::new(NodeKind::CallExpression)
        .with("callee", callee)
        .with("arguments", Value::List(arguments))
        .with("optional", false)
}

/// `target = value`
pub fn assign(target: Node, value: Node) -> Node {
    Node::new(NodeKind::AssignmentExpression)
        .with("operator", "=")
        .with("left", target)
        .with("right", value)
}

pub fn binary(left: Node, operator: &str, right: Node) -> Node {
    Node::new(NodeKind::BinaryExpression)
        .with("left", left)
        .with("operator", operator)
        .with("right", right)
}

pub fn conditional(test: Node, consequent: Node, alternate: Node) -> Node {
    Node::new(NodeKind::ConditionalExpression)
        .with("test", test)
        .with("consequent", consequent)
        .with("alternate", alternate)
}

pub fn declarator(name: impl Into<String>, init: Option<Node>) -> Node {
    Node::new(NodeKind::VariableDeclarator)
        .with("id", ident(name))
        .with("init", init)
}

/// `var a, b, c;` without initializers.
pub fn var_decl<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Node {
    let declarations: Vec<Node> = names
        .into_iter()
        .map(|name| declarator(name, None))
        .collect();
    Node::new(NodeKind::VariableDeclaration)
        .with("declarations", declarations)
        .with("kind", "var")
}

pub fn expr_stmt(expression: Node) -> Node {
    Node::new(NodeKind::ExpressionStatement).with("expression", expression)
}

/// `key: value`, with a string-literal key when `key` is not a valid
/// identifier.
pub fn property(key: &str, value: Node) -> Node {
    let key_node = if is_identifier_name(key) {
        ident(key)
    } else {
        string(key)
    };
    property_with_key(key_node, value)
}

pub fn property_with_key(key: Node, value: Node) -> Node {
    Node::new(NodeKind::Property)
        .with("key", key)
        .with("value", value)
        .with("kind", "init")
        .with("computed", false)
        .with("method", false)
        .with("shorthand", false)
}

pub fn object(properties: Vec<Node>) -> Node {
    Node::new(NodeKind::ObjectExpression).with("properties", properties)
}

pub fn program(body: Vec<Node>, source_type: &str) -> Node {
    Node::new(NodeKind::Program)
        .with("body", body)
        .with("sourceType", source_type)
}

/// `export default "";`, the tree of a module with no content.
pub fn empty_module() -> Node {
    let export = Node::new(NodeKind::ExportDefaultDeclaration).with("declaration", string(""));
    program(vec![export], "module")
}

/// Whether `name` can be written as a bare identifier.
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '$' || first == '_' || first.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_quotes_non_identifier_keys() {
        let plain = property("title", null());
        assert_eq!(plain.node("key").and_then(Node::name), Some("title"));

        let dashed = property("data-id", null());
        let key = dashed.node("key").unwrap();
        assert_eq!(key.kind, NodeKind::Literal);
        assert_eq!(key.str_field("value"), Some("data-id"));
    }

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("_a1"));
        assert!(is_identifier_name("$"));
        assert!(!is_identifier_name("1a"));
        assert!(!is_identifier_name("aria-label"));
        assert!(!is_identifier_name("xlink:href"));
        assert!(!is_identifier_name(""));
    }

    #[test]
    fn test_empty_module_shape() {
        let tree = empty_module();
        assert_eq!(tree.kind, NodeKind::Program);
        let export = tree.nodes("body").next().unwrap();
        assert_eq!(export.kind, NodeKind::ExportDefaultDeclaration);
        assert_eq!(
            export.node("declaration").unwrap().str_field("value"),
            Some("")
        );
    }
}
