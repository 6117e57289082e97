use super::{Emitter, precedence, require, unsupported};
use crate::GenerateError;
use fuse_ast::{Node, NodeKind, Value};
use std::fmt::Write as _;

type Result<T = ()> = std::result::Result<T, GenerateError>;

/// Binding precedence of an expression node.
fn precedence_of(node: &Node) -> u8 {
    match &node.kind {
        NodeKind::SequenceExpression => precedence::SEQUENCE,
        NodeKind::YieldExpression => precedence::YIELD,
        NodeKind::AssignmentExpression | NodeKind::ArrowFunctionExpression => {
            precedence::ASSIGNMENT
        }
        NodeKind::ConditionalExpression => precedence::CONDITIONAL,
        NodeKind::BinaryExpression | NodeKind::LogicalExpression => {
            precedence::binary(node.str_field("operator").unwrap_or(""))
        }
        NodeKind::UnaryExpression | NodeKind::AwaitExpression => precedence::UNARY,
        NodeKind::UpdateExpression => precedence::UPDATE,
        NodeKind::NewExpression
        | NodeKind::CallExpression
        | NodeKind::OptionalCallExpression
        | NodeKind::MemberExpression
        | NodeKind::OptionalMemberExpression
        | NodeKind::TaggedTemplateExpression
        | NodeKind::ChainExpression
        | NodeKind::ImportExpression => precedence::CALL,
        kind if kind.is_transparent_wrapper() && *kind != NodeKind::ParenthesizedExpression => node
            .node("expression")
            .map_or(precedence::PRIMARY, precedence_of),
        _ => precedence::PRIMARY,
    }
}

/// The node whose first token starts the printed form of `node`.
fn leftmost(node: &Node) -> &Node {
    let next = match node.kind {
        NodeKind::MemberExpression | NodeKind::OptionalMemberExpression => node.node("object"),
        NodeKind::CallExpression | NodeKind::OptionalCallExpression => node.node("callee"),
        NodeKind::BinaryExpression
        | NodeKind::LogicalExpression
        | NodeKind::AssignmentExpression => node.node("left"),
        NodeKind::ConditionalExpression => node.node("test"),
        NodeKind::SequenceExpression => node.nodes("expressions").next(),
        NodeKind::TaggedTemplateExpression => node.node("tag"),
        NodeKind::UpdateExpression if !node.flag("prefix") => node.node("argument"),
        NodeKind::ChainExpression
        | NodeKind::TSAsExpression
        | NodeKind::TSNonNullExpression
        | NodeKind::TSSatisfiesExpression => node.node("expression"),
        _ => None,
    };
    next.map_or(node, leftmost)
}

fn contains_call_in_chain(node: &Node) -> bool {
    match node.kind {
        NodeKind::CallExpression | NodeKind::OptionalCallExpression => true,
        NodeKind::MemberExpression | NodeKind::OptionalMemberExpression => {
            node.node("object").is_some_and(contains_call_in_chain)
        }
        _ => false,
    }
}

fn is_logical(node: &Node, operators: &[&str]) -> bool {
    node.kind == NodeKind::LogicalExpression
        && node
            .str_field("operator")
            .is_some_and(|op| operators.contains(&op))
}

pub(crate) fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 || c == '\x7F' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }
    format!("{value}")
}

impl<'o> Emitter<'o> {
    /// Whether a statement-position expression must be parenthesized so it
    /// is not read as a block, function or class declaration.
    pub(super) fn starts_ambiguously(&self, expression: &Node) -> bool {
        matches!(
            leftmost(expression).kind,
            NodeKind::ObjectExpression | NodeKind::FunctionExpression | NodeKind::ClassExpression
        )
    }

    /// Whether an `export default` expression would be read as a function or
    /// class declaration.
    pub(super) fn starts_like_declaration(&self, expression: &Node) -> bool {
        matches!(
            leftmost(expression).kind,
            NodeKind::FunctionExpression | NodeKind::ClassExpression
        )
    }

    /// Emit `node`, parenthesized when it binds looser than `min_precedence`.
    pub(crate) fn emit_expression(&mut self, node: &Node, min_precedence: u8) -> Result {
        if node.kind.is_transparent_wrapper() && node.kind != NodeKind::ParenthesizedExpression {
            self.set_source_pos(node);
            return self.emit_expression(require(node, "expression")?, min_precedence);
        }
        if precedence_of(node) < min_precedence {
            self.set_source_pos(node);
            self.write("(");
            self.emit_expression_inner(node)?;
            self.write(")");
            return Ok(());
        }
        self.set_source_pos(node);
        self.emit_expression_inner(node)
    }

    fn emit_expression_inner(&mut self, node: &Node) -> Result {
        match node.kind {
            NodeKind::Identifier => {
                let name = node.name().ok_or_else(|| GenerateError::MissingField {
                    kind: "Identifier".to_string(),
                    field: "name",
                })?;
                self.write_identifier(name);
                Ok(())
            }
            NodeKind::PrivateIdentifier => {
                self.write("#");
                self.write(node.str_field("name").unwrap_or(""));
                Ok(())
            }
            NodeKind::Literal => self.emit_literal(node),
            NodeKind::ThisExpression => {
                self.write("this");
                Ok(())
            }
            NodeKind::Super => {
                self.write("super");
                Ok(())
            }
            NodeKind::ParenthesizedExpression => {
                self.write("(");
                self.emit_expression(require(node, "expression")?, precedence::SEQUENCE)?;
                self.write(")");
                Ok(())
            }
            NodeKind::ArrayExpression | NodeKind::ArrayPattern => self.emit_array(node),
            NodeKind::ObjectExpression | NodeKind::ObjectPattern => self.emit_object(node),
            NodeKind::SpreadElement | NodeKind::RestElement => {
                self.write("...");
                self.emit_expression(require(node, "argument")?, precedence::ASSIGNMENT)
            }
            NodeKind::AssignmentPattern => {
                self.emit_expression(require(node, "left")?, precedence::CALL)?;
                self.write_space();
                self.write("=");
                self.write_space();
                self.emit_expression(require(node, "right")?, precedence::ASSIGNMENT)
            }
            NodeKind::FunctionExpression => self.emit_function(node),
            NodeKind::ArrowFunctionExpression => self.emit_arrow(node),
            NodeKind::ClassExpression => self.emit_class(node),
            NodeKind::TemplateLiteral => self.emit_template(node),
            NodeKind::TaggedTemplateExpression => {
                self.emit_expression(require(node, "tag")?, precedence::CALL)?;
                self.emit_template(require(node, "quasi")?)
            }
            NodeKind::UnaryExpression => {
                let operator = node.str_field("operator").unwrap_or("");
                self.write(operator);
                self.emit_expression(require(node, "argument")?, precedence::UNARY)
            }
            NodeKind::UpdateExpression => {
                let operator = node.str_field("operator").unwrap_or("++");
                if node.flag("prefix") {
                    self.write(operator);
                    self.emit_expression(require(node, "argument")?, precedence::UNARY)
                } else {
                    self.emit_expression(require(node, "argument")?, precedence::CALL)?;
                    self.write(operator);
                    Ok(())
                }
            }
            NodeKind::AwaitExpression => {
                self.write("await");
                self.write(" ");
                self.emit_expression(require(node, "argument")?, precedence::UNARY)
            }
            NodeKind::YieldExpression => {
                self.write("yield");
                if node.flag("delegate") {
                    self.write("*");
                }
                if let Some(argument) = node.node("argument") {
                    self.write_space();
                    self.emit_expression(argument, precedence::ASSIGNMENT)?;
                }
                Ok(())
            }
            NodeKind::BinaryExpression | NodeKind::LogicalExpression => self.emit_binary(node),
            NodeKind::AssignmentExpression => {
                self.emit_expression(require(node, "left")?, precedence::CALL)?;
                self.write_space();
                self.write(node.str_field("operator").unwrap_or("="));
                self.write_space();
                self.emit_expression(require(node, "right")?, precedence::ASSIGNMENT)
            }
            NodeKind::ConditionalExpression => {
                self.emit_expression(require(node, "test")?, precedence::NULLISH)?;
                self.write_space();
                self.write("?");
                self.write_space();
                self.emit_expression(require(node, "consequent")?, precedence::ASSIGNMENT)?;
                self.write_space();
                self.write(":");
                self.write_space();
                self.emit_expression(require(node, "alternate")?, precedence::ASSIGNMENT)
            }
            NodeKind::SequenceExpression => {
                for (i, expression) in node.nodes("expressions").enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.write_space();
                    }
                    self.emit_expression(expression, precedence::ASSIGNMENT)?;
                }
                Ok(())
            }
            NodeKind::CallExpression | NodeKind::OptionalCallExpression => {
                self.emit_expression(require(node, "callee")?, precedence::CALL)?;
                if node.flag("optional") {
                    self.write("?.");
                }
                self.emit_arguments(node.list("arguments"))
            }
            NodeKind::NewExpression => {
                self.write("new ");
                let callee = require(node, "callee")?;
                if contains_call_in_chain(callee) {
                    self.write("(");
                    self.emit_expression(callee, precedence::SEQUENCE)?;
                    self.write(")");
                } else {
                    self.emit_expression(callee, precedence::CALL)?;
                }
                self.emit_arguments(node.list("arguments"))
            }
            NodeKind::MemberExpression | NodeKind::OptionalMemberExpression => {
                self.emit_member(node)
            }
            NodeKind::ChainExpression => {
                self.emit_expression(require(node, "expression")?, precedence::CALL)
            }
            NodeKind::ImportExpression => {
                self.write("import(");
                self.emit_expression(require(node, "source")?, precedence::ASSIGNMENT)?;
                self.write(")");
                Ok(())
            }
            NodeKind::MetaProperty => {
                self.emit_expression(require(node, "meta")?, precedence::PRIMARY)?;
                self.write(".");
                self.emit_expression(require(node, "property")?, precedence::PRIMARY)
            }
            _ => Err(unsupported(node)),
        }
    }

    fn emit_literal(&mut self, node: &Node) -> Result {
        if let Some(Value::Map(regex)) = node.get("regex") {
            let pattern = regex.get("pattern").and_then(Value::as_str).unwrap_or("");
            let flags = regex.get("flags").and_then(Value::as_str).unwrap_or("");
            self.write(&format!("/{pattern}/{flags}"));
            return Ok(());
        }
        if let Some(bigint) = node.str_field("bigint") {
            self.write(&format!("{bigint}n"));
            return Ok(());
        }
        if let Some(raw) = node.str_field("raw")
            && matches!(node.get("value"), Some(Value::String(_) | Value::Number(_)))
        {
            self.write(raw);
            return Ok(());
        }
        let text = match node.get("value") {
            Some(Value::String(value)) => quote_string(value),
            Some(Value::Number(value)) => format_number(*value),
            Some(Value::Bool(value)) => value.to_string(),
            _ => "null".to_string(),
        };
        self.write(&text);
        Ok(())
    }

    fn emit_binary(&mut self, node: &Node) -> Result {
        let operator = node.str_field("operator").unwrap_or("");
        let own = precedence::binary(operator);
        let left = require(node, "left")?;
        let right = require(node, "right")?;

        // `??` cannot be mixed with `||`/`&&` without parentheses
        let mixes_nullish = |child: &Node| {
            (operator == "??" && is_logical(child, &["||", "&&"]))
                || (operator != "??" && is_logical(child, &["??"]))
        };
        let (mut left_min, mut right_min) = if operator == "**" {
            (precedence::UPDATE, own)
        } else {
            (own, own + 1)
        };
        if mixes_nullish(left) {
            left_min = precedence::PRIMARY;
        }
        if mixes_nullish(right) {
            right_min = precedence::PRIMARY;
        }

        self.emit_expression(left, left_min)?;
        if operator.chars().all(char::is_alphabetic) {
            self.write(" ");
            self.write(operator);
            self.write(" ");
        } else {
            self.write_space();
            self.write(operator);
            self.write_space();
        }
        self.emit_expression(right, right_min)
    }

    fn emit_member(&mut self, node: &Node) -> Result {
        let object = require(node, "object")?;
        let number_object =
            object.kind == NodeKind::Literal && matches!(object.get("value"), Some(Value::Number(_)));
        if number_object {
            self.write("(");
            self.emit_expression(object, precedence::SEQUENCE)?;
            self.write(")");
        } else {
            self.emit_expression(object, precedence::CALL)?;
        }
        let optional = node.flag("optional");
        let property = require(node, "property")?;
        if node.flag("computed") {
            self.write(if optional { "?.[" } else { "[" });
            self.emit_expression(property, precedence::SEQUENCE)?;
            self.write("]");
        } else {
            self.write(if optional { "?." } else { "." });
            self.emit_expression(property, precedence::PRIMARY)?;
        }
        Ok(())
    }

    fn emit_arguments(&mut self, arguments: &[Value]) -> Result {
        self.write("(");
        for (i, argument) in arguments.iter().filter_map(Value::as_node).enumerate() {
            if i > 0 {
                self.write(",");
                self.write_space();
            }
            self.emit_expression(argument, precedence::ASSIGNMENT)?;
        }
        self.write(")");
        Ok(())
    }

    fn emit_array(&mut self, node: &Node) -> Result {
        let elements = node.list("elements");
        self.write("[");
        for (i, element) in elements.iter().enumerate() {
            if i > 0 {
                self.write(",");
                if !element.is_null() {
                    self.write_space();
                }
            }
            if let Some(element) = element.as_node() {
                self.emit_expression(element, precedence::ASSIGNMENT)?;
            }
        }
        if elements.last().is_some_and(Value::is_null) {
            self.write(",");
        }
        self.write("]");
        Ok(())
    }

    fn emit_property_key(&mut self, property: &Node) -> Result {
        let key = require(property, "key")?;
        if property.flag("computed") {
            self.write("[");
            self.emit_expression(key, precedence::ASSIGNMENT)?;
            self.write("]");
            Ok(())
        } else {
            self.emit_expression(key, precedence::PRIMARY)
        }
    }

    fn emit_object(&mut self, node: &Node) -> Result {
        let properties: Vec<&Node> = node.nodes("properties").collect();
        if properties.is_empty() {
            self.write("{}");
            return Ok(());
        }
        self.write("{");
        self.write_space();
        for (i, property) in properties.into_iter().enumerate() {
            if i > 0 {
                self.write(",");
                self.write_space();
            }
            self.set_source_pos(property);
            match property.kind {
                NodeKind::Property => self.emit_property(property)?,
                NodeKind::SpreadElement | NodeKind::RestElement => {
                    self.emit_expression(property, precedence::ASSIGNMENT)?
                }
                _ => return Err(unsupported(property)),
            }
        }
        self.write_space();
        self.write("}");
        Ok(())
    }

    fn emit_property(&mut self, property: &Node) -> Result {
        let value = require(property, "value")?;
        let kind = property.str_field("kind").unwrap_or("init");
        if kind == "get" || kind == "set" {
            self.write(kind);
            self.write(" ");
            self.emit_property_key(property)?;
            return self.emit_function_signature_and_body(value);
        }
        if property.flag("method") {
            self.emit_method_prefix(value);
            self.emit_property_key(property)?;
            return self.emit_function_signature_and_body(value);
        }
        if property.flag("shorthand") {
            return self.emit_expression(value, precedence::ASSIGNMENT);
        }
        self.emit_property_key(property)?;
        self.write(":");
        self.write_space();
        self.emit_expression(value, precedence::ASSIGNMENT)
    }

    fn emit_method_prefix(&mut self, function: &Node) {
        if function.flag("async") {
            self.write("async ");
        }
        if function.flag("generator") {
            self.write("*");
        }
    }

    fn emit_params(&mut self, function: &Node) -> Result {
        self.write("(");
        for (i, param) in function.nodes("params").enumerate() {
            if i > 0 {
                self.write(",");
                self.write_space();
            }
            self.emit_expression(param, precedence::ASSIGNMENT)?;
        }
        self.write(")");
        Ok(())
    }

    fn emit_function_signature_and_body(&mut self, function: &Node) -> Result {
        self.emit_params(function)?;
        self.write_space();
        self.emit_block(require(function, "body")?)
    }

    pub(super) fn emit_function(&mut self, node: &Node) -> Result {
        if node.flag("async") {
            self.write("async ");
        }
        self.write("function");
        if node.flag("generator") {
            self.write("*");
        }
        match node.node("id") {
            Some(id) => {
                self.write(" ");
                self.emit_expression(id, precedence::PRIMARY)?;
            }
            None => self.write_space(),
        }
        self.emit_function_signature_and_body(node)
    }

    fn emit_arrow(&mut self, node: &Node) -> Result {
        if node.flag("async") {
            self.write("async");
            self.write_space();
        }
        self.emit_params(node)?;
        self.write_space();
        self.write("=>");
        self.write_space();
        let body = require(node, "body")?;
        if body.kind == NodeKind::BlockStatement {
            self.emit_block(body)
        } else if leftmost(body).kind == NodeKind::ObjectExpression {
            self.write("(");
            self.emit_expression(body, precedence::SEQUENCE)?;
            self.write(")");
            Ok(())
        } else {
            self.emit_expression(body, precedence::ASSIGNMENT)
        }
    }

    fn emit_template(&mut self, node: &Node) -> Result {
        self.write("`");
        let expressions: Vec<&Node> = node.nodes("expressions").collect();
        for (i, quasi) in node.nodes("quasis").enumerate() {
            let raw = match quasi.get("value") {
                Some(Value::Map(value)) => value.get("raw").and_then(Value::as_str).unwrap_or(""),
                _ => "",
            };
            // Raw text is written as-is; it must not be separated or mapped
            self.writer.write(raw);
            if let Some(expression) = expressions.get(i) {
                self.write("${");
                self.emit_expression(expression, precedence::SEQUENCE)?;
                self.write("}");
            }
        }
        self.write("`");
        Ok(())
    }

    pub(super) fn emit_class(&mut self, node: &Node) -> Result {
        self.write("class");
        if let Some(id) = node.node("id") {
            self.write(" ");
            self.emit_expression(id, precedence::PRIMARY)?;
        }
        if let Some(super_class) = node.node("superClass") {
            self.write(" extends ");
            self.emit_expression(super_class, precedence::CALL)?;
        }
        self.write_space();
        let members: Vec<&Node> = node
            .node("body")
            .map(|body| body.nodes("body").collect())
            .unwrap_or_default();
        if members.is_empty() {
            self.write("{");
            self.write_space();
            self.write("}");
            return Ok(());
        }
        self.write("{");
        self.write_line();
        self.increase_indent();
        for (i, member) in members.into_iter().enumerate() {
            if i > 0 {
                self.write_line();
            }
            self.set_source_pos(member);
            self.emit_class_member(member)?;
        }
        self.decrease_indent();
        self.write_line();
        self.write("}");
        Ok(())
    }

    fn emit_class_member(&mut self, member: &Node) -> Result {
        if member.kind == NodeKind::StaticBlock {
            return self.emit_statement(member);
        }
        if member.flag("static") {
            self.write("static ");
        }
        match member.kind {
            NodeKind::MethodDefinition => {
                let value = require(member, "value")?;
                match member.str_field("kind").unwrap_or("method") {
                    kind @ ("get" | "set") => {
                        self.write(kind);
                        self.write(" ");
                    }
                    _ => self.emit_method_prefix(value),
                }
                self.emit_property_key(member)?;
                self.emit_function_signature_and_body(value)
            }
            NodeKind::PropertyDefinition => {
                self.emit_property_key(member)?;
                if let Some(value) = member.node("value") {
                    self.write_space();
                    self.write("=");
                    self.write_space();
                    self.emit_expression(value, precedence::ASSIGNMENT)?;
                }
                self.write(";");
                Ok(())
            }
            _ => Err(unsupported(member)),
        }
    }
}
