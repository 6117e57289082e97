//! JSX lowering to factory calls.
//!
//! ```javascript
//! <div class="a" data-id={id} {...rest}>hi {name}</div>
//! // becomes
//! React.createElement("div", Object.assign({ class: "a", "data-id": id }, rest), "hi ", name)
//! ```
//!
//! Elements are rewritten one node at a time: the element becomes a call
//! whose arguments still hold the original children, and the engine then
//! descends into the call and lowers the children (text, containers, nested
//! elements) on their own visits.

use fuse_ast::{Node, NodeKind, Value, builders};
use tracing::trace;

use crate::transform_context::TransformContext;
use crate::visitor::{Rewrite, Transform, VisitScope};

/// Element constructor and fragment marker resolved for one module.
#[derive(Debug, Clone)]
struct Factory {
    element: Node,
    fragment: Node,
}

impl Factory {
    /// `@jsx` overrides the configured factory. The fragment marker comes
    /// from `@jsxFrag`, then from the pragma factory, then from the
    /// configured fragment factory, then from the configured factory.
    fn resolve(ctx: &TransformContext) -> Self {
        let pragma_factory = ctx.pragmas.factory.as_deref();
        let factory = pragma_factory.unwrap_or(ctx.jsx_factory.as_str());
        let fragment = match (&ctx.pragmas.fragment, pragma_factory, &ctx.jsx_fragment_factory) {
            (Some(fragment), _, _) => fragment.clone(),
            (None, Some(pragma), _) => default_fragment(pragma),
            (None, None, Some(configured)) => configured.clone(),
            (None, None, None) => default_fragment(&ctx.jsx_factory),
        };
        trace!(factory, fragment = %fragment, "resolved JSX factory");
        Factory {
            element: dotted_reference(factory),
            fragment: dotted_reference(&fragment),
        }
    }
}

/// `<first segment>.Fragment`
fn default_fragment(factory: &str) -> String {
    let first = factory.split('.').next().unwrap_or(factory);
    format!("{first}.Fragment")
}

/// `a.b.c` as a member chain.
fn dotted_reference(name: &str) -> Node {
    let mut segments = name.split('.').filter(|segment| !segment.is_empty());
    let first = segments.next().unwrap_or(name);
    segments.fold(reference(first), builders::member)
}

fn reference(name: &str) -> Node {
    if name == "this" {
        Node::new(NodeKind::ThisExpression)
    } else {
        builders::ident(name)
    }
}

#[derive(Debug, Default)]
pub struct JsxTransform {
    factory: Option<Factory>,
}

impl JsxTransform {
    pub fn new() -> Self {
        Self::default()
    }

    fn factory(&mut self, ctx: &TransformContext) -> &Factory {
        self.factory.get_or_insert_with(|| Factory::resolve(ctx))
    }

    fn lower_element(&mut self, node: &mut Node, ctx: &TransformContext) -> Node {
        let mut opening = node.take_node("openingElement").unwrap_or_else(|| {
            Node::new(NodeKind::JSXOpeningElement)
        });
        let tag = opening
            .take_node("name")
            .map(element_tag)
            .unwrap_or_else(builders::null);
        let props = match opening.take("attributes") {
            Value::List(attributes) => fold_props(attributes),
            _ => builders::null(),
        };
        let mut arguments = vec![Value::from(tag), Value::from(props)];
        arguments.extend(take_children(node));
        builders::call_values(self.factory(ctx).element.clone(), arguments)
    }

    fn lower_fragment(&mut self, node: &mut Node, ctx: &TransformContext) -> Node {
        let marker = self.factory(ctx).fragment.clone();
        let mut arguments = vec![Value::from(marker), Value::from(builders::null())];
        arguments.extend(take_children(node));
        builders::call_values(self.factory(ctx).element.clone(), arguments)
    }
}

impl Transform for JsxTransform {
    fn name(&self) -> &'static str {
        "jsx"
    }

    fn visit(&mut self, node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
        match node.kind {
            NodeKind::JSXElement => {
                let call = self.lower_element(node, scope.context());
                Rewrite::Replace(call.with_loc(node.loc.clone()))
            }
            NodeKind::JSXFragment => {
                let call = self.lower_fragment(node, scope.context());
                Rewrite::Replace(call.with_loc(node.loc.clone()))
            }
            NodeKind::JSXExpressionContainer => match node.take_node("expression") {
                Some(expression) if expression.kind == NodeKind::JSXEmptyExpression => {
                    Rewrite::Remove
                }
                Some(expression) => Rewrite::Replace(expression),
                None => Rewrite::Remove,
            },
            NodeKind::JSXSpreadChild => match node.take_node("expression") {
                Some(expression) => Rewrite::Replace(expression),
                None => Rewrite::Remove,
            },
            NodeKind::JSXText => {
                let text = node.str_field("value").unwrap_or_default();
                if text.contains('\n') && text.trim().is_empty() {
                    Rewrite::Remove
                } else {
                    Rewrite::Replace(builders::string(text).with_loc(node.loc.clone()))
                }
            }
            _ => Rewrite::Keep,
        }
    }
}

fn take_children(node: &mut Node) -> Vec<Value> {
    match node.take("children") {
        Value::List(children) => children,
        _ => Vec::new(),
    }
}

// =============================================================================
// Tags
// =============================================================================

fn jsx_name(node: &Node) -> &str {
    node.str_field("name").unwrap_or_default()
}

/// Intrinsic tags become strings, components become references. Any tag whose
/// first character is not uppercase is intrinsic, so `_x` and `$x` are too.
fn element_tag(name: Node) -> Node {
    match name.kind {
        NodeKind::JSXIdentifier => {
            let text = jsx_name(&name);
            if text.starts_with(|c: char| !c.is_uppercase()) && text != "this" {
                builders::string(text)
            } else {
                reference(text)
            }
        }
        NodeKind::JSXNamespacedName => builders::string(namespaced_name(&name)),
        NodeKind::JSXMemberExpression => member_tag(name),
        _ => name,
    }
}

fn member_tag(mut name: Node) -> Node {
    match name.kind {
        NodeKind::JSXMemberExpression => {
            let object = name
                .take_node("object")
                .map(member_tag)
                .unwrap_or_else(builders::null);
            let property = name
                .take_node("property")
                .map(|property| builders::ident(jsx_name(&property)))
                .unwrap_or_else(builders::null);
            builders::member_expr(object, property, false)
        }
        NodeKind::JSXIdentifier => reference(jsx_name(&name)),
        _ => name,
    }
}

fn namespaced_name(name: &Node) -> String {
    let namespace = name.node("namespace").map(jsx_name).unwrap_or_default();
    let local = name.node("name").map(jsx_name).unwrap_or_default();
    format!("{namespace}:{local}")
}

// =============================================================================
// Props
// =============================================================================

/// Fold attributes into a props expression: `null`, one object literal, or
/// `Object.assign(...)` over runs of plain attributes and spread arguments.
fn fold_props(attributes: Vec<Value>) -> Node {
    let mut arguments: Vec<Node> = Vec::new();
    let mut run: Vec<Node> = Vec::new();
    let mut has_spread = false;

    for (index, attribute) in attributes.into_iter().enumerate() {
        let Some(mut attribute) = attribute.into_node() else {
            continue;
        };
        match attribute.kind {
            NodeKind::JSXSpreadAttribute => {
                if index == 0 {
                    arguments.push(builders::object(Vec::new()));
                }
                if !run.is_empty() {
                    arguments.push(builders::object(std::mem::take(&mut run)));
                }
                if let Some(argument) = attribute.take_node("argument") {
                    arguments.push(argument);
                }
                has_spread = true;
            }
            NodeKind::JSXAttribute => run.push(attribute_property(attribute)),
            _ => run.push(attribute),
        }
    }

    if !has_spread {
        return if run.is_empty() {
            builders::null()
        } else {
            builders::object(run)
        };
    }
    if !run.is_empty() {
        arguments.push(builders::object(run));
    }
    builders::call(
        builders::member(builders::ident("Object"), "assign"),
        arguments,
    )
}

fn attribute_property(mut attribute: Node) -> Node {
    let value = match attribute.take_node("value") {
        None => builders::boolean(true),
        Some(mut container) if container.kind == NodeKind::JSXExpressionContainer => container
            .take_node("expression")
            .filter(|expression| expression.kind != NodeKind::JSXEmptyExpression)
            .unwrap_or_else(|| builders::boolean(true)),
        Some(mut literal) if literal.kind == NodeKind::Literal => {
            // Attribute strings have no escapes; the printer re-quotes them
            literal.fields.shift_remove("raw");
            literal
        }
        Some(other) => other,
    };
    let property = match attribute.take_node("name") {
        Some(name) if name.kind == NodeKind::JSXNamespacedName => {
            builders::property_with_key(builders::string(namespaced_name(&name)), value)
        }
        Some(name) => builders::property(jsx_name(&name), value),
        None => builders::property("", value),
    };
    property.with_loc(attribute.loc)
}
