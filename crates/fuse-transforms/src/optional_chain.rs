//! Optional chaining lowering.
//!
//! ```javascript
//! x?.y.z?.(1)
//! // becomes
//! var _1_1, _1_2, _1_3;
//! (_1_1 = x) == null ? void 0 : (_1_2 = (_1_3 = _1_1.y).z) == null ? void 0 : _1_2.call(_1_3, 1)
//! ```
//!
//! A chain is drilled from its outermost link down to the base, split into
//! segments at every `?.`, and rebuilt innermost first as nested guards.
//! Each guarded value is assigned to a temporary once; an optional call on a
//! property captures the property's object in a receiver temporary and is
//! issued through `.call` so `this` is preserved. Guards nest in the
//! "otherwise" branch, so a nullish link skips the whole tail.
//!
//! A parenthesized chain used as the callee of an ordinary call, as in
//! `(o?.f)()`, captures the final member's object the same way so the call
//! still sees `o` as `this`.
//!
//! ESTree `ChainExpression` is first normalized to the Babel shape
//! (`OptionalMemberExpression` / `OptionalCallExpression`).

use fuse_ast::{Node, NodeKind, Value, builders};
use fuse_common::limits::MAX_CHAIN_DEPTH;
use smallvec::SmallVec;
use tracing::warn;

use crate::visitor::{Rewrite, Transform, VisitScope};

#[derive(Debug, Default)]
pub struct OptionalChainTransform;

impl OptionalChainTransform {
    pub fn new() -> Self {
        OptionalChainTransform
    }
}

impl Transform for OptionalChainTransform {
    fn name(&self) -> &'static str {
        "optional-chaining"
    }

    fn visit(&mut self, node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
        match node.kind {
            NodeKind::ChainExpression => match node.take_node("expression") {
                Some(mut inner) => {
                    normalize_chain(&mut inner);
                    if inner.loc.is_none() {
                        inner.loc = node.loc.clone();
                    }
                    Rewrite::Replace(inner)
                }
                None => Rewrite::Keep,
            },
            NodeKind::OptionalMemberExpression | NodeKind::OptionalCallExpression => {
                if !is_well_formed(node) {
                    warn!(kind = %node.kind, "malformed optional chain left as-is");
                    return Rewrite::Keep;
                }
                let loc = node.loc.clone();
                let chain = std::mem::replace(node, builders::void_zero());
                let lowered = lower_chain(chain, Leaf::Value, scope);
                Rewrite::Replace(lowered.with_loc(loc))
            }
            NodeKind::UnaryExpression if node.str_field("operator") == Some("delete") => {
                lower_delete(node, scope)
            }
            NodeKind::CallExpression => lower_chain_callee(node, scope),
            _ => Rewrite::Keep,
        }
    }
}

// =============================================================================
// Chain steps
// =============================================================================

#[derive(Debug)]
enum StepKind {
    Member { property: Node, computed: bool },
    Call { arguments: Vec<Value> },
}

/// One member access or call extracted from a chain.
#[derive(Debug)]
struct Step {
    kind: StepKind,
    /// Reached through `?.`
    optional: bool,
}

impl Step {
    /// Apply this step to `target` as an ordinary member access or call.
    fn apply(self, target: Node) -> Node {
        match self.kind {
            StepKind::Member {
                property,
                computed: true,
            } => builders::computed_member(target, property),
            StepKind::Member { property, .. } => builders::member_expr(target, property, false),
            StepKind::Call { arguments } => builders::call_values(target, arguments),
        }
    }
}

/// Steps sharing one null check; all but the first are non-optional.
type Segment = SmallVec<[Step; 4]>;

/// What the innermost link of a chain turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf<'a> {
    /// The chain's value; short-circuits to `void 0`.
    Value,
    /// `delete` of the final member; short-circuits to `true`.
    Delete,
    /// The final member with its object assigned to the named receiver.
    Callee(&'a str),
}

impl Leaf<'_> {
    fn short_circuit(self) -> Node {
        match self {
            Leaf::Value | Leaf::Callee(_) => builders::void_zero(),
            Leaf::Delete => builders::boolean(true),
        }
    }

    fn finish(self, value: Node) -> Node {
        match self {
            Leaf::Value => value,
            Leaf::Delete => builders::unary("delete", value),
            Leaf::Callee(receiver) => match split_member(value) {
                Ok((object, property, computed)) => builders::member_expr(
                    builders::assign(builders::ident(receiver), object),
                    property,
                    computed,
                ),
                Err(value) => value,
            },
        }
    }
}

fn unwrap_transparent(node: &Node) -> &Node {
    let mut current = node;
    while current.kind.is_transparent_wrapper() {
        match current.node("expression") {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Every link down to the base has the fields drilling takes.
fn is_well_formed(node: &Node) -> bool {
    let mut current = node;
    for _ in 0..MAX_CHAIN_DEPTH {
        let next = match current.kind {
            NodeKind::OptionalMemberExpression => {
                if current.node("property").is_none() {
                    return false;
                }
                current.node("object")
            }
            NodeKind::OptionalCallExpression => current.node("callee"),
            ref kind if kind.is_transparent_wrapper() => current.node("expression"),
            _ => return true,
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

/// Split a chain into its base and steps in evaluation order.
fn drill(chain: Node) -> (Node, Vec<Step>) {
    let mut steps = Vec::new();
    let mut current = chain;
    for _ in 0..MAX_CHAIN_DEPTH {
        match current.kind {
            NodeKind::OptionalMemberExpression => {
                let optional = current.flag("optional");
                let computed = current.flag("computed");
                let (Some(object), Some(property)) =
                    (current.take_node("object"), current.take_node("property"))
                else {
                    break;
                };
                steps.push(Step {
                    kind: StepKind::Member { property, computed },
                    optional,
                });
                current = object;
            }
            NodeKind::OptionalCallExpression => {
                let optional = current.flag("optional");
                let arguments = match current.take("arguments") {
                    Value::List(arguments) => arguments,
                    _ => Vec::new(),
                };
                let Some(callee) = current.take_node("callee") else {
                    break;
                };
                steps.push(Step {
                    kind: StepKind::Call { arguments },
                    optional,
                });
                current = callee;
            }
            ref kind if kind.is_transparent_wrapper() => match current.take_node("expression") {
                Some(inner) => current = inner,
                None => break,
            },
            _ => break,
        }
    }
    if steps.len() as u32 >= MAX_CHAIN_DEPTH {
        warn!(depth = steps.len(), "optional chain exceeds the maximum depth");
    }
    steps.reverse();
    (current, steps)
}

/// Group steps into segments, each starting at a `?.` step. Steps before the
/// first `?.` are returned separately.
fn segment(steps: Vec<Step>) -> (Vec<Step>, Vec<Segment>) {
    let mut prefix = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();
    for step in steps {
        if step.optional {
            let mut segment = Segment::new();
            segment.push(step);
            segments.push(segment);
        } else if let Some(current) = segments.last_mut() {
            current.push(step);
        } else {
            prefix.push(step);
        }
    }
    (prefix, segments)
}

// =============================================================================
// Emission
// =============================================================================

fn lower_chain(chain: Node, leaf: Leaf<'_>, scope: &mut VisitScope<'_>) -> Node {
    lower_chain_with(chain, leaf, Vec::new(), scope)
}

/// Lower `chain`, declaring `temps` together with the chain's own.
fn lower_chain_with(
    chain: Node,
    leaf: Leaf<'_>,
    mut temps: Vec<String>,
    scope: &mut VisitScope<'_>,
) -> Node {
    let (base, steps) = drill(chain);
    let (prefix, segments) = segment(steps);
    let head = prefix.into_iter().fold(base, |target, step| step.apply(target));

    let lowered = emit_segments(head, segments, leaf, &mut temps, scope);
    if !temps.is_empty() {
        scope.prepend([builders::var_decl(temps)]);
    }
    lowered
}

fn new_temp(temps: &mut Vec<String>, scope: &mut VisitScope<'_>) -> String {
    let name = scope.temp();
    temps.push(name.clone());
    name
}

/// `value` split into `(object, property, computed)` when it is a plain
/// member access.
fn split_member(value: Node) -> Result<(Node, Node, bool), Node> {
    if value.kind != NodeKind::MemberExpression {
        return Err(value);
    }
    let computed = value.flag("computed");
    let mut value = value;
    match (value.take_node("object"), value.take_node("property")) {
        (Some(object), Some(property)) => Ok((object, property, computed)),
        (object, property) => {
            value.set("object", object);
            value.set("property", property);
            Err(value)
        }
    }
}

/// Build the guard for the first segment, nesting the rest in its
/// "otherwise" branch.
fn emit_segments(
    value: Node,
    segments: Vec<Segment>,
    leaf: Leaf<'_>,
    temps: &mut Vec<String>,
    scope: &mut VisitScope<'_>,
) -> Node {
    let mut segments = segments.into_iter();
    let Some(segment) = segments.next() else {
        return leaf.finish(value);
    };
    let mut steps = segment.into_iter();
    let Some(first) = steps.next() else {
        return leaf.finish(value);
    };

    let (subject, mut current) = match first.kind {
        StepKind::Member { .. } => {
            let temp = new_temp(temps, scope);
            let subject = builders::assign(builders::ident(&temp), value);
            (subject, first.apply(builders::ident(temp)))
        }
        StepKind::Call { arguments } => emit_optional_call(value, arguments, temps, scope),
    };
    for step in steps {
        current = step.apply(current);
    }

    let rest = emit_segments(current, segments.collect(), leaf, temps, scope);
    builders::conditional(
        builders::binary(subject, "==", builders::null()),
        leaf.short_circuit(),
        rest,
    )
}

/// `callee?.(args)`: the guarded subject and the call issued when it is not
/// nullish.
fn emit_optional_call(
    callee: Node,
    arguments: Vec<Value>,
    temps: &mut Vec<String>,
    scope: &mut VisitScope<'_>,
) -> (Node, Node) {
    let callee = strip_transparent(callee);
    let temp = new_temp(temps, scope);
    match split_member(callee) {
        Ok((object, property, computed)) => {
            let (target, receiver) = if object.kind == NodeKind::Super {
                (object, Node::new(NodeKind::ThisExpression))
            } else {
                let receiver = new_temp(temps, scope);
                let capture = builders::assign(builders::ident(&receiver), object);
                (capture, builders::ident(receiver))
            };
            let subject = builders::assign(
                builders::ident(&temp),
                builders::member_expr(target, property, computed),
            );
            let mut call_arguments = vec![Value::from(receiver)];
            call_arguments.extend(arguments);
            let call = builders::call_values(
                builders::member(builders::ident(temp), "call"),
                call_arguments,
            );
            (subject, call)
        }
        Err(callee) => {
            let subject = builders::assign(builders::ident(&temp), callee);
            (subject, builders::call_values(builders::ident(temp), arguments))
        }
    }
}

fn strip_transparent(node: Node) -> Node {
    let mut current = node;
    while current.kind.is_transparent_wrapper() {
        match current.take_node("expression") {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// `delete a?.b` short-circuits to `true` and deletes the final member.
fn lower_delete(node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
    let Some(argument) = node.node("argument") else {
        return Rewrite::Keep;
    };
    let target = unwrap_transparent(argument);
    let is_chain = match target.kind {
        NodeKind::ChainExpression => true,
        NodeKind::OptionalMemberExpression => is_well_formed(target),
        _ => false,
    };
    if !is_chain {
        return Rewrite::Keep;
    }
    let Some(argument) = node.take_node("argument") else {
        return Rewrite::Keep;
    };
    let mut chain = strip_transparent(argument);
    if chain.kind == NodeKind::ChainExpression {
        match chain.take_node("expression") {
            Some(mut inner) => {
                normalize_chain(&mut inner);
                chain = strip_transparent(inner);
            }
            None => return Rewrite::Keep,
        }
    }
    let lowered = if chain.kind == NodeKind::OptionalMemberExpression && is_well_formed(&chain) {
        lower_chain(chain, Leaf::Delete, scope)
    } else {
        builders::unary("delete", chain)
    };
    Rewrite::Replace(lowered.with_loc(node.loc.clone()))
}

/// `(a?.b)(args)`: an ordinary call on a parenthesized chain. Lowered to
/// `(guard ? void 0 : (_r = a).b).call(_r, args)`.
fn lower_chain_callee(node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
    let Some(callee) = node.node("callee") else {
        return Rewrite::Keep;
    };
    let target = unwrap_transparent(callee);
    let is_chain = match target.kind {
        NodeKind::ChainExpression => target
            .node("expression")
            .is_some_and(|inner| inner.kind == NodeKind::MemberExpression),
        NodeKind::OptionalMemberExpression => is_well_formed(target),
        _ => false,
    };
    if !is_chain {
        return Rewrite::Keep;
    }
    let Some(callee) = node.take_node("callee") else {
        return Rewrite::Keep;
    };
    let mut chain = strip_transparent(callee);
    if chain.kind == NodeKind::ChainExpression {
        match chain.take_node("expression") {
            Some(mut inner) => {
                normalize_chain(&mut inner);
                chain = strip_transparent(inner);
            }
            None => return Rewrite::Keep,
        }
    }
    if chain.kind != NodeKind::OptionalMemberExpression || !is_well_formed(&chain) {
        node.set("callee", chain);
        return Rewrite::Keep;
    }

    let receiver = scope.temp();
    let lowered = lower_chain_with(
        chain,
        Leaf::Callee(&receiver),
        vec![receiver.clone()],
        scope,
    );
    let mut arguments = vec![Value::from(builders::ident(receiver))];
    if let Value::List(rest) = node.take("arguments") {
        arguments.extend(rest);
    }
    let call = builders::call_values(builders::member(lowered, "call"), arguments);
    Rewrite::Replace(call.with_loc(node.loc.clone()))
}

// =============================================================================
// ChainExpression normalization
// =============================================================================

/// Number of member/call links from the top of the spine down to and
/// including the deepest `optional: true` link.
fn optional_spine_length(node: &Node) -> usize {
    let mut current = node;
    let mut links = 0;
    let mut deepest = 0;
    for _ in 0..MAX_CHAIN_DEPTH {
        let next = match current.kind {
            NodeKind::MemberExpression | NodeKind::OptionalMemberExpression => {
                links += 1;
                if current.flag("optional") {
                    deepest = links;
                }
                current.node("object")
            }
            NodeKind::CallExpression | NodeKind::OptionalCallExpression => {
                links += 1;
                if current.flag("optional") {
                    deepest = links;
                }
                current.node("callee")
            }
            ref kind if kind.is_transparent_wrapper() => current.node("expression"),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => break,
        }
    }
    deepest
}

/// Relabel the top `links` member/call links of an ESTree chain as Babel
/// optional nodes. Links below the deepest `?.` stay plain.
pub fn normalize_chain(node: &mut Node) {
    let mut remaining = optional_spine_length(node);
    let mut current = node;
    while remaining > 0 {
        let next_field = match current.kind {
            NodeKind::MemberExpression | NodeKind::OptionalMemberExpression => {
                current.kind = NodeKind::OptionalMemberExpression;
                let optional = current.flag("optional");
                current.set("optional", optional);
                remaining -= 1;
                "object"
            }
            NodeKind::CallExpression | NodeKind::OptionalCallExpression => {
                current.kind = NodeKind::OptionalCallExpression;
                let optional = current.flag("optional");
                current.set("optional", optional);
                remaining -= 1;
                "callee"
            }
            ref kind if kind.is_transparent_wrapper() => "expression",
            _ => break,
        };
        match current.node_mut(next_field) {
            Some(next) => current = next,
            None => break,
        }
    }
}
