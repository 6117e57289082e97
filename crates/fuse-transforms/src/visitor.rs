//! Visitor Engine
//!
//! One pre-order traversal runs every registered [`Transform`] on every
//! node. Per node a transform answers with a [`Rewrite`]:
//!
//! - `Keep`: leave the node (it may still have been edited in place);
//! - `Replace(node)`: substitute a new subtree. Later transforms see the
//!   replacement, and once all transforms ran the replacement is offered to
//!   the whole list again, so a rewrite producing another rewritable node is
//!   lowered too;
//! - `Remove`: drop the node. A node-holding field becomes `null`; a list
//!   entry is removed.
//!
//! Independently of its answer a transform may queue statements through
//! [`VisitScope::prepend`]. They are inserted into the nearest enclosing
//! statement list immediately before the statement being visited.
//!
//! Children are visited in field order after the node's own transforms ran,
//! so traversal continues into replacements.

use fuse_ast::{Node, Value};
use fuse_common::limits::{MAX_REWRITE_PASSES, MAX_VISIT_DEPTH};
use tracing::{debug, warn};

use crate::transform_context::TransformContext;

/// Edit directive returned by a transform for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    Keep,
    Replace(Node),
    Remove,
}

/// What a transform can reach while visiting one node.
pub struct VisitScope<'a> {
    ctx: &'a mut TransformContext,
    hoisted: &'a mut Vec<Node>,
}

impl<'a> VisitScope<'a> {
    pub fn new(ctx: &'a mut TransformContext, hoisted: &'a mut Vec<Node>) -> Self {
        VisitScope { ctx, hoisted }
    }

    pub fn context(&self) -> &TransformContext {
        self.ctx
    }

    pub fn context_mut(&mut self) -> &mut TransformContext {
        self.ctx
    }

    /// Fresh temporary name scoped to the enclosing statement.
    pub fn temp(&mut self) -> String {
        self.ctx.temp()
    }

    /// Queue statements to be inserted before the enclosing statement.
    pub fn prepend(&mut self, statements: impl IntoIterator<Item = Node>) {
        self.hoisted.extend(statements);
    }
}

/// A desugaring pass plugged into the engine.
pub trait Transform {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn visit(&mut self, node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite;
}

/// Counters reported after a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitSummary {
    pub visited: usize,
    pub replaced: usize,
    pub removed: usize,
    pub hoisted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Kept,
    Removed,
}

/// Run `transforms` over `tree` in one combined traversal.
pub fn visit_tree(
    tree: &mut Node,
    transforms: &mut [Box<dyn Transform>],
    ctx: &mut TransformContext,
) -> VisitSummary {
    let mut visitor = Visitor {
        transforms,
        ctx,
        frames: Vec::new(),
        depth: 0,
        summary: VisitSummary::default(),
    };
    visitor.visit_root(tree);
    debug!(
        module = %visitor.ctx.public_path,
        visited = visitor.summary.visited,
        replaced = visitor.summary.replaced,
        removed = visitor.summary.removed,
        hoisted = visitor.summary.hoisted,
        "transforms applied"
    );
    visitor.summary
}

struct Visitor<'v> {
    transforms: &'v mut [Box<dyn Transform>],
    ctx: &'v mut TransformContext,
    /// Pending hoisted statements, one frame per statement being visited.
    frames: Vec<Vec<Node>>,
    depth: u32,
    summary: VisitSummary,
}

impl<'v> Visitor<'v> {
    fn visit_root(&mut self, root: &mut Node) {
        self.frames.push(Vec::new());
        if self.apply_transforms(root) == Applied::Removed {
            warn!(kind = %root.kind, "ignoring removal of the root node");
        }
        self.visit_children(root);

        let hoisted = self.frames.pop().unwrap_or_default();
        if hoisted.is_empty() {
            return;
        }
        match root
            .kind
            .statement_list_field()
            .and_then(|field| root.list_mut(field))
        {
            Some(body) => {
                self.summary.hoisted += hoisted.len();
                body.splice(0..0, hoisted.into_iter().map(Value::from));
            }
            None => warn!(
                kind = %root.kind,
                dropped = hoisted.len(),
                "root has no statement list; hoisted statements dropped"
            ),
        }
    }

    fn current_frame(frames: &mut Vec<Vec<Node>>) -> &mut Vec<Node> {
        if frames.is_empty() {
            frames.push(Vec::new());
        }
        let last = frames.len() - 1;
        &mut frames[last]
    }

    /// Offer `node` to every transform, re-offering replacements.
    fn apply_transforms(&mut self, node: &mut Node) -> Applied {
        self.summary.visited += 1;
        let Visitor {
            transforms,
            ctx,
            frames,
            summary,
            ..
        } = self;
        let mut passes = 0;
        loop {
            let mut replaced = false;
            for transform in transforms.iter_mut() {
                let mut scope = VisitScope::new(ctx, Self::current_frame(frames));
                match transform.visit(node, &mut scope) {
                    Rewrite::Keep => {}
                    Rewrite::Replace(replacement) => {
                        *node = replacement;
                        replaced = true;
                        summary.replaced += 1;
                    }
                    Rewrite::Remove => {
                        summary.removed += 1;
                        return Applied::Removed;
                    }
                }
            }
            if !replaced {
                return Applied::Kept;
            }
            passes += 1;
            if passes >= MAX_REWRITE_PASSES {
                warn!(
                    kind = %node.kind,
                    passes,
                    "replacement keeps being rewritten; leaving it as-is"
                );
                return Applied::Kept;
            }
        }
    }

    fn visit_node(&mut self, node: &mut Node) -> Applied {
        if self.apply_transforms(node) == Applied::Removed {
            return Applied::Removed;
        }
        self.visit_children(node);
        Applied::Kept
    }

    fn visit_children(&mut self, node: &mut Node) {
        if self.depth >= MAX_VISIT_DEPTH {
            warn!(
                kind = %node.kind,
                depth = self.depth,
                "maximum visit depth reached; subtree left as-is"
            );
            return;
        }
        self.depth += 1;
        let statement_list = node.kind.statement_list_field();
        for index in 0..node.fields.len() {
            let Some((key, value)) = node.fields.get_index_mut(index) else {
                continue;
            };
            match value {
                Value::List(items) if statement_list == Some(key.as_str()) => {
                    self.visit_statement_list(items);
                }
                _ => self.visit_value(value),
            }
        }
        self.depth -= 1;
    }

    fn visit_value(&mut self, value: &mut Value) {
        match value {
            Value::Node(child) => {
                if self.visit_node(child) == Applied::Removed {
                    *value = Value::Null;
                }
            }
            Value::List(items) => {
                let mut index = 0;
                while index < items.len() {
                    let removed = match &mut items[index] {
                        Value::Node(child) => self.visit_node(child) == Applied::Removed,
                        other => {
                            self.visit_value(other);
                            false
                        }
                    };
                    if removed {
                        items.remove(index);
                    } else {
                        index += 1;
                    }
                }
            }
            Value::Map(map) => {
                for entry in map.values_mut() {
                    self.visit_value(entry);
                }
            }
            _ => {}
        }
    }

    /// Visit each statement with its own hoisting frame and temporary scope,
    /// splicing hoisted statements in before it.
    fn visit_statement_list(&mut self, items: &mut Vec<Value>) {
        let statements = std::mem::take(items);
        let mut result = Vec::with_capacity(statements.len());
        for item in statements {
            let Value::Node(mut statement) = item else {
                result.push(item);
                continue;
            };
            self.ctx.enter_statement();
            self.frames.push(Vec::new());
            let applied = self.visit_node(&mut statement);
            let hoisted = self.frames.pop().unwrap_or_default();
            self.ctx.exit_statement();

            self.summary.hoisted += hoisted.len();
            result.extend(hoisted.into_iter().map(Value::from));
            if applied == Applied::Kept {
                result.push(Value::Node(statement));
            }
        }
        *items = result;
    }
}
