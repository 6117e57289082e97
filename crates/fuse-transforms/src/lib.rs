//! Desugaring passes for the fuse bundler core.
//!
//! - [`visitor`]: the single-traversal engine running every registered
//!   [`Transform`] on every node
//! - [`optional_chain`]: `a?.b` lowering to guarded temporaries
//! - [`jsx`]: JSX lowering to factory calls
//! - [`transform_context`]: per-module state (JSX factory, pragmas,
//!   temporaries)

pub mod jsx;
pub mod optional_chain;
pub mod transform_context;
pub mod visitor;

pub use jsx::JsxTransform;
pub use optional_chain::OptionalChainTransform;
pub use transform_context::{JsxPragmas, TransformContext, scan_jsx_pragmas};
pub use visitor::{Rewrite, Transform, VisitScope, VisitSummary, visit_tree};

use fuse_ast::Node;

/// Transform set for a module: optional chaining always, JSX unless the
/// module is plain `.ts`.
pub fn default_transforms(ctx: &TransformContext) -> Vec<Box<dyn Transform>> {
    let mut transforms: Vec<Box<dyn Transform>> = vec![Box::new(OptionalChainTransform::new())];
    if ctx.allows_jsx() {
        transforms.push(Box::new(JsxTransform::new()));
    }
    transforms
}

/// Run the default transform set over `tree`.
pub fn transform_module(tree: &mut Node, ctx: &mut TransformContext) -> VisitSummary {
    transform_module_with(tree, ctx, Vec::new())
}

/// Run the default transform set followed by `extra` in the same traversal.
pub fn transform_module_with(
    tree: &mut Node,
    ctx: &mut TransformContext,
    extra: Vec<Box<dyn Transform>>,
) -> VisitSummary {
    let mut transforms = default_transforms(ctx);
    transforms.extend(extra);
    visit_tree(tree, &mut transforms, ctx)
}
