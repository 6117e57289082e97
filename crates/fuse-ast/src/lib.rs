//! Syntax tree model for the fuse bundler core.
//!
//! Trees are ESTree-shaped: every node carries a discriminator ([`NodeKind`])
//! and an ordered set of named fields. Transforms pattern-match on the kind
//! and edit fields in place; field order defines visitation order.
//!
//! - [`node`]: `Node`, `Value`, `NodeKind`, source locations
//! - [`builders`]: constructors for the nodes transforms synthesize
//! - [`estree`]: conversion to and from ESTree JSON
//! - [`parser`]: the `Parser` seam parsers plug into

pub mod builders;
pub mod estree;
pub mod node;
pub mod parser;

pub use estree::{EstreeError, EstreeJsonParser};
pub use node::{Node, NodeKind, Position, SourceLocation, Value};
pub use parser::{ParseError, ParseOptions, Parser};
