//! Code generation for the fuse bundler core.
//!
//! The core treats "tree to text + map" as a black-box service behind
//! [`CodeGenerator`]. [`Printer`] is the reference implementation for the
//! ESTree subset the transforms produce and commonly receive.

use fuse_ast::Node;
use fuse_common::SourceMap;
use std::fmt;

pub mod printer;
pub mod source_writer;

pub use printer::Printer;
pub use source_writer::{SourcePosition, SourceWriter};

/// Options for generating one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Suppress indentation and line breaks.
    pub compact: bool,
    /// Produce a source map alongside the text.
    pub source_map: bool,
    /// `file` entry of the produced map.
    pub file: Option<String>,
    /// Source name used for located nodes whose `loc.source` is absent.
    pub source_name: Option<String>,
}

/// Generated text and, when requested, its source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub map: Option<SourceMap>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The printer has no output form for this node kind (e.g. JSX that was
    /// never lowered).
    Unsupported { kind: String },
    /// A node is missing a field its kind requires.
    MissingField { kind: String, field: &'static str },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Unsupported { kind } => {
                write!(f, "cannot generate code for node type '{kind}'")
            }
            GenerateError::MissingField { kind, field } => {
                write!(f, "{kind} is missing required field '{field}'")
            }
        }
    }
}

impl std::error::Error for GenerateError {}

/// Turns a tree into text.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, tree: &Node, options: &GenerateOptions)
    -> Result<GeneratedCode, GenerateError>;
}
