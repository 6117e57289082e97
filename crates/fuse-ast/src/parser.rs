//! Parser seam.
//!
//! The core never parses text itself. Any `Fn(&str, &ParseOptions) ->
//! Result<Node, ParseError>` is a [`Parser`], so in-process parsers, bridges
//! to external tools and test fixtures all plug in the same way.

use crate::node::Node;
use std::fmt;

/// Options handed to a parser for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Public path of the file, for error messages and `loc.source`.
    pub file_name: String,
    /// Accept JSX syntax.
    pub jsx: bool,
    /// Attach `loc` to nodes.
    pub locations: bool,
}

/// A parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the failure, when known.
    pub line: Option<u32>,
    /// 0-based column of the failure, when known.
    pub column: Option<u32>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{} ({}:{})", self.message, line, column),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Turns source text into a tree.
pub trait Parser: Send + Sync {
    fn parse(&self, source: &str, options: &ParseOptions) -> Result<Node, ParseError>;
}

impl<F> Parser for F
where
    F: Fn(&str, &ParseOptions) -> Result<Node, ParseError> + Send + Sync,
{
    fn parse(&self, source: &str, options: &ParseOptions) -> Result<Node, ParseError> {
        self(source, options)
    }
}
