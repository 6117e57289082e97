//! Precedence-aware ESTree printer.
//!
//! Expressions are printed with the minimum parentheses their context needs;
//! parentheses in the input tree (`ParenthesizedExpression`) are kept.
//! TypeScript type wrappers print their inner expression. JSX and kinds the
//! printer does not know are reported as [`GenerateError::Unsupported`].

mod expressions;
mod statements;

use crate::source_writer::{SourcePosition, SourceWriter};
use crate::{CodeGenerator, GenerateError, GenerateOptions, GeneratedCode};
use fuse_ast::{Node, NodeKind};
use rustc_hash::FxHashMap;

/// Reference [`CodeGenerator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer;

impl Printer {
    /// Print a node with default options and no source map.
    pub fn print_to_string(node: &Node) -> Result<String, GenerateError> {
        Printer
            .generate(node, &GenerateOptions::default())
            .map(|generated| generated.code)
    }
}

impl CodeGenerator for Printer {
    fn generate(
        &self,
        tree: &Node,
        options: &GenerateOptions,
    ) -> Result<GeneratedCode, GenerateError> {
        let mut emitter = Emitter::new(options);
        emitter.emit_root(tree)?;
        let (code, map) = emitter.writer.finish(options.file.clone());
        tracing::trace!(bytes = code.len(), mapped = map.is_some(), "generated module text");
        Ok(GeneratedCode { code, map })
    }
}

// =============================================================================
// Precedence
// =============================================================================

pub(crate) mod precedence {
    pub const SEQUENCE: u8 = 1;
    pub const YIELD: u8 = 2;
    pub const ASSIGNMENT: u8 = 3;
    pub const CONDITIONAL: u8 = 4;
    pub const NULLISH: u8 = 5;
    pub const LOGICAL_OR: u8 = 6;
    pub const LOGICAL_AND: u8 = 7;
    pub const BITWISE_OR: u8 = 8;
    pub const BITWISE_XOR: u8 = 9;
    pub const BITWISE_AND: u8 = 10;
    pub const EQUALITY: u8 = 11;
    pub const RELATIONAL: u8 = 12;
    pub const SHIFT: u8 = 13;
    pub const ADDITIVE: u8 = 14;
    pub const MULTIPLICATIVE: u8 = 15;
    pub const EXPONENT: u8 = 16;
    pub const UNARY: u8 = 17;
    pub const UPDATE: u8 = 18;
    pub const CALL: u8 = 19;
    pub const PRIMARY: u8 = 20;

    pub fn binary(operator: &str) -> u8 {
        match operator {
            "??" => NULLISH,
            "||" => LOGICAL_OR,
            "&&" => LOGICAL_AND,
            "|" => BITWISE_OR,
            "^" => BITWISE_XOR,
            "&" => BITWISE_AND,
            "==" | "!=" | "===" | "!==" => EQUALITY,
            "<" | ">" | "<=" | ">=" | "instanceof" | "in" => RELATIONAL,
            "<<" | ">>" | ">>>" => SHIFT,
            "+" | "-" => ADDITIVE,
            "*" | "/" | "%" => MULTIPLICATIVE,
            "**" => EXPONENT,
            _ => RELATIONAL,
        }
    }
}

// =============================================================================
// Emitter state
// =============================================================================

pub(crate) struct Emitter<'o> {
    pub(crate) writer: SourceWriter,
    options: &'o GenerateOptions,
    /// Source name -> index in the map being built
    sources: FxHashMap<String, u32>,
    pending_source_pos: Option<SourcePosition>,
}

impl<'o> Emitter<'o> {
    fn new(options: &'o GenerateOptions) -> Self {
        let mut writer = SourceWriter::new(options.compact);
        if options.source_map {
            writer.enable_source_map();
        }
        Emitter {
            writer,
            options,
            sources: FxHashMap::default(),
            pending_source_pos: None,
        }
    }

    fn emit_root(&mut self, node: &Node) -> Result<(), GenerateError> {
        if is_statement(&node.kind) || node.kind == NodeKind::Program {
            self.emit_statement(node)
        } else {
            self.emit_expression(node, precedence::SEQUENCE)
        }
    }

    // =========================================================================
    // Source positions
    // =========================================================================

    /// Remember where `node` starts so the next write is mapped to it.
    pub(super) fn set_source_pos(&mut self, node: &Node) {
        if !self.writer.has_source_map() {
            return;
        }
        let Some(loc) = &node.loc else {
            return;
        };
        let Some(name) = loc
            .source
            .clone()
            .or_else(|| self.options.source_name.clone())
        else {
            return;
        };
        let source = match self.sources.get(&name) {
            Some(&index) => index,
            None => {
                let Some(index) = self.writer.add_source(&name) else {
                    return;
                };
                self.sources.insert(name, index);
                index
            }
        };
        self.pending_source_pos = Some(SourcePosition {
            source,
            line: loc.start.line.saturating_sub(1),
            column: loc.start.column,
        });
    }

    fn take_pending_source_pos(&mut self) -> Option<SourcePosition> {
        self.pending_source_pos.take()
    }

    // =========================================================================
    // Output helpers
    // =========================================================================

    pub(super) fn write(&mut self, text: &str) {
        if let Some(pos) = self.take_pending_source_pos() {
            self.writer.write_node(text, pos);
        } else {
            self.writer.write(text);
        }
    }

    pub(super) fn write_identifier(&mut self, text: &str) {
        if let Some(pos) = self.take_pending_source_pos() {
            self.writer.write_node_with_name(text, pos, text);
        } else {
            self.writer.write(text);
        }
    }

    pub(super) fn write_line(&mut self) {
        self.writer.write_line();
    }

    pub(super) fn write_space(&mut self) {
        self.writer.write_space();
    }

    pub(super) fn increase_indent(&mut self) {
        self.writer.increase_indent();
    }

    pub(super) fn decrease_indent(&mut self) {
        self.writer.decrease_indent();
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn is_statement(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::ExpressionStatement
            | NodeKind::BlockStatement
            | NodeKind::StaticBlock
            | NodeKind::EmptyStatement
            | NodeKind::DebuggerStatement
            | NodeKind::ReturnStatement
            | NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::LabeledStatement
            | NodeKind::IfStatement
            | NodeKind::SwitchStatement
            | NodeKind::ThrowStatement
            | NodeKind::TryStatement
            | NodeKind::WhileStatement
            | NodeKind::DoWhileStatement
            | NodeKind::ForStatement
            | NodeKind::ForInStatement
            | NodeKind::ForOfStatement
            | NodeKind::FunctionDeclaration
            | NodeKind::VariableDeclaration
            | NodeKind::ClassDeclaration
            | NodeKind::ImportDeclaration
            | NodeKind::ExportNamedDeclaration
            | NodeKind::ExportDefaultDeclaration
            | NodeKind::ExportAllDeclaration
            | NodeKind::TSModuleDeclaration
    )
}

pub(crate) fn require<'n>(node: &'n Node, field: &'static str) -> Result<&'n Node, GenerateError> {
    node.node(field).ok_or_else(|| GenerateError::MissingField {
        kind: node.kind.as_str().to_string(),
        field,
    })
}

pub(crate) fn unsupported(node: &Node) -> GenerateError {
    GenerateError::Unsupported {
        kind: node.kind.as_str().to_string(),
    }
}
