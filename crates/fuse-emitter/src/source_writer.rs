//! Output buffer with position tracking and source map recording.

use fuse_common::{Mapping, OriginalPosition, SourceMap, SourceMapBuilder};

const INDENT: &str = "    ";

/// A position in an original source, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub source: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug)]
pub struct SourceWriter {
    output: String,
    line: u32,
    /// Column in UTF-16 code units, as source map consumers count them.
    column: u32,
    indent_level: u32,
    compact: bool,
    at_line_start: bool,
    source_map: Option<SourceMapBuilder>,
}

impl SourceWriter {
    pub fn new(compact: bool) -> Self {
        SourceWriter {
            output: String::new(),
            line: 0,
            column: 0,
            indent_level: 0,
            compact,
            at_line_start: true,
            source_map: None,
        }
    }

    pub fn enable_source_map(&mut self) {
        if self.source_map.is_none() {
            self.source_map = Some(SourceMapBuilder::new());
        }
    }

    pub fn has_source_map(&self) -> bool {
        self.source_map.is_some()
    }

    /// Register a source and return its index, or `None` without a map.
    pub fn add_source(&mut self, name: &str) -> Option<u32> {
        self.source_map
            .as_mut()
            .map(|builder| builder.add_source(name, None))
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn get_output(&self) -> &str {
        &self.output
    }

    fn write_indent_if_needed(&mut self) {
        if self.at_line_start {
            self.at_line_start = false;
            if !self.compact {
                for _ in 0..self.indent_level {
                    self.output.push_str(INDENT);
                }
                self.column += self.indent_level * INDENT.len() as u32;
            }
        }
    }

    /// Insert a space when `text` would otherwise fuse with the previous
    /// token (`return` `x`, `a +` `+b`, `/` `/re/`).
    fn separate_from(&mut self, text: &str) {
        let (Some(last), Some(first)) = (self.output.chars().next_back(), text.chars().next())
        else {
            return;
        };
        let fuses = (is_word_char(last) && is_word_char(first))
            || matches!((last, first), ('+', '+') | ('-', '-') | ('/', '/') | ('/', '*'));
        if fuses {
            self.output.push(' ');
            self.column += 1;
        }
    }

    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.write_indent_if_needed();
        self.separate_from(text);
        self.push_text(text);
    }

    fn push_text(&mut self, text: &str) {
        self.output.push_str(text);
        match memchr::memrchr(b'\n', text.as_bytes()) {
            Some(last_newline) => {
                self.line += memchr::memchr_iter(b'\n', text.as_bytes()).count() as u32;
                self.column = utf16_len(&text[last_newline + 1..]);
            }
            None => self.column += utf16_len(text),
        }
    }

    /// Write text that starts at `pos` in the original source.
    pub fn write_node(&mut self, text: &str, pos: SourcePosition) {
        self.write_node_inner(text, pos, None);
    }

    /// Like [`write_node`](Self::write_node), also recording `name` as the
    /// original identifier.
    pub fn write_node_with_name(&mut self, text: &str, pos: SourcePosition, name: &str) {
        self.write_node_inner(text, pos, Some(name));
    }

    fn write_node_inner(&mut self, text: &str, pos: SourcePosition, name: Option<&str>) {
        if text.is_empty() {
            return;
        }
        self.write_indent_if_needed();
        self.separate_from(text);
        if let Some(builder) = self.source_map.as_mut() {
            let name = name.map(|n| builder.add_name(n));
            builder.add_mapping(Mapping {
                generated_line: self.line,
                generated_column: self.column,
                original: Some(OriginalPosition {
                    source: pos.source,
                    line: pos.line,
                    column: pos.column,
                    name,
                }),
            });
        }
        self.push_text(text);
    }

    /// Line break; nothing in compact mode.
    pub fn write_line(&mut self) {
        if self.compact {
            return;
        }
        self.output.push('\n');
        self.line += 1;
        self.column = 0;
        self.at_line_start = true;
    }

    /// Optional whitespace; nothing in compact mode.
    pub fn write_space(&mut self) {
        if !self.compact {
            self.write(" ");
        }
    }

    pub fn increase_indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn decrease_indent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn finish(self, file: Option<String>) -> (String, Option<SourceMap>) {
        let map = self.source_map.map(|builder| builder.build(file));
        (self.output, map)
    }
}

fn is_word_char(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphanumeric()
}

fn utf16_len(text: &str) -> u32 {
    if text.is_ascii() {
        text.len() as u32
    } else {
        text.chars().map(|c| c.len_utf16() as u32).sum()
    }
}
