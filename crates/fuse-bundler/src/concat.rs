//! Newline-joined text with a combined source map.
//!
//! Each part is an optional origin path, its text and an optional map. A
//! part's map is shifted down by the number of lines before it; a part with
//! an origin but no map maps each of its lines to the same line of the
//! origin. A combined map exists when any part carries a map or an origin.

use fuse_common::source_map::{Mapping, OriginalPosition, SourceMap, SourceMapBuilder};
use memchr::memchr_iter;
use tracing::warn;

#[derive(Debug, Clone)]
struct ConcatPart {
    origin: Option<String>,
    text: String,
    map: Option<SourceMap>,
}

/// Joined text and its map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConcatOutput {
    pub content: String,
    pub source_map: Option<SourceMap>,
}

#[derive(Debug, Clone)]
pub struct ConcatBuffer {
    separator: &'static str,
    file: Option<String>,
    parts: Vec<ConcatPart>,
}

impl Default for ConcatBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn line_count(text: &str) -> u32 {
    memchr_iter(b'\n', text.as_bytes()).count() as u32
}

impl ConcatBuffer {
    pub fn new() -> Self {
        ConcatBuffer {
            separator: "\n",
            file: None,
            parts: Vec::new(),
        }
    }

    /// `file` entry of the combined map.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn add(&mut self, origin: Option<&str>, text: impl Into<String>, map: Option<SourceMap>) {
        self.parts.push(ConcatPart {
            origin: origin.map(str::to_string),
            text: text.into(),
            map,
        });
    }

    /// Add a part whose map is JSON text. An unreadable map is dropped with a
    /// warning.
    pub fn add_with_json_map(&mut self, origin: Option<&str>, text: impl Into<String>, map: Option<&str>) {
        let map = map.and_then(|json| match SourceMap::from_json(json) {
            Ok(map) => Some(map),
            Err(err) => {
                warn!(origin = origin.unwrap_or(""), error = %err, "dropping unreadable source map");
                None
            }
        });
        self.add(origin, text, map);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn finish(self) -> ConcatOutput {
        let mut content = String::new();
        let mut builder = SourceMapBuilder::new();
        let mut has_map = false;
        let mut line_offset = 0u32;

        for (index, part) in self.parts.into_iter().enumerate() {
            if index > 0 {
                content.push_str(self.separator);
                line_offset += 1;
            }
            match (&part.map, &part.origin) {
                (Some(map), _) => {
                    has_map = true;
                    append_shifted(&mut builder, map, line_offset);
                }
                (None, Some(origin)) => {
                    has_map = true;
                    let source = builder.add_source(origin, Some(&part.text));
                    for line in 0..=line_count(&part.text) {
                        builder.add_mapping(Mapping {
                            generated_line: line_offset + line,
                            generated_column: 0,
                            original: Some(OriginalPosition {
                                source,
                                line,
                                column: 0,
                                name: None,
                            }),
                        });
                    }
                }
                (None, None) => {}
            }
            line_offset += line_count(&part.text);
            content.push_str(&part.text);
        }

        let source_map = has_map.then(|| builder.build(self.file));
        ConcatOutput {
            content,
            source_map,
        }
    }
}

/// Re-index `map`'s sources and names into `builder` and shift its
/// mappings down by `line_offset`.
fn append_shifted(builder: &mut SourceMapBuilder, map: &SourceMap, line_offset: u32) {
    let mappings = match map.decoded_mappings() {
        Ok(mappings) => mappings,
        Err(err) => {
            warn!(error = %err, "skipping part with malformed mappings");
            return;
        }
    };
    let contents = map.sources_content.as_deref().unwrap_or_default();
    let sources: Vec<u32> = map
        .sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let content = contents.get(index).and_then(|content| content.as_deref());
            builder.add_source(source, content)
        })
        .collect();
    let names: Vec<u32> = map.names.iter().map(|name| builder.add_name(name)).collect();

    for mapping in mappings {
        let original = match mapping.original {
            Some(original) => {
                let Some(&source) = sources.get(original.source as usize) else {
                    continue;
                };
                Some(OriginalPosition {
                    source,
                    line: original.line,
                    column: original.column,
                    name: original
                        .name
                        .and_then(|name| names.get(name as usize).copied()),
                })
            }
            None => None,
        };
        builder.add_mapping(Mapping {
            generated_line: mapping.generated_line + line_offset,
            generated_column: mapping.generated_column,
            original,
        });
    }
}
