//! Source Map documents (revision 3).
//!
//! - [`vlq`]: Base64 VLQ codec used by the `mappings` field
//! - [`SourceMap`]: the serialized document
//! - [`Mapping`]: one decoded segment with absolute positions
//! - [`SourceMapBuilder`]: accumulates mappings while text is generated
//!
//! Positions are 0-based for both generated and original lines/columns.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod vlq {
    const BASE64_CHARS: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    const VLQ_BASE_SHIFT: u32 = 5;
    const VLQ_BASE_MASK: i64 = 0b11111;
    const VLQ_CONTINUATION_BIT: i64 = 0b100000;

    /// Encode a single value.
    pub fn encode(value: i64) -> String {
        let mut out = String::new();
        encode_into(value, &mut out);
        out
    }

    /// Encode a single value, appending to `out`.
    pub fn encode_into(value: i64, out: &mut String) {
        // Sign goes into the least significant bit
        let mut vlq = if value < 0 {
            ((-value) << 1) | 1
        } else {
            value << 1
        };
        loop {
            let mut digit = vlq & VLQ_BASE_MASK;
            vlq >>= VLQ_BASE_SHIFT;
            if vlq > 0 {
                digit |= VLQ_CONTINUATION_BIT;
            }
            out.push(BASE64_CHARS[digit as usize] as char);
            if vlq == 0 {
                break;
            }
        }
    }

    fn base64_digit(byte: u8) -> Option<i64> {
        let digit = match byte {
            b'A'..=b'Z' => byte - b'A',
            b'a'..=b'z' => byte - b'a' + 26,
            b'0'..=b'9' => byte - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            _ => return None,
        };
        Some(digit as i64)
    }

    /// Decode one value from the start of `input`.
    ///
    /// Returns the value and the number of bytes consumed, or `None` when the
    /// input is truncated or contains a non-base64 character.
    pub fn decode(input: &str) -> Option<(i64, usize)> {
        let mut result: i64 = 0;
        let mut shift = 0u32;
        for (i, byte) in input.bytes().enumerate() {
            let digit = base64_digit(byte)?;
            if shift > 60 {
                return None;
            }
            result |= (digit & VLQ_BASE_MASK) << shift;
            shift += VLQ_BASE_SHIFT;
            if digit & VLQ_CONTINUATION_BIT == 0 {
                let negative = result & 1 == 1;
                let value = result >> 1;
                return Some((if negative { -value } else { value }, i + 1));
            }
        }
        None
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapError {
    pub message: String,
}

impl SourceMapError {
    fn new(message: impl Into<String>) -> Self {
        SourceMapError {
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid source map: {}", self.message)
    }
}

impl std::error::Error for SourceMapError {}

// =============================================================================
// Decoded mappings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: u32,
    pub line: u32,
    pub column: u32,
    pub name: Option<u32>,
}

/// One mapping segment with absolute (not delta) positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    /// `None` for segments that map generated text to no source
    pub original: Option<OriginalPosition>,
}

/// Decode a `mappings` string into absolute segments.
pub fn decode_mappings(mappings: &str) -> Result<Vec<Mapping>, SourceMapError> {
    let mut decoded = Vec::new();
    let mut prev_source = 0i64;
    let mut prev_original_line = 0i64;
    let mut prev_original_column = 0i64;
    let mut prev_name = 0i64;

    for (generated_line, line) in mappings.split(';').enumerate() {
        let mut prev_generated_column = 0i64;
        for segment in line.split(',') {
            if segment.is_empty() {
                continue;
            }
            let mut fields = [0i64; 5];
            let mut count = 0;
            let mut rest = segment;
            while !rest.is_empty() {
                if count == fields.len() {
                    return Err(SourceMapError::new(format!(
                        "segment '{segment}' has more than 5 fields"
                    )));
                }
                let (value, consumed) = vlq::decode(rest).ok_or_else(|| {
                    SourceMapError::new(format!("malformed VLQ in segment '{segment}'"))
                })?;
                fields[count] = value;
                count += 1;
                rest = &rest[consumed..];
            }

            prev_generated_column += fields[0];
            let original = match count {
                1 => None,
                4 | 5 => {
                    prev_source += fields[1];
                    prev_original_line += fields[2];
                    prev_original_column += fields[3];
                    let name = if count == 5 {
                        prev_name += fields[4];
                        Some(prev_name as u32)
                    } else {
                        None
                    };
                    Some(OriginalPosition {
                        source: prev_source as u32,
                        line: prev_original_line as u32,
                        column: prev_original_column as u32,
                        name,
                    })
                }
                _ => {
                    return Err(SourceMapError::new(format!(
                        "segment '{segment}' has {count} fields"
                    )));
                }
            };
            decoded.push(Mapping {
                generated_line: generated_line as u32,
                generated_column: prev_generated_column as u32,
                original,
            });
        }
    }
    Ok(decoded)
}

/// Encode absolute segments, which must be sorted by generated position.
pub fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    let mut current_line = 0u32;
    let mut prev_generated_column = 0i64;
    let mut prev_source = 0i64;
    let mut prev_original_line = 0i64;
    let mut prev_original_column = 0i64;
    let mut prev_name = 0i64;
    let mut first_in_line = true;

    for mapping in mappings {
        while current_line < mapping.generated_line {
            out.push(';');
            current_line += 1;
            prev_generated_column = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        let column = mapping.generated_column as i64;
        vlq::encode_into(column - prev_generated_column, &mut out);
        prev_generated_column = column;

        if let Some(original) = mapping.original {
            vlq::encode_into(original.source as i64 - prev_source, &mut out);
            vlq::encode_into(original.line as i64 - prev_original_line, &mut out);
            vlq::encode_into(original.column as i64 - prev_original_column, &mut out);
            prev_source = original.source as i64;
            prev_original_line = original.line as i64;
            prev_original_column = original.column as i64;
            if let Some(name) = original.name {
                vlq::encode_into(name as i64 - prev_name, &mut out);
                prev_name = name as i64;
            }
        }
    }
    out
}

// =============================================================================
// Source Map document
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

impl SourceMap {
    pub fn new(file: Option<String>) -> Self {
        SourceMap {
            version: 3,
            file,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SourceMapError> {
        serde_json::from_str(text).map_err(|err| SourceMapError::new(err.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Only plain strings and integers; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether every source carries embedded original text.
    pub fn has_sources_content(&self) -> bool {
        match &self.sources_content {
            Some(contents) => !contents.is_empty() && contents.iter().all(Option::is_some),
            None => false,
        }
    }

    pub fn decoded_mappings(&self) -> Result<Vec<Mapping>, SourceMapError> {
        decode_mappings(&self.mappings)
    }

    pub fn set_mappings(&mut self, mappings: &[Mapping]) {
        self.mappings = encode_mappings(mappings);
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates sources, names and mappings in generation order.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, returning its index. Re-registering returns the
    /// existing index and keeps the first content seen.
    pub fn add_source(&mut self, name: &str, content: Option<&str>) -> u32 {
        if let Some(index) = self.sources.iter().position(|s| s == name) {
            if self.sources_content[index].is_none() {
                self.sources_content[index] = content.map(str::to_string);
            }
            return index as u32;
        }
        self.sources.push(name.to_string());
        self.sources_content.push(content.map(str::to_string));
        (self.sources.len() - 1) as u32
    }

    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return index as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    /// Append a mapping. Consecutive duplicates of the same generated
    /// position are collapsed, keeping the first.
    pub fn add_mapping(&mut self, mapping: Mapping) {
        if let Some(last) = self.mappings.last()
            && last.generated_line == mapping.generated_line
            && last.generated_column == mapping.generated_column
        {
            return;
        }
        self.mappings.push(mapping);
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn build(mut self, file: Option<String>) -> SourceMap {
        self.mappings
            .sort_by_key(|m| (m.generated_line, m.generated_column));
        let mut map = SourceMap::new(file);
        map.set_mappings(&self.mappings);
        map.names = self.names;
        if self.sources_content.iter().any(Option::is_some) {
            map.sources_content = Some(self.sources_content);
        }
        map.sources = self.sources;
        map
    }
}
