//! ESTree JSON interop.
//!
//! Objects carrying a string `type` become [`Node`]s, other objects become
//! [`Value::Map`], and `loc` is lifted into [`SourceLocation`]. Converting back
//! reproduces the same JSON, with integral numbers written without a
//! fractional part.

use crate::node::{Node, NodeKind, SourceLocation, Value};
use crate::parser::{ParseError, ParseOptions, Parser};
use indexmap::IndexMap;
use serde_json::{Map, Number};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstreeError {
    /// The document is not valid JSON.
    Json(String),
    /// The root is not an object with a `type`.
    NotANode,
    /// A `loc` field did not have the `{start, end}` shape.
    InvalidLocation(String),
}

impl fmt::Display for EstreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstreeError::Json(message) => write!(f, "invalid ESTree JSON: {message}"),
            EstreeError::NotANode => f.write_str("ESTree root must be an object with a type"),
            EstreeError::InvalidLocation(message) => write!(f, "invalid loc: {message}"),
        }
    }
}

impl std::error::Error for EstreeError {}

impl Node {
    pub fn from_estree(json: &serde_json::Value) -> Result<Node, EstreeError> {
        match json_to_value(json)? {
            Value::Node(node) => Ok(*node),
            _ => Err(EstreeError::NotANode),
        }
    }

    pub fn from_estree_str(text: &str) -> Result<Node, EstreeError> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|err| EstreeError::Json(err.to_string()))?;
        Self::from_estree(&json)
    }

    pub fn to_estree(&self) -> serde_json::Value {
        let mut object = Map::new();
        object.insert(
            "type".to_string(),
            serde_json::Value::String(self.kind.as_str().to_string()),
        );
        for (key, value) in &self.fields {
            object.insert(key.clone(), value_to_json(value));
        }
        if let Some(loc) = &self.loc {
            object.insert(
                "loc".to_string(),
                serde_json::to_value(loc).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(object)
    }
}

fn json_to_value(json: &serde_json::Value) -> Result<Value, EstreeError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(
            items
                .iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(object) => match object.get("type") {
            Some(serde_json::Value::String(kind)) => {
                let mut node = Node::new(NodeKind::from_name(kind));
                for (key, value) in object {
                    match key.as_str() {
                        "type" => {}
                        "loc" if !value.is_null() => {
                            let loc: SourceLocation = serde_json::from_value(value.clone())
                                .map_err(|err| EstreeError::InvalidLocation(err.to_string()))?;
                            node.loc = Some(loc);
                        }
                        "loc" => {}
                        _ => {
                            node.fields.insert(key.clone(), json_to_value(value)?);
                        }
                    }
                }
                Value::Node(Box::new(node))
            }
            _ => {
                let mut map = IndexMap::with_capacity(object.len());
                for (key, value) in object {
                    map.insert(key.clone(), json_to_value(value)?);
                }
                Value::Map(map)
            }
        },
    })
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Node(node) => node.to_estree(),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), value_to_json(value)))
                .collect(),
        ),
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Parser over ESTree JSON text, for trees produced by an external parser
/// process.
///
/// JSX and location options are the producer's concern; `loc.source` is
/// filled from the file name when locations are requested and missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstreeJsonParser;

impl Parser for EstreeJsonParser {
    fn parse(&self, source: &str, options: &ParseOptions) -> Result<Node, ParseError> {
        let mut tree = Node::from_estree_str(source).map_err(|err| {
            ParseError::new(format!("{}: {}", options.file_name, err))
        })?;
        if !options.locations {
            strip_locations(&mut tree);
        } else if !options.file_name.is_empty() {
            fill_location_source(&mut tree, &options.file_name);
        }
        Ok(tree)
    }
}

fn for_each_child(node: &mut Node, f: &mut dyn FnMut(&mut Node)) {
    fn walk(value: &mut Value, f: &mut dyn FnMut(&mut Node)) {
        match value {
            Value::Node(node) => f(node),
            Value::List(items) => items.iter_mut().for_each(|item| walk(item, f)),
            _ => {}
        }
    }
    for value in node.fields.values_mut() {
        walk(value, f);
    }
}

fn strip_locations(node: &mut Node) {
    node.loc = None;
    for_each_child(node, &mut strip_locations);
}

fn fill_location_source(node: &mut Node, file_name: &str) {
    if let Some(loc) = &mut node.loc
        && loc.source.is_none()
    {
        loc.source = Some(file_name.to_string());
    }
    for_each_child(node, &mut |child| fill_location_source(child, file_name));
}
