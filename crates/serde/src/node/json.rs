//! JSON realization of the node tree.
//!
//! Documents go through `serde_json::Value` with `preserve_order`, so object
//! members keep their document order, and `arbitrary_precision`, so numbers
//! keep their exact text in both directions.

use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::str::FromStr;

use serde_json::{Map, Number, Value as JsonValue};
use tracing::trace;

use super::{BOM, JsonType, NodeId, NodeKind, NodeTree, Shape, TreeSettings, strip_bom};
use crate::error::{Error, ParseError, Result};
use crate::options::{Encoding, Format};
use crate::reflect::Scalar;

/// Parses a JSON document into a node tree with an unnamed root.
pub fn parse_json(bytes: &[u8], settings: TreeSettings) -> Result<NodeTree> {
    let document: JsonValue = serde_json::from_slice(strip_bom(bytes)).map_err(|e| {
        let message = e.to_string();
        let message = message
            .split(" at line ")
            .next()
            .unwrap_or(&message)
            .to_string();
        ParseError::new(
            Format::Json,
            message,
            Some(format!("line {}, column {}", e.line(), e.column())),
        )
    })?;

    let mut tree = NodeTree::new_root(Format::Json, "", kind_of(&document), settings)?;
    let root = tree.root();
    fill(&mut tree, root, document);
    trace!(nodes = tree.len(), "Parsed JSON document");
    Ok(tree)
}

pub fn parse_json_str(text: &str, settings: TreeSettings) -> Result<NodeTree> {
    parse_json(text.as_bytes(), settings)
}

/// Parses a JSON document from a reader. The input is buffered in full.
pub fn parse_json_reader<R: BufRead>(mut reader: R, settings: TreeSettings) -> Result<NodeTree> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_json(&bytes, settings)
}

fn kind_of(value: &JsonValue) -> NodeKind {
    match value {
        JsonValue::Object(_) => NodeKind::Object,
        JsonValue::Array(_) => NodeKind::Array,
        _ => NodeKind::Value,
    }
}

fn fill(tree: &mut NodeTree, id: NodeId, value: JsonValue) {
    match value {
        JsonValue::Object(members) => {
            for (name, member) in members {
                let child = push(tree, id, name, &member);
                fill(tree, child, member);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                let child = push(tree, id, String::new(), &item);
                fill(tree, child, item);
            }
        }
        JsonValue::String(text) => tree.set_value(id, Scalar::Text(text)),
        JsonValue::Number(number) => tree.set_value(id, Scalar::Number(number.to_string())),
        JsonValue::Bool(flag) => tree.set_value(id, Scalar::Bool(flag)),
        JsonValue::Null => tree.set_value(id, Scalar::Null),
    }
}

fn push(tree: &mut NodeTree, parent: NodeId, name: String, value: &JsonValue) -> NodeId {
    let kind = kind_of(value);
    tree.push_parsed(parent, name, kind, Shape::Json(JsonType::of_kind(kind)), None)
}

fn encode_error(e: impl fmt::Display) -> Error {
    Error::Encode {
        format: Format::Json,
        message: e.to_string(),
    }
}

fn to_json(tree: &NodeTree, id: NodeId) -> JsonValue {
    let text = || {
        tree.value(id)
            .map(|scalar| scalar.as_text().into_owned())
            .unwrap_or_default()
    };
    match tree.json_type(id).unwrap_or(JsonType::Null) {
        JsonType::Object => JsonValue::Object(
            tree.raw_children(id)
                .iter()
                .map(|child| (tree.name(*child).to_string(), to_json(tree, *child)))
                .collect::<Map<String, JsonValue>>(),
        ),
        JsonType::Array => JsonValue::Array(
            tree.raw_children(id)
                .iter()
                .map(|child| to_json(tree, *child))
                .collect(),
        ),
        JsonType::String => JsonValue::String(text()),
        // Text that is not a valid JSON number (NaN, inf) is written as a string.
        JsonType::Number => {
            let text = text();
            Number::from_str(text.trim())
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::String(text))
        }
        JsonType::Boolean => match tree.value(id) {
            Some(Scalar::Bool(flag)) => JsonValue::Bool(*flag),
            Some(other) => match other.as_text().trim() {
                "true" => JsonValue::Bool(true),
                "false" => JsonValue::Bool(false),
                text => JsonValue::String(text.to_string()),
            },
            None => JsonValue::Null,
        },
        JsonType::Null => JsonValue::Null,
    }
}

pub(super) fn encode<W: Write>(tree: &NodeTree, writer: W, encoding: Encoding) -> Result<()> {
    let document = to_json(tree, tree.root());
    let mut out = BufWriter::new(writer);
    if encoding == Encoding::Utf8Bom {
        out.write_all(BOM)?;
    }
    if tree.settings().pretty_print {
        serde_json::to_writer_pretty(&mut out, &document).map_err(encode_error)?;
    } else {
        serde_json::to_writer(&mut out, &document).map_err(encode_error)?;
    }
    out.flush()?;
    trace!(nodes = tree.len(), "Encoded JSON document");
    Ok(())
}
