//! Object graph traversal.
//!
//! [`Serializer`] walks a typed value into a [`NodeTree`];
//! [`Deserializer`] walks a tree back into a freshly constructed value. Both
//! read types through the reflection cache, instances through
//! [`Value`](crate::value::Value) slots and collections through the adapters.
//!
//! The free functions below cover the common case of one value to or from
//! one document.

mod deserialize;
mod serialize;

pub use deserialize::Deserializer;
pub use serialize::Serializer;

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::node::{NodeTree, TreeSettings, json, xml};
use crate::options::{Format, Options};
use crate::reflect::Reflect;

/// Serializes `value` and encodes it with the configured byte encoding.
pub fn to_writer<T: Reflect, W: Write>(
    value: &T,
    format: Format,
    writer: W,
    options: Options,
) -> Result<()> {
    Serializer::new(options)
        .serialize(value, format)?
        .encode(writer)
}

pub fn to_string<T: Reflect>(value: &T, format: Format, options: Options) -> Result<String> {
    Serializer::new(options)
        .serialize(value, format)?
        .encode_to_string()
}

pub fn to_xml_string<T: Reflect>(value: &T) -> Result<String> {
    to_string(value, Format::Xml, Options::default())
}

pub fn to_json_string<T: Reflect>(value: &T) -> Result<String> {
    to_string(value, Format::Json, Options::default())
}

/// Parses a document and deserializes it into `T`.
pub fn from_slice<T: Reflect>(bytes: &[u8], format: Format, options: Options) -> Result<T> {
    let tree = parse(bytes, format, &options)?;
    Deserializer::new(options).deserialize(&tree)
}

pub fn from_reader<T: Reflect, R: BufRead>(
    mut reader: R,
    format: Format,
    options: Options,
) -> Result<T> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    from_slice(&bytes, format, options)
}

pub fn from_xml_str<T: Reflect>(text: &str) -> Result<T> {
    from_slice(text.as_bytes(), Format::Xml, Options::default())
}

pub fn from_json_str<T: Reflect>(text: &str) -> Result<T> {
    from_slice(text.as_bytes(), Format::Json, Options::default())
}

fn parse(bytes: &[u8], format: Format, options: &Options) -> Result<NodeTree> {
    let settings = TreeSettings::from_options(options);
    match format {
        Format::Xml => xml::parse_xml(bytes, settings),
        Format::Json => json::parse_json(bytes, settings),
    }
}
