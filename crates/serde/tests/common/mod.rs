//! Shared helpers for the engine integration tests.
//!
//! - [`fixtures`] - registered types and sample values

#![allow(dead_code)]

pub mod fixtures;

use trellis_serde::{
    Deserializer, Format, NodeTree, Options, Reflect, Result, Serializer, TreeSettings, parse_json,
    parse_xml,
};

/// Serializes and encodes `value` with `options`.
pub fn encode<T: Reflect>(value: &T, format: Format, options: Options) -> Result<String> {
    Serializer::new(options)
        .serialize(value, format)?
        .encode_to_string()
}

/// Parses `text` with tree settings taken from `options`.
pub fn parse(text: &str, format: Format, options: &Options) -> Result<NodeTree> {
    let settings = TreeSettings::from_options(options);
    match format {
        Format::Xml => parse_xml(text.as_bytes(), settings),
        Format::Json => parse_json(text.as_bytes(), settings),
    }
}

pub fn decode<T: Reflect>(text: &str, format: Format, options: Options) -> Result<T> {
    let tree = parse(text, format, &options)?;
    Deserializer::new(options).deserialize(&tree)
}

/// Encodes, re-parses and deserializes `value` with the same options.
pub fn round_trip<T: Reflect>(value: &T, format: Format, options: Options) -> Result<T> {
    let text = encode(value, format, options.clone())?;
    decode(&text, format, options)
}

/// Options producing compact XML without a declaration.
pub fn compact() -> Options {
    Options::new().with_omit_declaration(true)
}
