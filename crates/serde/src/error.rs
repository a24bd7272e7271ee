//! Error types for serialization and deserialization.
//!
//! Errors are organized by category: parse failures in the underlying XML or
//! JSON readers, structural mismatches between a node tree and the destination
//! type, shapes the engine cannot handle, and reflection access failures.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::options::Format;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input detected by the XML or JSON reader
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Node tree does not match the destination type
    #[error(transparent)]
    Mismatch(#[from] MismatchError),

    /// Shape the engine cannot serialize or adapt
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),

    /// Reflection access failure
    #[error(transparent)]
    Reflect(#[from] ReflectError),

    /// Failure while writing an encoded document
    #[error("{format} encode error: {message}")]
    Encode { format: Format, message: String },

    /// IO error while reading or writing a stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed input, tagged with the format and the node path where the
/// reader gave up.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{format} parse error{}: {message}", location(.path))]
pub struct ParseError {
    pub format: Format,
    pub message: String,
    pub path: Option<String>,
}

impl ParseError {
    pub fn new(format: Format, message: impl Into<String>, path: Option<String>) -> Self {
        Self {
            format,
            message: message.into(),
            path,
        }
    }
}

fn location(path: &Option<String>) -> String {
    path.as_deref()
        .map(|p| format!(" at {p}"))
        .unwrap_or_default()
}

/// Structural mismatch between a node tree and the destination type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MismatchError {
    /// The document root is not named after the destination type.
    #[error("root element '{actual}' at {path} does not match expected '{expected}'")]
    RootName {
        expected: String,
        actual: String,
        path: String,
    },

    /// An array item carries a different name than the member requires.
    #[error("array item '{actual}' at {path} does not match expected item name '{expected}'")]
    ItemName {
        expected: String,
        actual: String,
        path: String,
    },

    /// A child node has no corresponding member.
    #[error("no member of {type_name} matches node '{name}' at {path}")]
    UnmatchedNode {
        type_name: String,
        name: String,
        path: String,
    },

    /// A scalar could not be converted into the destination type.
    #[error("cannot read '{value}' as {type_name} at {path}: {reason}")]
    InvalidValue {
        type_name: String,
        value: String,
        path: String,
        reason: String,
    },

    /// A JSON node has the wrong shape for the destination type.
    #[error("expected {expected} at {path}, found {actual}")]
    NodeKind {
        expected: String,
        actual: String,
        path: String,
    },
}

/// Shapes the engine refuses to handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnsupportedError {
    /// Simple types cannot be deserialized as a document root.
    #[error("simple type {type_name} cannot be deserialized as a document root")]
    SimpleRoot { type_name: String },

    /// A collection adapter was asked to wrap an incompatible value.
    #[error("{type_name} cannot be adapted as {expected}")]
    IncompatibleCollection {
        type_name: String,
        expected: &'static str,
    },

    /// Attribute nodes are leaves.
    #[error("node at {path} does not support children")]
    ChildrenNotSupported { path: String },

    /// Node names must be non-empty where the format needs them.
    #[error("invalid node name '{name}'")]
    InvalidName { name: String },
}

/// Failures while reading or writing values through reflection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflectError {
    #[error("member '{member}' is read-only")]
    ReadOnly { member: String },

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{type_name} does not support {operation}")]
    Unsupported {
        type_name: String,
        operation: &'static str,
    },

    #[error("type {type_name} has no constructor")]
    NotConstructible { type_name: String },

    #[error("value of {type_name} is already borrowed")]
    Borrowed { type_name: String },

    #[error("no instance available for {type_name}")]
    MissingInstance { type_name: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
