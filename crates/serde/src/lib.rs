//! # Trellis
//!
//! Object-graph serialization for XML and JSON through one node tree.
//!
//! Types describe themselves once through [`Reflect::type_info`]: members,
//! factories, naming metadata and collection capabilities. The engine walks
//! values through those descriptors, so the same registration drives both
//! formats and both directions.
//!
//! ## Architecture
//!
//! - **Reflection** ([`reflect`]): cached [`TypeDescriptor`]s, scalar
//!   conversions, [`Dynamic`] top-type values and [`Shared`] references.
//! - **Values** ([`value`]): slots holding an instance and its declared type.
//! - **Adapters** ([`adapters`]): uniform list and map access over native
//!   collections, fixed arrays and generic-only collections.
//! - **Node tree** ([`node`]): an arena tree with XML and JSON realizations.
//! - **Naming** ([`naming`]): ordered rule pipelines for type, member, item
//!   and enum names.
//! - **Engine** ([`engine`]): [`Serializer`] and [`Deserializer`].
//!
//! ## Example
//!
//! ```ignore
//! use trellis_serde::{Format, MemberMeta, Options, Reflect, TypeInfo};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Person {
//!     name: String,
//!     age: Option<u32>,
//! }
//!
//! impl Reflect for Person {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::object::<Self>("Person")
//!             .member("Name", |p| Some(&p.name), |p, v| p.name = v)
//!             .member_with("Age", |p| p.age.as_ref(), |p, v| p.age = Some(v),
//!                 MemberMeta::new().as_attribute())
//!             .build()
//!     }
//! }
//!
//! let xml = trellis_serde::to_xml_string(&person)?;   // <Person Age="42"><Name>Ada</Name></Person>
//! let back: Person = trellis_serde::from_xml_str(&xml)?;
//! ```

pub mod adapters;
pub mod engine;
pub mod error;
pub mod naming;
pub mod node;
pub mod options;
pub mod reflect;
pub mod value;

pub use engine::{
    Deserializer, Serializer, from_json_str, from_reader, from_slice, from_xml_str, to_json_string,
    to_string, to_writer, to_xml_string,
};
pub use error::{Error, MismatchError, ParseError, ReflectError, Result, UnsupportedError};
pub use naming::{NameContext, NamingConventions, NamingPipeline};
pub use node::json::{parse_json, parse_json_reader, parse_json_str};
pub use node::xml::{parse_xml, parse_xml_reader, parse_xml_str};
pub use node::{JsonType, NodeId, NodeKind, NodeMut, NodeRef, NodeTree, TreeSettings};
pub use options::{Encoding, Format, Mode, NodeContext, Options, XmlOptions};
pub use reflect::{
    Dynamic, MemberMeta, Reflect, ReflectAny, Scalar, Shared, TypeDescriptor, TypeInfo, describe,
};
