//! Serializer configuration.
//!
//! [`Options`] is built once, wrapped in an `Arc`, and shared read-only by
//! every call. Each call pairs it with a format and a direction in a
//! [`Context`], which is never mutated while the call runs.
//!
//! # Defaults
//!
//! | Option | Default | Effect |
//! |--------|---------|--------|
//! | `pretty_print` | false | Indent encoded output |
//! | `use_actual_type` | false | Deserialize into runtime types of existing members |
//! | `treat_enumerable_impls_as_objects` | true | Custom list-like objects keep their members |
//! | `treat_dictionary_impls_as_objects` | true | Custom map-like objects keep their members |
//! | `include_non_public_members` | false | Walk members marked non-public |
//! | `serialize_null_members` | false | Emit absent members as null nodes |
//! | `ignore_case` | false | Case-insensitive name matching while reading |
//! | `validate_root_name` | true | XML root must carry the type name |
//! | `ignore_unmatched_nodes` | false | Skip nodes without a matching member |
//! | `xml.values_as_attributes` | false | Simple members become attributes |
//! | `xml.ingest_attributes` | true | Attributes take part in deserialization |
//! | `xml.omit_declaration` | false | Leave out `<?xml ...?>` |

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::naming::NamingConventions;
use crate::node::NodeMut;
use crate::reflect::{MemberDescriptor, Reflect, Scalar, TypeDescriptor, TypeKind};

/// Wire format of a node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Xml,
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Serialize,
    Deserialize,
}

/// Byte encoding of encoded documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-8 preceded by a byte order mark.
    Utf8Bom,
}

/// XML-specific settings.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlOptions {
    /// Namespace of elements without an explicit namespace.
    pub default_namespace: Option<String>,
    /// Prefix to namespace URI table declared on the root element.
    pub namespaces: BTreeMap<String, String>,
    pub values_as_attributes: bool,
    pub ingest_attributes: bool,
    pub omit_declaration: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            default_namespace: None,
            namespaces: BTreeMap::new(),
            values_as_attributes: false,
            ingest_attributes: true,
            omit_declaration: false,
        }
    }
}

/// What the engine knows about the node being written or read.
#[derive(Clone)]
pub struct NodeContext {
    pub ty: Arc<TypeDescriptor>,
    pub member: Option<Arc<MemberDescriptor>>,
    pub format: Format,
    pub mode: Mode,
    pub path: String,
}

type WriterFn = Arc<dyn Fn(&dyn Reflect, &NodeContext) -> Option<Scalar> + Send + Sync>;
type ReaderFn = Arc<dyn Fn(&Scalar, &NodeContext) -> Result<Box<dyn Reflect>, String> + Send + Sync>;
type VisitPredicate = Arc<dyn Fn(&NodeContext) -> bool + Send + Sync>;
type VisitFn = Arc<dyn Fn(&mut NodeMut<'_>, &NodeContext) + Send + Sync>;

#[derive(Clone)]
struct NodeVisitor {
    predicate: VisitPredicate,
    visit: VisitFn,
}

/// Engine configuration.
#[derive(Clone)]
pub struct Options {
    pub naming: NamingConventions,
    pub xml: XmlOptions,
    pub pretty_print: bool,
    pub encoding: Encoding,
    pub use_actual_type: bool,
    pub treat_enumerable_impls_as_objects: bool,
    pub treat_dictionary_impls_as_objects: bool,
    pub include_non_public_members: bool,
    pub serialize_null_members: bool,
    pub ignore_case: bool,
    pub validate_root_name: bool,
    pub ignore_unmatched_nodes: bool,
    writers: HashMap<TypeId, WriterFn>,
    readers: HashMap<TypeId, ReaderFn>,
    visitors: Vec<NodeVisitor>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            naming: NamingConventions::default(),
            xml: XmlOptions::default(),
            pretty_print: false,
            encoding: Encoding::default(),
            use_actual_type: false,
            treat_enumerable_impls_as_objects: true,
            treat_dictionary_impls_as_objects: true,
            include_non_public_members: false,
            serialize_null_members: false,
            ignore_case: false,
            validate_root_name: true,
            ignore_unmatched_nodes: false,
            writers: HashMap::new(),
            readers: HashMap::new(),
            visitors: Vec::new(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("xml", &self.xml)
            .field("pretty_print", &self.pretty_print)
            .field("encoding", &self.encoding)
            .field("use_actual_type", &self.use_actual_type)
            .field("ignore_case", &self.ignore_case)
            .field("validate_root_name", &self.validate_root_name)
            .field("ignore_unmatched_nodes", &self.ignore_unmatched_nodes)
            .field("serialize_null_members", &self.serialize_null_members)
            .field("writers", &self.writers.len())
            .field("readers", &self.readers.len())
            .field("visitors", &self.visitors.len())
            .finish_non_exhaustive()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.xml.default_namespace = Some(namespace.into());
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.xml.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_values_as_attributes(mut self, enabled: bool) -> Self {
        self.xml.values_as_attributes = enabled;
        self
    }

    pub fn with_attribute_ingestion(mut self, enabled: bool) -> Self {
        self.xml.ingest_attributes = enabled;
        self
    }

    pub fn with_omit_declaration(mut self, omit: bool) -> Self {
        self.xml.omit_declaration = omit;
        self
    }

    pub fn with_actual_types(mut self, enabled: bool) -> Self {
        self.use_actual_type = enabled;
        self
    }

    pub fn with_ignore_case(mut self, enabled: bool) -> Self {
        self.ignore_case = enabled;
        self
    }

    pub fn with_root_validation(mut self, enabled: bool) -> Self {
        self.validate_root_name = enabled;
        self
    }

    pub fn with_ignore_unmatched_nodes(mut self, enabled: bool) -> Self {
        self.ignore_unmatched_nodes = enabled;
        self
    }

    pub fn with_null_members(mut self, enabled: bool) -> Self {
        self.serialize_null_members = enabled;
        self
    }

    pub fn with_non_public_members(mut self, enabled: bool) -> Self {
        self.include_non_public_members = enabled;
        self
    }

    /// Controls whether custom collection-like objects are walked as objects
    /// (`true`) or as their collection capability (`false`).
    pub fn with_collection_impls_as_objects(mut self, enumerables: bool, dictionaries: bool) -> Self {
        self.treat_enumerable_impls_as_objects = enumerables;
        self.treat_dictionary_impls_as_objects = dictionaries;
        self
    }

    /// Registers a scalar writer for values of type `T`.
    pub fn with_writer<T, F>(mut self, writer: F) -> Self
    where
        T: Reflect,
        F: Fn(&T, &NodeContext) -> Scalar + Send + Sync + 'static,
    {
        let erased: WriterFn = Arc::new(move |value: &dyn Reflect, context: &NodeContext| {
            value
                .resolve()
                .as_any()
                .downcast_ref::<T>()
                .map(|value| writer(value, context))
        });
        self.writers.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Registers a scalar reader producing values of type `T`.
    pub fn with_reader<T, F>(mut self, reader: F) -> Self
    where
        T: Reflect,
        F: Fn(&Scalar, &NodeContext) -> Result<T, String> + Send + Sync + 'static,
    {
        let erased: ReaderFn = Arc::new(move |scalar: &Scalar, context: &NodeContext| {
            reader(scalar, context).map(|value| Box::new(value) as Box<dyn Reflect>)
        });
        self.readers.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Registers a node visitor. Visitors run in registration order after a
    /// node has been fully written.
    pub fn with_visitor<P, V>(mut self, predicate: P, visit: V) -> Self
    where
        P: Fn(&NodeContext) -> bool + Send + Sync + 'static,
        V: Fn(&mut NodeMut<'_>, &NodeContext) + Send + Sync + 'static,
    {
        self.visitors.push(NodeVisitor {
            predicate: Arc::new(predicate),
            visit: Arc::new(visit),
        });
        self
    }

    pub(crate) fn write_with_hook(
        &self,
        value: &dyn Reflect,
        context: &NodeContext,
    ) -> Option<Scalar> {
        let writer = self.writers.get(&context.ty.key().id())?;
        writer(value, context)
    }

    pub(crate) fn read_with_hook(
        &self,
        scalar: &Scalar,
        context: &NodeContext,
    ) -> Option<Result<Box<dyn Reflect>, String>> {
        let reader = self.readers.get(&context.ty.key().id())?;
        Some(reader(scalar, context))
    }

    pub(crate) fn has_writer(&self, ty: &TypeDescriptor) -> bool {
        self.writers.contains_key(&ty.key().id())
    }

    pub(crate) fn has_reader(&self, ty: &TypeDescriptor) -> bool {
        self.readers.contains_key(&ty.key().id())
    }

    pub(crate) fn visit(&self, node: &mut NodeMut<'_>, context: &NodeContext) {
        for visitor in &self.visitors {
            if (visitor.predicate)(context) {
                (visitor.visit)(node, context);
            }
        }
    }

    pub(crate) fn has_visitors(&self) -> bool {
        !self.visitors.is_empty()
    }
}

/// Options paired with the format and direction of one call.
#[derive(Debug, Clone)]
pub struct Context {
    options: Arc<Options>,
    format: Format,
    mode: Mode,
}

impl Context {
    pub fn new(options: Arc<Options>, format: Format, mode: Mode) -> Self {
        Self {
            options,
            format,
            mode,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn shared_options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Classification with the treat-as-object overrides applied.
    pub fn classify(&self, ty: &TypeDescriptor) -> TypeKind {
        ty.classify(&self.options)
    }

    /// Whether a slot of `declared` type is treated by its runtime type.
    pub fn use_actual_type(&self, declared: &TypeDescriptor) -> bool {
        self.mode == Mode::Serialize || self.options.use_actual_type || declared.is_top()
    }

    /// Compares wire names, honoring `ignore_case`.
    pub fn names_match(&self, left: &str, right: &str) -> bool {
        if self.options.ignore_case {
            left.eq_ignore_ascii_case(right) || left.to_lowercase() == right.to_lowercase()
        } else {
            left == right
        }
    }

    pub(crate) fn node_context(
        &self,
        ty: Arc<TypeDescriptor>,
        member: Option<Arc<MemberDescriptor>>,
        path: String,
    ) -> NodeContext {
        NodeContext {
            ty,
            member,
            format: self.format,
            mode: self.mode,
            path,
        }
    }
}
