//! Format-agnostic node tree.
//!
//! A [`NodeTree`] is an arena of nodes addressed by [`NodeId`]. Every node has
//! a name, a structural [`NodeKind`], an optional [`Scalar`] value and ordered
//! children. The format only shows up in how a node is realized: an XML
//! element, an XML attribute, or a JSON node with an explicit [`JsonType`].
//!
//! Serialization builds a tree with [`NodeTree::new_root`] and
//! [`NodeTree::add_child`] and encodes it; deserialization parses bytes into
//! a tree with [`parse_xml`](xml::parse_xml) or
//! [`parse_json`](json::parse_json) and walks it.

pub mod json;
pub mod xml;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, UnsupportedError};
use crate::options::{Encoding, Format, Options};
use crate::reflect::{MemberMeta, Scalar};

/// Index of a node inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Structural role of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Value,
    Array,
    Object,
    /// Not decided until the first write.
    #[default]
    Unclassified,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Value => "value",
            NodeKind::Array => "array",
            NodeKind::Object => "object",
            NodeKind::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// Primitive representation of a JSON node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl JsonType {
    /// Representation implied by a scalar.
    pub fn of_scalar(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Null => JsonType::Null,
            Scalar::Bool(_) => JsonType::Boolean,
            Scalar::Number(_) => JsonType::Number,
            Scalar::Text(_) => JsonType::String,
        }
    }

    fn of_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Array => JsonType::Array,
            NodeKind::Object | NodeKind::Unclassified => JsonType::Object,
            NodeKind::Value => JsonType::Null,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Element,
    Attribute,
    Json(JsonType),
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: Option<Scalar>,
    namespace: Option<String>,
    shape: Shape,
}

/// Encoding and layout settings carried by a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSettings {
    pub pretty_print: bool,
    pub omit_declaration: bool,
    pub default_namespace: Option<String>,
    /// Prefix to URI.
    pub namespaces: BTreeMap<String, String>,
    pub values_as_attributes: bool,
    pub ingest_attributes: bool,
    pub encoding: Encoding,
}

impl TreeSettings {
    pub fn from_options(options: &Options) -> Self {
        Self {
            pretty_print: options.pretty_print,
            omit_declaration: options.xml.omit_declaration,
            default_namespace: options.xml.default_namespace.clone(),
            namespaces: options.xml.namespaces.clone(),
            values_as_attributes: options.xml.values_as_attributes,
            ingest_attributes: options.xml.ingest_attributes,
            encoding: options.encoding,
        }
    }
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

/// Arena of nodes with a single root.
#[derive(Debug, Clone)]
pub struct NodeTree {
    format: Format,
    nodes: Vec<NodeData>,
    settings: TreeSettings,
}

fn is_valid_xml_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '&' | '"' | '\'' | '/' | '='))
}

impl NodeTree {
    /// Creates a tree holding only its root.
    pub fn new_root(
        format: Format,
        name: impl Into<String>,
        kind: NodeKind,
        settings: TreeSettings,
    ) -> Result<Self> {
        let name = name.into();
        if format == Format::Xml && !is_valid_xml_name(&name) {
            return Err(UnsupportedError::InvalidName { name }.into());
        }
        let shape = match format {
            Format::Xml => Shape::Element,
            Format::Json => Shape::Json(JsonType::of_kind(kind)),
        };
        Ok(Self {
            format,
            nodes: vec![NodeData {
                name,
                kind,
                parent: None,
                children: Vec::new(),
                value: None,
                namespace: None,
                shape,
            }],
            settings,
        })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TreeSettings {
        &mut self.settings
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn node_mut(&mut self, id: NodeId) -> NodeMut<'_> {
        NodeMut { tree: self, id }
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.data(id).name
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.format == Format::Xml && !is_valid_xml_name(&name) {
            return Err(UnsupportedError::InvalidName { name }.into());
        }
        self.data_mut(id).name = name;
        Ok(())
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        let data = self.data_mut(id);
        data.kind = kind;
        if let Shape::Json(json_type) = &mut data.shape
            && kind != NodeKind::Value
        {
            *json_type = JsonType::of_kind(kind);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn value(&self, id: NodeId) -> Option<&Scalar> {
        self.data(id).value.as_ref()
    }

    /// Stores scalar content. An unclassified node becomes a value node and a
    /// JSON node takes the representation implied by the scalar.
    pub fn set_value(&mut self, id: NodeId, value: Scalar) {
        let data = self.data_mut(id);
        if data.kind == NodeKind::Unclassified {
            data.kind = NodeKind::Value;
        }
        if let Shape::Json(json_type) = &mut data.shape {
            *json_type = JsonType::of_scalar(&value);
        }
        data.value = Some(value);
    }

    /// Explicit JSON representation; ignored for XML nodes.
    pub fn json_type(&self, id: NodeId) -> Option<JsonType> {
        match self.data(id).shape {
            Shape::Json(json_type) => Some(json_type),
            Shape::Element | Shape::Attribute => None,
        }
    }

    pub fn set_json_type(&mut self, id: NodeId, json_type: JsonType) {
        if let Shape::Json(current) = &mut self.data_mut(id).shape {
            *current = json_type;
        }
    }

    /// Explicit namespace URI of an XML node.
    pub fn namespace(&self, id: NodeId) -> Option<&str> {
        self.data(id).namespace.as_deref()
    }

    /// Assigns a namespace by table prefix or URI. An empty string clears it.
    pub fn set_namespace(&mut self, id: NodeId, namespace: &str) {
        let resolved = (!namespace.is_empty()).then(|| self.resolve_namespace(namespace));
        self.data_mut(id).namespace = resolved;
    }

    fn resolve_namespace(&self, namespace: &str) -> String {
        self.settings
            .namespaces
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| namespace.to_string())
    }

    pub fn is_attribute(&self, id: NodeId) -> bool {
        self.data(id).shape == Shape::Attribute
    }

    /// Appends a child node.
    ///
    /// In XML, value children become attributes when the member asks for
    /// one, or when `values_as_attributes` is set and the member does not
    /// force an element.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        meta: Option<&MemberMeta>,
    ) -> Result<NodeId> {
        let name = name.into();
        if self.is_attribute(parent) {
            return Err(UnsupportedError::ChildrenNotSupported {
                path: self.path(parent),
            }
            .into());
        }
        if self.format == Format::Xml && !is_valid_xml_name(&name) {
            return Err(UnsupportedError::InvalidName { name }.into());
        }

        let shape = match self.format {
            Format::Xml => {
                let as_attribute = kind == NodeKind::Value
                    && meta.is_some_and(|meta| {
                        meta.is_attribute()
                            || (self.settings.values_as_attributes && !meta.is_element())
                    });
                if as_attribute {
                    Shape::Attribute
                } else {
                    Shape::Element
                }
            }
            Format::Json => Shape::Json(JsonType::of_kind(kind)),
        };
        let namespace = match self.format {
            Format::Xml => meta
                .and_then(|meta| meta.namespace.as_deref())
                .filter(|ns| !ns.is_empty())
                .map(|ns| self.resolve_namespace(ns)),
            Format::Json => None,
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            value: None,
            namespace,
            shape,
        });
        let parent_data = self.data_mut(parent);
        if parent_data.kind == NodeKind::Unclassified {
            parent_data.kind = NodeKind::Object;
        }
        parent_data.children.push(id);
        Ok(id)
    }

    /// Children in reading order: XML elements first, then attributes unless
    /// attribute ingestion is disabled.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let children = &self.data(id).children;
        let ingest = self.format == Format::Json || self.settings.ingest_attributes;
        let elements = children.iter().copied().filter(|c| !self.is_attribute(*c));
        let attributes = children
            .iter()
            .copied()
            .filter(move |c| ingest && self.is_attribute(*c));
        elements.chain(attributes)
    }

    /// Children in insertion order, attributes included.
    pub(crate) fn raw_children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    /// Location of a node: `/root/child/@attr` in XML, `$.child[2]` in JSON.
    pub fn path(&self, id: NodeId) -> String {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();

        let mut path = String::new();
        match self.format {
            Format::Xml => {
                for node in chain {
                    path.push('/');
                    if self.is_attribute(node) {
                        path.push('@');
                    }
                    path.push_str(self.name(node));
                }
            }
            Format::Json => {
                path.push('$');
                for node in chain.into_iter().skip(1) {
                    let Some(parent) = self.parent(node) else {
                        continue;
                    };
                    if self.kind(parent) == NodeKind::Array {
                        let index = self
                            .raw_children(parent)
                            .iter()
                            .position(|c| *c == node)
                            .unwrap_or_default();
                        path.push_str(&format!("[{index}]"));
                    } else {
                        path.push('.');
                        path.push_str(self.name(node));
                    }
                }
            }
        }
        path
    }

    /// Every node in document order.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.raw_children(id).iter().rev().copied());
        }
        order
    }

    /// Encodes the tree with its configured byte encoding.
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        self.encode_with(writer, self.settings.encoding)
    }

    pub fn encode_with<W: Write>(&self, writer: W, encoding: Encoding) -> Result<()> {
        match self.format {
            Format::Xml => xml::encode(self, writer, encoding),
            Format::Json => json::encode(self, writer, encoding),
        }
    }

    pub fn encode_to_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.encode(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Encode {
            format: self.format,
            message: e.to_string(),
        })
    }

    /// Appends a parsed node without name validation or parent reclassification.
    fn push_parsed(
        &mut self,
        parent: NodeId,
        name: String,
        kind: NodeKind,
        shape: Shape,
        namespace: Option<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            value: None,
            namespace,
            shape,
        });
        self.data_mut(parent).children.push(id);
        id
    }
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM).unwrap_or(bytes)
}

/// Read-only cursor over one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t NodeTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'t str {
        self.tree.name(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.tree.kind(self.id)
    }

    pub fn value(&self) -> Option<&'t Scalar> {
        self.tree.value(self.id)
    }

    pub fn json_type(&self) -> Option<JsonType> {
        self.tree.json_type(self.id)
    }

    pub fn namespace(&self) -> Option<&'t str> {
        self.tree.namespace(self.id)
    }

    pub fn is_attribute(&self) -> bool {
        self.tree.is_attribute(self.id)
    }

    pub fn path(&self) -> String {
        self.tree.path(self.id)
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.tree.parent(self.id).map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.tree;
        tree.children(self.id).map(move |id| tree.node(id))
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path())
            .field("kind", &self.kind())
            .field("value", &self.value())
            .finish()
    }
}

/// Mutable cursor over one node, handed to node visitors.
pub struct NodeMut<'t> {
    tree: &'t mut NodeTree,
    id: NodeId,
}

impl NodeMut<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn format(&self) -> Format {
        self.tree.format()
    }

    pub fn name(&self) -> &str {
        self.tree.name(self.id)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.tree.set_name(self.id, name)
    }

    pub fn kind(&self) -> NodeKind {
        self.tree.kind(self.id)
    }

    pub fn path(&self) -> String {
        self.tree.path(self.id)
    }

    pub fn value(&self) -> Option<&Scalar> {
        self.tree.value(self.id)
    }

    pub fn set_value(&mut self, value: Scalar) {
        self.tree.set_value(self.id, value);
    }

    pub fn json_type(&self) -> Option<JsonType> {
        self.tree.json_type(self.id)
    }

    pub fn set_json_type(&mut self, json_type: JsonType) {
        self.tree.set_json_type(self.id, json_type);
    }

    pub fn namespace(&self) -> Option<&str> {
        self.tree.namespace(self.id)
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.tree.set_namespace(self.id, namespace);
    }

    pub fn is_attribute(&self) -> bool {
        self.tree.is_attribute(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml_tree(settings: TreeSettings) -> NodeTree {
        NodeTree::new_root(Format::Xml, "Order", NodeKind::Unclassified, settings).unwrap()
    }

    #[test]
    fn test_add_child_classifies_parent() {
        let mut tree = xml_tree(TreeSettings::default());
        let root = tree.root();
        assert_eq!(tree.kind(root), NodeKind::Unclassified);
        tree.add_child(root, "Id", NodeKind::Value, None).unwrap();
        assert_eq!(tree.kind(root), NodeKind::Object);
    }

    #[test]
    fn test_attribute_placement() {
        let mut tree = xml_tree(TreeSettings::default());
        let root = tree.root();
        let id = tree
            .add_child(root, "id", NodeKind::Value, Some(&MemberMeta::new().as_attribute()))
            .unwrap();
        let name = tree
            .add_child(root, "Name", NodeKind::Value, Some(&MemberMeta::new()))
            .unwrap();
        assert!(tree.is_attribute(id));
        assert!(!tree.is_attribute(name));
        assert_eq!(tree.path(id), "/Order/@id");
        assert_eq!(tree.path(name), "/Order/Name");
    }

    #[test]
    fn test_values_as_attributes_respects_element_override() {
        let settings = TreeSettings {
            values_as_attributes: true,
            ..TreeSettings::default()
        };
        let mut tree = xml_tree(settings);
        let root = tree.root();
        let plain = tree
            .add_child(root, "Total", NodeKind::Value, Some(&MemberMeta::new()))
            .unwrap();
        let forced = tree
            .add_child(root, "Note", NodeKind::Value, Some(&MemberMeta::new().as_element()))
            .unwrap();
        assert!(tree.is_attribute(plain));
        assert!(!tree.is_attribute(forced));
    }

    #[test]
    fn test_attributes_reject_children() {
        let mut tree = xml_tree(TreeSettings::default());
        let root = tree.root();
        let attr = tree
            .add_child(root, "id", NodeKind::Value, Some(&MemberMeta::new().as_attribute()))
            .unwrap();
        let err = tree.add_child(attr, "x", NodeKind::Value, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported(UnsupportedError::ChildrenNotSupported { .. })
        ));
    }

    #[test]
    fn test_children_order_and_ingestion() {
        let mut tree = xml_tree(TreeSettings::default());
        let root = tree.root();
        let attr = tree
            .add_child(root, "id", NodeKind::Value, Some(&MemberMeta::new().as_attribute()))
            .unwrap();
        let element = tree.add_child(root, "Name", NodeKind::Value, None).unwrap();
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![element, attr]);

        tree.settings_mut().ingest_attributes = false;
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![element]);
    }

    #[test]
    fn test_json_type_follows_value() {
        let mut tree =
            NodeTree::new_root(Format::Json, "", NodeKind::Object, TreeSettings::default())
                .unwrap();
        let root = tree.root();
        let count = tree.add_child(root, "count", NodeKind::Unclassified, None).unwrap();
        tree.set_value(count, Scalar::number(3));
        assert_eq!(tree.kind(count), NodeKind::Value);
        assert_eq!(tree.json_type(count), Some(JsonType::Number));

        tree.set_json_type(count, JsonType::String);
        assert_eq!(tree.json_type(count), Some(JsonType::String));
    }

    #[test]
    fn test_json_paths() {
        let mut tree =
            NodeTree::new_root(Format::Json, "", NodeKind::Object, TreeSettings::default())
                .unwrap();
        let root = tree.root();
        let items = tree.add_child(root, "items", NodeKind::Array, None).unwrap();
        tree.add_child(items, "Item", NodeKind::Value, None).unwrap();
        let second = tree.add_child(items, "Item", NodeKind::Object, None).unwrap();
        let name = tree.add_child(second, "name", NodeKind::Value, None).unwrap();
        assert_eq!(tree.path(root), "$");
        assert_eq!(tree.path(second), "$.items[1]");
        assert_eq!(tree.path(name), "$.items[1].name");
    }

    #[test]
    fn test_invalid_xml_names() {
        let err = NodeTree::new_root(Format::Xml, "", NodeKind::Object, TreeSettings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported(UnsupportedError::InvalidName { .. })
        ));
        let mut tree = xml_tree(TreeSettings::default());
        let root = tree.root();
        assert!(tree.add_child(root, "two words", NodeKind::Value, None).is_err());
        assert!(
            NodeTree::new_root(Format::Json, "", NodeKind::Object, TreeSettings::default()).is_ok()
        );
    }

    #[test]
    fn test_namespace_resolves_prefixes() {
        let mut settings = TreeSettings::default();
        settings
            .namespaces
            .insert("inv".to_string(), "urn:inventory".to_string());
        let mut tree = xml_tree(settings);
        let root = tree.root();
        tree.set_namespace(root, "inv");
        assert_eq!(tree.namespace(root), Some("urn:inventory"));
        tree.set_namespace(root, "urn:other");
        assert_eq!(tree.namespace(root), Some("urn:other"));
        tree.set_namespace(root, "");
        assert_eq!(tree.namespace(root), None);

        let child = tree
            .add_child(root, "Sku", NodeKind::Value, Some(&MemberMeta::new().namespace("inv")))
            .unwrap();
        assert_eq!(tree.namespace(child), Some("urn:inventory"));
    }
}
