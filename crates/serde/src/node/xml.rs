//! XML realization of the node tree.
//!
//! Parsing reads quick-xml events into elements and attributes, resolving
//! namespace prefixes against the declarations in scope. Encoding writes the
//! tree back through a quick-xml `Writer`, declaring every namespace on the
//! root element.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufWriter, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::trace;

use super::{BOM, NodeId, NodeKind, NodeTree, Shape, TreeSettings, strip_bom};
use crate::error::{Error, ParseError, Result};
use crate::options::{Encoding, Format};
use crate::reflect::Scalar;

/// Parses an XML document into a node tree.
///
/// ```ignore
/// let tree = parse_xml_str(r#"<Order id="7"><Total>9.50</Total></Order>"#, TreeSettings::default())?;
/// assert_eq!(tree.name(tree.root()), "Order");
/// ```
pub fn parse_xml(bytes: &[u8], settings: TreeSettings) -> Result<NodeTree> {
    let mut reader = Reader::from_reader(strip_bom(bytes));
    TreeBuilder::new(settings).run(&mut reader)
}

pub fn parse_xml_str(text: &str, settings: TreeSettings) -> Result<NodeTree> {
    parse_xml(text.as_bytes(), settings)
}

/// Parses an XML document from a reader. The input is buffered in full.
pub fn parse_xml_reader<R: BufRead>(mut reader: R, settings: TreeSettings) -> Result<NodeTree> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_xml(&bytes, settings)
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Expands a general entity or character reference.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    let expanded = match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => return None,
    };
    Some(expanded.to_string())
}

struct OpenElement {
    id: NodeId,
    text: String,
}

struct TreeBuilder {
    settings: Option<TreeSettings>,
    tree: Option<NodeTree>,
    open: Vec<OpenElement>,
    /// Namespace declarations per open element, prefix to URI ("" is the default).
    scopes: Vec<BTreeMap<String, String>>,
    names: Vec<String>,
}

impl TreeBuilder {
    fn new(settings: TreeSettings) -> Self {
        Self {
            settings: Some(settings),
            tree: None,
            open: Vec::new(),
            scopes: Vec::new(),
            names: Vec::new(),
        }
    }

    fn location(&self) -> Option<String> {
        if self.names.is_empty() {
            return None;
        }
        Some(format!("/{}", self.names.join("/")))
    }

    fn error(&self, message: impl fmt::Display) -> Error {
        ParseError::new(Format::Xml, message.to_string(), self.location()).into()
    }

    fn run<R: BufRead>(mut self, reader: &mut Reader<R>) -> Result<NodeTree> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = reader.buffer_position();
                    return Err(self.error(format!("{e} (byte {position})")));
                }
            };
            match event {
                Event::Start(start) => self.open(&start)?,
                Event::Empty(start) => {
                    self.open(&start)?;
                    self.close()?;
                }
                Event::End(_) => self.close()?,
                Event::Text(text) => {
                    let raw = String::from_utf8_lossy(&text).into_owned();
                    let unescaped = quick_xml::escape::unescape(&raw)
                        .map_err(|e| self.error(e))?
                        .into_owned();
                    self.push_text(&unescaped)?;
                }
                Event::CData(cdata) => {
                    let text = String::from_utf8_lossy(&cdata).into_owned();
                    self.push_text(&text)?;
                }
                Event::GeneralRef(reference) => {
                    let name = String::from_utf8_lossy(&reference).into_owned();
                    let expanded = resolve_reference(&name)
                        .ok_or_else(|| self.error(format!("unknown entity reference '&{name};'")))?;
                    self.push_text(&expanded)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !self.open.is_empty() {
            return Err(self.error("unexpected end of document"));
        }
        let tree = self
            .tree
            .ok_or_else(|| ParseError::new(Format::Xml, "document has no root element", None))?;
        trace!(nodes = tree.len(), "Parsed XML document");
        Ok(tree)
    }

    fn lookup(&self, prefix: Option<&str>) -> Result<Option<String>> {
        let key = prefix.unwrap_or("");
        if key == "xml" {
            return Ok(Some("http://www.w3.org/XML/1998/namespace".to_string()));
        }
        let found = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(key))
            .filter(|uri| !uri.is_empty())
            .cloned();
        match (prefix, found) {
            (Some(prefix), None) => Err(self.error(format!("undeclared namespace prefix '{prefix}'"))),
            (_, found) => Ok(found),
        }
    }

    fn open(&mut self, start: &BytesStart<'_>) -> Result<()> {
        let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if self.open.is_empty() && self.tree.is_some() {
            return Err(self.error(format!("second root element '{qname}'")));
        }
        self.names.push(qname.clone());

        let mut declared = BTreeMap::new();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.error(e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = quick_xml::escape::unescape(&raw)
                .map_err(|e| self.error(e))?
                .into_owned();
            if key == "xmlns" {
                declared.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.insert(prefix.to_string(), value);
            } else {
                attributes.push((key, value));
            }
        }
        self.scopes.push(declared.clone());

        let (prefix, local) = split_qname(&qname);
        let namespace = self.lookup(prefix)?;
        let id = match self.open.last().map(|element| element.id) {
            Some(parent) => self.tree_mut()?.push_parsed(
                parent,
                local.to_string(),
                NodeKind::Unclassified,
                Shape::Element,
                namespace,
            ),
            None => {
                let settings = self.settings.take().unwrap_or_default();
                let mut tree =
                    NodeTree::new_root(Format::Xml, local, NodeKind::Unclassified, settings)?;
                let root = tree.root();
                tree.data_mut(root).namespace = namespace;
                self.tree = Some(tree);
                root
            }
        };

        let mut resolved = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            let (prefix, local) = split_qname(&key);
            // Unprefixed attributes are in no namespace.
            let namespace = match prefix {
                Some(_) => self.lookup(prefix)?,
                None => None,
            };
            resolved.push((local.to_string(), value, namespace));
        }

        let tree = self.tree_mut()?;
        for (prefix, uri) in declared {
            let settings = tree.settings_mut();
            if prefix.is_empty() {
                settings.default_namespace.get_or_insert(uri);
            } else {
                settings.namespaces.entry(prefix).or_insert(uri);
            }
        }
        for (name, value, namespace) in resolved {
            let attr = tree.push_parsed(id, name, NodeKind::Value, Shape::Attribute, namespace);
            tree.data_mut(attr).value = Some(Scalar::Text(value));
        }

        self.open.push(OpenElement {
            id,
            text: String::new(),
        });
        Ok(())
    }

    fn tree_mut(&mut self) -> Result<&mut NodeTree> {
        match self.tree.as_mut() {
            Some(tree) => Ok(tree),
            None => Err(ParseError::new(Format::Xml, "no root element open", None).into()),
        }
    }

    fn push_text(&mut self, text: &str) -> Result<()> {
        match self.open.last_mut() {
            Some(element) => {
                element.text.push_str(text);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(self.error("text outside the root element")),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(element) = self.open.pop() else {
            return Err(self.error("unbalanced end tag"));
        };
        self.scopes.pop();
        self.names.pop();
        let Some(tree) = self.tree.as_mut() else {
            return Ok(());
        };

        let data = tree.data_mut(element.id);
        if data.children.is_empty() {
            data.kind = NodeKind::Value;
            data.value = Some(Scalar::Text(element.text));
        } else {
            data.kind = NodeKind::Object;
            if !element.text.trim().is_empty() {
                data.value = Some(Scalar::Text(element.text));
            }
        }
        Ok(())
    }
}

fn encode_error(e: impl fmt::Display) -> Error {
    Error::Encode {
        format: Format::Xml,
        message: e.to_string(),
    }
}

/// Prefix assignments for every namespace used in a tree.
struct Prefixes {
    default: Option<String>,
    by_uri: BTreeMap<String, String>,
    declarations: Vec<(String, String)>,
}

impl Prefixes {
    fn collect(tree: &NodeTree) -> Self {
        let settings = tree.settings();
        let default = settings
            .default_namespace
            .clone()
            .filter(|uri| !uri.is_empty());
        let mut declarations = Vec::new();
        if let Some(uri) = &default {
            declarations.push(("xmlns".to_string(), uri.clone()));
        }

        let mut by_uri = BTreeMap::new();
        for (prefix, uri) in &settings.namespaces {
            by_uri.entry(uri.clone()).or_insert_with(|| prefix.clone());
            declarations.push((format!("xmlns:{prefix}"), uri.clone()));
        }

        let mut generated = 0usize;
        for id in tree.descendants() {
            let Some(uri) = tree.namespace(id) else {
                continue;
            };
            let in_default = !tree.is_attribute(id) && default.as_deref() == Some(uri);
            if in_default || by_uri.contains_key(uri) {
                continue;
            }
            let prefix = loop {
                let candidate = format!("ns{generated}");
                generated += 1;
                if !settings.namespaces.contains_key(&candidate) {
                    break candidate;
                }
            };
            declarations.push((format!("xmlns:{prefix}"), uri.to_string()));
            by_uri.insert(uri.to_string(), prefix);
        }

        Self {
            default,
            by_uri,
            declarations,
        }
    }

    fn qualify(&self, tree: &NodeTree, id: NodeId) -> String {
        let name = tree.name(id);
        let Some(uri) = tree.namespace(id) else {
            return name.to_string();
        };
        if !tree.is_attribute(id) && self.default.as_deref() == Some(uri) {
            return name.to_string();
        }
        match self.by_uri.get(uri) {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_string(),
        }
    }
}

pub(super) fn encode<W: Write>(tree: &NodeTree, writer: W, encoding: Encoding) -> Result<()> {
    let mut out = BufWriter::new(writer);
    if encoding == Encoding::Utf8Bom {
        out.write_all(BOM)?;
    }

    let settings = tree.settings();
    let mut writer = if settings.pretty_print {
        Writer::new_with_indent(&mut out, b' ', 2)
    } else {
        Writer::new(&mut out)
    };
    if !settings.omit_declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(encode_error)?;
    }

    let prefixes = Prefixes::collect(tree);
    write_element(&mut writer, tree, tree.root(), &prefixes, true)?;
    drop(writer);
    out.flush()?;
    trace!(nodes = tree.len(), "Encoded XML document");
    Ok(())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    tree: &NodeTree,
    id: NodeId,
    prefixes: &Prefixes,
    is_root: bool,
) -> Result<()> {
    let name = prefixes.qualify(tree, id);
    let mut element = BytesStart::new(name.as_str());
    if is_root {
        for (key, uri) in &prefixes.declarations {
            element.push_attribute((key.as_str(), uri.as_str()));
        }
    }

    let (attributes, elements): (Vec<NodeId>, Vec<NodeId>) = tree
        .raw_children(id)
        .iter()
        .copied()
        .partition(|child| tree.is_attribute(*child));
    for attr in attributes {
        let key = prefixes.qualify(tree, attr);
        let value = tree
            .value(attr)
            .map(|scalar| scalar.as_text().into_owned())
            .unwrap_or_default();
        element.push_attribute((key.as_str(), value.as_str()));
    }

    let text = tree
        .value(id)
        .map(|scalar| scalar.as_text().into_owned())
        .filter(|text| !text.is_empty());
    if elements.is_empty() && text.is_none() {
        writer
            .write_event(Event::Empty(element))
            .map_err(encode_error)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(element))
        .map_err(encode_error)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(encode_error)?;
    }
    for child in elements {
        write_element(writer, tree, child, prefixes, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(encode_error)?;
    Ok(())
}
