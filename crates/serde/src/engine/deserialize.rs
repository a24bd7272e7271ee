//! Node trees into typed values.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::adapters::{ListTarget, MapMut, SyncMode};
use crate::error::{MismatchError, ReflectError, Result, UnsupportedError};
use crate::node::{NodeId, NodeKind, NodeTree};
use crate::options::{Context, Format, Mode, Options};
use crate::reflect::{
    Dynamic, MemberDescriptor, Reflect, Scalar, TypeDescriptor, TypeKind, describe, downcast_boxed,
};
use crate::value::{SimpleValue, Value, ValueFactory};

/// Builds typed values from node trees.
///
/// ```ignore
/// let tree = parse_xml_str(xml, TreeSettings::default())?;
/// let order: Order = Deserializer::default().deserialize(&tree)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Deserializer {
    options: Arc<Options>,
}

impl Deserializer {
    pub fn new(options: Options) -> Self {
        Self::with_shared(Arc::new(options))
    }

    pub fn with_shared(options: Arc<Options>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn deserialize<T: Reflect>(&self, tree: &NodeTree) -> Result<T> {
        let value = self.deserialize_dyn(tree, describe::<T>())?;
        Ok(downcast_boxed::<T>(value)?)
    }

    /// Deserializes the tree into a fresh instance of `ty`.
    pub fn deserialize_dyn(
        &self,
        tree: &NodeTree,
        ty: Arc<TypeDescriptor>,
    ) -> Result<Box<dyn Reflect>> {
        let context = Context::new(Arc::clone(&self.options), tree.format(), Mode::Deserialize);
        let target = ty.unshared();
        let root = tree.root();
        debug!(type_name = target.name(), format = %tree.format(), "Deserializing value");

        if context.classify(&target).is_simple() && !target.is_top() {
            return Err(UnsupportedError::SimpleRoot {
                type_name: target.name().to_string(),
            }
            .into());
        }
        let validate_root =
            self.options.validate_root_name && !self.options.ignore_case && !target.is_top();
        if tree.format() == Format::Xml && validate_root {
            let expected = context.type_name(&target);
            if expected != tree.name(root) {
                return Err(MismatchError::RootName {
                    expected,
                    actual: tree.name(root).to_string(),
                    path: tree.path(root),
                }
                .into());
            }
        }

        let reader = Reader {
            context: &context,
            tree,
            factory: ValueFactory::new(&context),
        };
        reader.read_detached(&ty, root, None, None)?.ok_or_else(|| {
            ReflectError::MissingInstance {
                type_name: ty.name().to_string(),
            }
            .into()
        })
    }
}

struct Reader<'a> {
    context: &'a Context,
    tree: &'a NodeTree,
    factory: ValueFactory<'a>,
}

impl Reader<'_> {
    fn options(&self) -> &Options {
        self.context.options()
    }

    fn is_xml(&self) -> bool {
        self.tree.format() == Format::Xml
    }

    fn is_null(&self, id: NodeId) -> bool {
        self.tree.kind(id) == NodeKind::Value && matches!(self.tree.value(id), Some(Scalar::Null))
    }

    /// Child elements; attributes never act as collection items.
    fn elements(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .raw_children(id)
            .iter()
            .copied()
            .filter(|child| !self.tree.is_attribute(*child))
            .collect()
    }

    /// Child elements followed by attributes, the latter only while both
    /// the tree and the options ingest them.
    fn children(&self, id: NodeId) -> Vec<NodeId> {
        let ingest = !self.is_xml()
            || (self.options().xml.ingest_attributes && self.tree.settings().ingest_attributes);
        let mut children = self.elements(id);
        if ingest {
            children.extend(
                self.tree
                    .raw_children(id)
                    .iter()
                    .copied()
                    .filter(|child| self.tree.is_attribute(*child)),
            );
        }
        children
    }

    fn expect_json(&self, id: NodeId, expected: NodeKind) -> Result<()> {
        let actual = self.tree.kind(id);
        if self.is_xml() || actual == expected {
            return Ok(());
        }
        Err(MismatchError::NodeKind {
            expected: expected.to_string(),
            actual: actual.to_string(),
            path: self.tree.path(id),
        }
        .into())
    }

    /// Types read by constructing an instance and filling it from the node.
    fn is_constructible(&self, ty: &TypeDescriptor) -> bool {
        !ty.is_top()
            && ty.shared().is_none()
            && !self.options().has_reader(ty)
            && !self.context.classify(ty).is_simple()
    }

    /// Reads the node into a new instance of `ty` without touching any slot
    /// of the owner. Absent when the node is null.
    fn read_detached(
        &self,
        ty: &Arc<TypeDescriptor>,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
        owner: Option<&dyn Value>,
    ) -> Result<Option<Box<dyn Reflect>>> {
        if self.is_null(id) {
            return Ok(None);
        }
        if self.is_constructible(ty) {
            let slot = self.factory.lazy(owner, Arc::clone(ty));
            self.populate(&slot, id, member)?;
            return Ok(slot.take()?);
        }
        let slot = SimpleValue::empty(Arc::clone(ty));
        self.read_into(&slot, id, member, owner)?;
        Ok(slot.into_instance())
    }

    fn read_into(
        &self,
        value: &dyn Value,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
        owner: Option<&dyn Value>,
    ) -> Result<()> {
        if self.is_null(id) {
            return Ok(());
        }
        if value.is_readonly() {
            return self.read_in_place(value, id, member);
        }

        let ty = value.specified_type();
        if self.options().has_reader(&ty) {
            let scalar = self.tree.value(id).cloned().unwrap_or(Scalar::Null);
            let instance = self.convert(&ty, &scalar, id, member)?;
            value.set_instance(instance)?;
            return Ok(());
        }
        if ty.is_top() {
            value.set_instance(self.infer(id)?)?;
            return Ok(());
        }
        if let Some(shared) = ty.shared() {
            let target = shared.target.resolve();
            if let Some(instance) = self.read_detached(&target, id, member, owner)? {
                value.set_instance(shared.wrap(instance)?)?;
            }
            return Ok(());
        }
        if self.context.classify(&ty).is_simple() {
            value.set_instance(self.read_scalar(&ty, id, member)?)?;
            return Ok(());
        }
        if let Some(instance) = self.read_detached(&ty, id, member, owner)? {
            value.set_instance(instance)?;
        }
        Ok(())
    }

    /// Read-only members are filled through their current instance.
    fn read_in_place(
        &self,
        value: &dyn Value,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<()> {
        let mutable = member.is_some_and(|member| member.can_mutate());
        if !mutable || value.instance()?.is_none() {
            debug!(path = %self.tree.path(id), "Skipped read-only member");
            return Ok(());
        }
        self.populate(value, id, member)
    }

    fn populate(
        &self,
        target: &dyn Value,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<()> {
        let ty = target.actual_type()?.unshared();
        trace!(type_name = ty.name(), path = %self.tree.path(id), "Populating value");
        match self.context.classify(&ty) {
            TypeKind::Enumerable(_) => self.populate_list(target, &ty, id, member),
            TypeKind::Dictionary(_) => self.populate_map(target, &ty, id),
            TypeKind::Object => self.populate_object(target, &ty, id),
            TypeKind::Simple => {
                debug!(path = %self.tree.path(id), "Skipped in-place read of a simple value");
                Ok(())
            }
        }
    }

    fn populate_list(
        &self,
        target: &dyn Value,
        ty: &Arc<TypeDescriptor>,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<()> {
        self.expect_json(id, NodeKind::Array)?;
        let items = self.elements(id);
        let item_ty = item_type(ty);
        let expected = member
            .filter(|_| self.is_xml())
            .and_then(|member| self.context.item_name(member, ty));
        if let Some(expected) = expected
            && let Some(item) = items
                .iter()
                .find(|item| !self.context.names_match(&expected, self.tree.name(**item)))
        {
            if !self.options().ignore_unmatched_nodes {
                return Err(MismatchError::ItemName {
                    expected,
                    actual: self.tree.name(*item).to_string(),
                    path: self.tree.path(*item),
                }
                .into());
            }
            debug!(
                expected = %expected,
                path = %self.tree.path(*item),
                "Ignored item name mismatch"
            );
        }
        self.fill_list(target, &item_ty, &items)
    }

    fn fill_list(
        &self,
        target: &dyn Value,
        item_ty: &Arc<TypeDescriptor>,
        items: &[NodeId],
    ) -> Result<()> {
        let mut list = ListTarget::create(target, SyncMode::Deferred)?;
        for item in items {
            if let Some(instance) = self.read_detached(item_ty, *item, None, Some(target))? {
                list.push(instance)?;
            }
        }
        list.finish()
    }

    fn populate_map(&self, target: &dyn Value, ty: &Arc<TypeDescriptor>, id: NodeId) -> Result<()> {
        self.expect_json(id, NodeKind::Object)?;
        let (key_ty, value_ty) = match ty.map() {
            Some(info) => (info.key.resolve(), info.value.resolve()),
            None => (describe::<Dynamic>(), describe::<Dynamic>()),
        };

        let mut entries = Vec::new();
        for child in self.children(id) {
            let name = Scalar::Text(self.tree.name(child).to_string());
            let key: Box<dyn Reflect> = if key_ty.is_top() {
                Box::new(name.as_text().into_owned())
            } else {
                self.convert(&key_ty, &name, child, None)?
            };
            if let Some(value) = self.read_detached(&value_ty, child, None, Some(target))? {
                entries.push((key, value));
            }
        }

        let mut guard = target
            .instance_mut()?
            .ok_or_else(|| ReflectError::MissingInstance {
                type_name: ty.name().to_string(),
            })?;
        let mut map = MapMut::create(&mut *guard)?;
        for (key, value) in entries {
            map.as_map().insert(key, value)?;
        }
        Ok(())
    }

    fn populate_object(
        &self,
        target: &dyn Value,
        ty: &Arc<TypeDescriptor>,
        id: NodeId,
    ) -> Result<()> {
        self.expect_json(id, NodeKind::Object)?;
        if self.is_xml()
            && self.tree.kind(id) == NodeKind::Value
            && self
                .tree
                .value(id)
                .is_some_and(|value| !value.as_text().trim().is_empty())
        {
            return Err(MismatchError::NodeKind {
                expected: NodeKind::Object.to_string(),
                actual: NodeKind::Value.to_string(),
                path: self.tree.path(id),
            }
            .into());
        }

        let context = self.context;
        let members: Vec<&Arc<MemberDescriptor>> = ty.members_for(self.options()).collect();
        let mut names = Vec::with_capacity(members.len());
        let mut item_names = Vec::with_capacity(members.len());
        for member in &members {
            let specified = self.factory.member(target, member)?.specified_type().unshared();
            names.push(context.member_name(member, &specified));
            item_names.push((self.is_xml() && member.meta().is_siblings()).then(|| {
                context
                    .item_name(member, &specified)
                    .unwrap_or_else(|| context.type_name(&item_type(&specified).unshared()))
            }));
        }

        let mut siblings: Vec<Vec<NodeId>> = vec![Vec::new(); members.len()];
        for child in self.children(id) {
            let name = self.tree.name(child);
            let sibling = item_names.iter().position(|item| {
                item.as_deref()
                    .is_some_and(|item| context.names_match(item, name))
            });
            if let Some(index) = sibling {
                siblings[index].push(child);
                continue;
            }

            match names.iter().position(|member| context.names_match(member, name)) {
                Some(index) => {
                    let member = members[index];
                    let value = self.factory.member(target, member)?;
                    self.read_into(&value, child, Some(member), Some(target))?;
                }
                None if self.options().ignore_unmatched_nodes => {
                    debug!(node = name, path = %self.tree.path(child), "Ignored unmatched node");
                }
                None => {
                    return Err(MismatchError::UnmatchedNode {
                        type_name: ty.name().to_string(),
                        name: name.to_string(),
                        path: self.tree.path(child),
                    }
                    .into());
                }
            }
        }

        for (member, nodes) in members.iter().zip(&siblings) {
            if !nodes.is_empty() {
                self.read_siblings(target, member, nodes)?;
            }
        }
        Ok(())
    }

    /// Collects same-named child elements into one collection member.
    fn read_siblings(
        &self,
        target: &dyn Value,
        member: &Arc<MemberDescriptor>,
        nodes: &[NodeId],
    ) -> Result<()> {
        let value = self.factory.member(target, member)?;
        let ty = value.specified_type().unshared();
        let item_ty = item_type(&ty);
        if value.is_readonly() {
            if !member.can_mutate() || value.instance()?.is_none() {
                debug!(member = member.name(), "Skipped read-only siblings member");
                return Ok(());
            }
            return self.fill_list(&value, &item_ty, nodes);
        }

        let slot = self.factory.lazy(Some(target), Arc::clone(&ty));
        self.fill_list(&slot, &item_ty, nodes)?;
        if let Some(list) = slot.take()? {
            value.set_instance(list)?;
        }
        Ok(())
    }

    fn read_scalar(
        &self,
        ty: &Arc<TypeDescriptor>,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<Box<dyn Reflect>> {
        let kind = self.tree.kind(id);
        if kind == NodeKind::Object || kind == NodeKind::Array {
            return Err(MismatchError::NodeKind {
                expected: NodeKind::Value.to_string(),
                actual: kind.to_string(),
                path: self.tree.path(id),
            }
            .into());
        }
        let scalar = self
            .tree
            .value(id)
            .cloned()
            .unwrap_or_else(|| Scalar::Text(String::new()));
        self.convert(ty, &scalar, id, member)
    }

    /// Converts scalar content through a registered reader, the enum
    /// variants, or the type's own scalar conversion.
    fn convert(
        &self,
        ty: &Arc<TypeDescriptor>,
        scalar: &Scalar,
        id: NodeId,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<Box<dyn Reflect>> {
        let invalid = |reason: String| MismatchError::InvalidValue {
            type_name: ty.name().to_string(),
            value: scalar.as_text().into_owned(),
            path: self.tree.path(id),
            reason,
        };

        let context = self.context;
        let options = context.options();
        if options.has_reader(ty) {
            let node = context.node_context(Arc::clone(ty), member.cloned(), self.tree.path(id));
            if let Some(result) = options.read_with_hook(scalar, &node) {
                return Ok(result.map_err(invalid)?);
            }
        }
        if let Some(enumeration) = ty.enumeration() {
            let text = scalar.as_text();
            let text = text.trim();
            let variant = enumeration
                .variants()
                .iter()
                .find(|variant| context.names_match(&context.enum_name(ty, *variant), text));
            return variant
                .and_then(|variant| enumeration.from_identifier(variant))
                .ok_or_else(|| invalid("unknown enum value".to_string()).into());
        }
        match ty.scalar() {
            Some(info) => Ok(info.read(scalar).map_err(invalid)?),
            None => Err(ReflectError::Unsupported {
                type_name: ty.name().to_string(),
                operation: "scalar conversion",
            }
            .into()),
        }
    }

    /// Builds a value for a top-typed slot from the node's own shape.
    fn infer(&self, id: NodeId) -> Result<Box<dyn Reflect>> {
        match self.tree.kind(id) {
            NodeKind::Array => self.infer_items(&self.elements(id)),
            NodeKind::Object => {
                let children = self.children(id);
                let repeated = self.is_xml()
                    && children.len() > 1
                    && children
                        .iter()
                        .all(|child| self.tree.name(*child) == self.tree.name(children[0]));
                if repeated {
                    return self.infer_items(&children);
                }
                let mut members = HashMap::new();
                for child in children {
                    if self.is_null(child) {
                        continue;
                    }
                    let value = Dynamic::from_boxed(self.infer(child)?);
                    members.insert(self.tree.name(child).to_string(), value);
                }
                Ok(Box::new(members))
            }
            NodeKind::Value | NodeKind::Unclassified => {
                let value: Box<dyn Reflect> = match self.tree.value(id) {
                    Some(Scalar::Bool(flag)) => Box::new(*flag),
                    Some(Scalar::Number(text)) => infer_number(text),
                    Some(Scalar::Text(text)) => Box::new(text.clone()),
                    Some(Scalar::Null) | None => Box::new(String::new()),
                };
                Ok(value)
            }
        }
    }

    fn infer_items(&self, items: &[NodeId]) -> Result<Box<dyn Reflect>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if !self.is_null(*item) {
                values.push(Dynamic::from_boxed(self.infer(*item)?));
            }
        }
        Ok(Box::new(values))
    }
}

fn item_type(ty: &TypeDescriptor) -> Arc<TypeDescriptor> {
    ty.item_type()
        .map(|item| item.resolve())
        .unwrap_or_else(describe::<Dynamic>)
}

fn infer_number(text: &str) -> Box<dyn Reflect> {
    if let Ok(value) = text.parse::<i64>() {
        Box::new(value)
    } else if let Ok(value) = text.parse::<u64>() {
        Box::new(value)
    } else if let Ok(value) = text.parse::<f64>() {
        Box::new(value)
    } else {
        Box::new(text.to_string())
    }
}
