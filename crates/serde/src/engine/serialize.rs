//! Typed values into node trees.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::adapters;
use crate::error::{ReflectError, Result};
use crate::node::{NodeId, NodeKind, NodeTree, TreeSettings};
use crate::options::{Context, Format, Mode, Options};
use crate::reflect::{
    MemberDescriptor, Reflect, ReflectRef, Scalar, TypeDescriptor, TypeKind, describe,
};
use crate::value::{SimpleValue, Value, ValueFactory};

/// Builds node trees from typed values.
///
/// ```ignore
/// let serializer = Serializer::new(Options::new().with_pretty_print(true));
/// let tree = serializer.serialize(&order, Format::Xml)?;
/// let xml = tree.encode_to_string()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    options: Arc<Options>,
}

impl Serializer {
    pub fn new(options: Options) -> Self {
        Self::with_shared(Arc::new(options))
    }

    pub fn with_shared(options: Arc<Options>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn serialize<T: Reflect>(&self, value: &T, format: Format) -> Result<NodeTree> {
        self.serialize_value(value.as_reflect(), describe::<T>(), format)
    }

    /// Serializes an erased value declared as `declared`. The tree follows
    /// the runtime type of every instance it meets.
    pub fn serialize_value(
        &self,
        value: &(dyn Reflect + 'static),
        declared: Arc<TypeDescriptor>,
        format: Format,
    ) -> Result<NodeTree> {
        let context = Context::new(Arc::clone(&self.options), format, Mode::Serialize);
        let root = ValueFactory::new(&context).root(value, declared);
        let actual = root.actual_type()?.unshared();
        debug!(type_name = actual.name(), %format, "Serializing value");

        let name = match format {
            Format::Xml => context.type_name(&actual),
            Format::Json => String::new(),
        };
        let mut walker = Walker {
            context: &context,
            tree: NodeTree::new_root(
                format,
                name,
                node_kind(&context, &actual),
                TreeSettings::from_options(&self.options),
            )?,
            ancestors: Vec::new(),
        };
        let root_id = walker.tree.root();
        if format == Format::Xml
            && let Some(namespace) = actual.meta().namespace.as_deref()
        {
            walker.tree.set_namespace(root_id, namespace);
        }

        let instance = root.instance()?;
        match instance.as_deref() {
            Some(instance) => walker.write(root_id, instance, None)?,
            None => walker.tree.set_value(root_id, Scalar::Null),
        }
        drop(instance);
        Ok(walker.tree)
    }
}

fn node_kind(context: &Context, ty: &TypeDescriptor) -> NodeKind {
    if context.options().has_writer(ty) {
        return NodeKind::Value;
    }
    match context.classify(ty) {
        TypeKind::Simple => NodeKind::Value,
        TypeKind::Enumerable(_) => NodeKind::Array,
        TypeKind::Dictionary(_) | TypeKind::Object => NodeKind::Object,
    }
}

struct Walker<'c> {
    context: &'c Context,
    tree: NodeTree,
    /// Identities of the shared instances on the current path.
    ancestors: Vec<usize>,
}

impl Walker<'_> {
    fn is_suppressed(&self, instance: &dyn Reflect) -> bool {
        match instance.resolve().reflect_ref() {
            ReflectRef::Shared(shared) => self.ancestors.contains(&shared.identity()),
            _ => false,
        }
    }

    fn write(
        &mut self,
        id: NodeId,
        instance: &dyn Reflect,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<()> {
        let instance = instance.resolve();
        if let ReflectRef::Shared(shared) = instance.reflect_ref() {
            let target = shared.target()?;
            self.ancestors.push(shared.identity());
            let result = self.write(id, &*target, member);
            self.ancestors.pop();
            return result;
        }

        let context = self.context;
        let ty = instance.descriptor();
        let kind = context.classify(&ty);
        if context.options().has_writer(&ty) || kind.is_simple() {
            let scalar = self.scalar(instance, &ty, member, id)?;
            self.tree.set_value(id, scalar);
        } else {
            trace!(type_name = ty.name(), path = %self.tree.path(id), "Writing node");
            match kind {
                TypeKind::Enumerable(_) => self.write_items(id, instance, &ty, member)?,
                TypeKind::Dictionary(_) => self.write_entries(id, instance)?,
                TypeKind::Object | TypeKind::Simple => self.write_members(id, instance, &ty)?,
            }
        }
        self.visit(id, ty, member);
        Ok(())
    }

    fn scalar(
        &self,
        value: &dyn Reflect,
        ty: &Arc<TypeDescriptor>,
        member: Option<&Arc<MemberDescriptor>>,
        id: NodeId,
    ) -> Result<Scalar> {
        let context = self.context;
        let options = context.options();
        if options.has_writer(ty) {
            let node = context.node_context(Arc::clone(ty), member.cloned(), self.tree.path(id));
            if let Some(scalar) = options.write_with_hook(value, &node) {
                return Ok(scalar);
            }
        }
        if let Some(enumeration) = ty.enumeration() {
            let identifier =
                enumeration
                    .identifier(value)
                    .ok_or_else(|| ReflectError::TypeMismatch {
                        expected: ty.name().to_string(),
                        actual: value.type_key().path().to_string(),
                    })?;
            return Ok(Scalar::Text(context.enum_name(ty, identifier)));
        }
        let scalar = ty.scalar().and_then(|scalar| scalar.write(value));
        scalar.ok_or_else(|| {
            ReflectError::Unsupported {
                type_name: ty.name().to_string(),
                operation: "scalar conversion",
            }
            .into()
        })
    }

    /// Adds one child of `parent` per item. Siblings members pass the
    /// member's parent node, so items land next to the other members.
    fn write_items(
        &mut self,
        parent: NodeId,
        instance: &dyn Reflect,
        ty: &Arc<TypeDescriptor>,
        member: Option<&Arc<MemberDescriptor>>,
    ) -> Result<()> {
        let context = self.context;
        let item_name = member.and_then(|member| context.item_name(member, ty));
        let Some(items) = adapters::items(instance) else {
            return Ok(());
        };
        for item in items {
            if self.is_suppressed(item) {
                debug!(path = %self.tree.path(parent), "Suppressed circular reference");
                continue;
            }
            let item_ty = item.resolve().descriptor().unshared();
            let name = item_name
                .clone()
                .unwrap_or_else(|| context.type_name(&item_ty));
            let child = self
                .tree
                .add_child(parent, name, node_kind(context, &item_ty), None)?;
            if context.format() == Format::Xml
                && let Some(namespace) = item_ty.meta().namespace.as_deref()
            {
                self.tree.set_namespace(child, namespace);
            }
            self.write(child, item, None)?;
        }
        Ok(())
    }

    fn write_entries(&mut self, parent: NodeId, instance: &dyn Reflect) -> Result<()> {
        let Some(entries) = adapters::entries(instance) else {
            return Ok(());
        };
        for (key, value) in entries {
            if self.is_suppressed(value) {
                debug!(path = %self.tree.path(parent), "Suppressed circular reference");
                continue;
            }
            let key_ty = key.resolve().descriptor();
            let name = self.scalar(key, &key_ty, None, parent)?.as_text().into_owned();
            let value_ty = value.resolve().descriptor().unshared();
            let child = self
                .tree
                .add_child(parent, name, node_kind(self.context, &value_ty), None)?;
            self.write(child, value, None)?;
        }
        Ok(())
    }

    fn write_members(
        &mut self,
        id: NodeId,
        instance: &(dyn Reflect + 'static),
        ty: &Arc<TypeDescriptor>,
    ) -> Result<()> {
        let context = self.context;
        let options = context.options();
        let factory = ValueFactory::new(context);
        let owner = SimpleValue::borrowed(instance, Arc::clone(ty));

        for member in ty.members_for(options) {
            let value = factory.member(&owner, member)?;
            let guard = value.instance()?;
            let Some(child) = guard.as_deref() else {
                if options.serialize_null_members {
                    let name = context.member_name(member, &member.declared_type());
                    let node = self
                        .tree
                        .add_child(id, name, NodeKind::Value, Some(member.meta()))?;
                    self.tree.set_value(node, Scalar::Null);
                }
                continue;
            };
            if self.is_suppressed(child) {
                debug!(
                    member = member.name(),
                    path = %self.tree.path(id),
                    "Suppressed circular reference"
                );
                continue;
            }

            let child_ty = value.specified_type().unshared();
            let kind = node_kind(context, &child_ty);
            if kind == NodeKind::Array
                && member.meta().is_siblings()
                && context.format() == Format::Xml
            {
                self.write_items(id, child, &child_ty, Some(member))?;
                continue;
            }
            let name = context.member_name(member, &child_ty);
            let node = self.tree.add_child(id, name, kind, Some(member.meta()))?;
            self.write(node, child, Some(member))?;
        }
        Ok(())
    }

    fn visit(
        &mut self,
        id: NodeId,
        ty: Arc<TypeDescriptor>,
        member: Option<&Arc<MemberDescriptor>>,
    ) {
        let context = self.context;
        let options = context.options();
        if !options.has_visitors() {
            return;
        }
        let node_context = context.node_context(ty, member.cloned(), self.tree.path(id));
        let mut node = self.tree.node_mut(id);
        options.visit(&mut node, &node_context);
    }
}
