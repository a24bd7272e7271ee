//! Type and member descriptors.
//!
//! [`TypeInfo`] is the raw declaration a type hands out from
//! [`Reflect::type_info`]; [`TypeDescriptor`] is the classified, immutable
//! form stored in the cache.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use super::collections::{GenericCollection, GenericDictionary, ListOps, MapOps};
use super::{Dynamic, Reflect, Scalar, Shared, TypeKey, describe, downcast_boxed};
use crate::error::ReflectError;
use crate::options::Options;

/// Structural classification of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Simple,
    Enumerable(EnumerableKind),
    Dictionary(DictionaryKind),
    Object,
}

impl TypeKind {
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeKind::Simple)
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(self, TypeKind::Enumerable(_))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, TypeKind::Dictionary(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumerableKind {
    Array,
    GenericList,
    NonGenericList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryKind {
    Generic,
    NonGeneric,
}

/// How instances of a type are created during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorKind {
    /// Factory receives the parent instance being populated.
    WithParent,
    /// Parameterless factory.
    Default,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    NonPublic,
}

/// Type-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeMeta {
    /// Explicit name used for document roots and type-named nodes.
    pub root_name: Option<String>,
    pub namespace: Option<String>,
}

/// Member-level metadata controlling naming and XML placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberMeta {
    pub rename: Option<String>,
    pub xml_attribute: Option<String>,
    pub xml_element: Option<String>,
    pub xml_array: Option<String>,
    pub item_name: Option<String>,
    pub siblings: Option<String>,
    pub namespace: Option<String>,
    pub visibility: Visibility,
    pub ignored: bool,
    pub included: bool,
}

impl MemberMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Writes the member as an XML attribute with the given name.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.xml_attribute = Some(name.into());
        self
    }

    /// Writes the member as an XML attribute under its default name.
    pub fn as_attribute(self) -> Self {
        self.attribute("")
    }

    pub fn element(mut self, name: impl Into<String>) -> Self {
        self.xml_element = Some(name.into());
        self
    }

    /// Forces an XML element even when values default to attributes.
    pub fn as_element(self) -> Self {
        self.element("")
    }

    pub fn array(mut self, name: impl Into<String>) -> Self {
        self.xml_array = Some(name.into());
        self
    }

    pub fn item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = Some(name.into());
        self
    }

    /// Writes collection items directly into the parent element.
    pub fn siblings(mut self, name: impl Into<String>) -> Self {
        self.siblings = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Includes a non-public member regardless of options.
    pub fn include(mut self) -> Self {
        self.included = true;
        self
    }

    pub fn is_attribute(&self) -> bool {
        self.xml_attribute.is_some()
    }

    pub fn is_element(&self) -> bool {
        self.xml_element.is_some()
    }

    pub fn is_siblings(&self) -> bool {
        self.siblings.is_some()
    }
}

/// Lazily resolved reference to a type's descriptor.
///
/// Members and collections hold handles instead of descriptors so recursive
/// types never resolve each other while being described.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    key: TypeKey,
    describe: fn() -> Arc<TypeDescriptor>,
}

impl TypeHandle {
    pub fn of<T: Reflect>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            describe: describe::<T>,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn resolve(&self) -> Arc<TypeDescriptor> {
        (self.describe)()
    }

    /// Whether this is the universal top type.
    pub fn is_top(&self) -> bool {
        self.key == TypeKey::of::<Dynamic>()
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.key.path())
    }
}

type Factory = Arc<dyn Fn(Option<&dyn Reflect>) -> Box<dyn Reflect> + Send + Sync>;

#[derive(Clone)]
struct Constructor {
    kind: ConstructorKind,
    factory: Factory,
}

/// Conversion between a simple type and its scalar representation.
#[derive(Clone, Copy)]
pub struct ScalarInfo {
    write: fn(&dyn Reflect) -> Option<Scalar>,
    read: fn(&Scalar) -> Result<Box<dyn Reflect>, String>,
}

impl ScalarInfo {
    pub fn new(
        write: fn(&dyn Reflect) -> Option<Scalar>,
        read: fn(&Scalar) -> Result<Box<dyn Reflect>, String>,
    ) -> Self {
        Self { write, read }
    }

    pub fn write(&self, value: &dyn Reflect) -> Option<Scalar> {
        (self.write)(value.resolve())
    }

    pub fn read(&self, scalar: &Scalar) -> Result<Box<dyn Reflect>, String> {
        (self.read)(scalar)
    }
}

type IdentOf = Arc<dyn Fn(&dyn Reflect) -> Option<&'static str> + Send + Sync>;
type FromIdent = Arc<dyn Fn(&str) -> Option<Box<dyn Reflect>> + Send + Sync>;

/// Variant table of a unit-like enum.
#[derive(Clone)]
pub struct EnumInfo {
    variants: Vec<&'static str>,
    ident_of: IdentOf,
    from_ident: FromIdent,
}

impl EnumInfo {
    pub fn variants(&self) -> &[&'static str] {
        &self.variants
    }

    /// Identifier of the variant held by `value`.
    pub fn identifier(&self, value: &dyn Reflect) -> Option<&'static str> {
        (self.ident_of)(value.resolve())
    }

    pub fn from_identifier(&self, identifier: &str) -> Option<Box<dyn Reflect>> {
        (self.from_ident)(identifier)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListInfo {
    pub item: TypeHandle,
    /// Present for generic-only collections.
    pub ops: Option<ListOps>,
}

#[derive(Clone, Copy)]
pub struct ArrayInfo {
    pub item: TypeHandle,
    build: fn(Vec<Box<dyn Reflect>>) -> Result<Box<dyn Reflect>, ReflectError>,
}

impl ArrayInfo {
    /// Builds a fixed-size array from loose items.
    pub fn build(&self, items: Vec<Box<dyn Reflect>>) -> Result<Box<dyn Reflect>, ReflectError> {
        (self.build)(items)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MapInfo {
    pub key: TypeHandle,
    pub value: TypeHandle,
    /// Present for generic-only dictionaries.
    pub ops: Option<MapOps>,
}

#[derive(Clone, Copy)]
pub struct SharedInfo {
    pub target: TypeHandle,
    wrap: fn(Box<dyn Reflect>) -> Result<Box<dyn Reflect>, ReflectError>,
}

impl SharedInfo {
    /// Wraps a target instance into a fresh shared handle.
    pub fn wrap(&self, target: Box<dyn Reflect>) -> Result<Box<dyn Reflect>, ReflectError> {
        (self.wrap)(target)
    }
}

pub(crate) trait MemberAccess: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Reflect) -> Option<&'a (dyn Reflect + 'static)>;
    fn get_mut<'a>(
        &self,
        owner: &'a mut (dyn Reflect + 'static),
    ) -> Option<&'a mut (dyn Reflect + 'static)>;
    fn set(
        &self,
        owner: &mut (dyn Reflect + 'static),
        value: Box<dyn Reflect>,
    ) -> Result<(), ReflectError>;
    fn can_write(&self) -> bool;
    fn can_mutate(&self) -> bool;
}

struct Accessor<T, F> {
    get: fn(&T) -> Option<&F>,
    get_mut: Option<fn(&mut T) -> Option<&mut F>>,
    set: Option<fn(&mut T, F)>,
}

impl<T: Reflect, F: Reflect> MemberAccess for Accessor<T, F> {
    fn get<'a>(&self, owner: &'a dyn Reflect) -> Option<&'a (dyn Reflect + 'static)> {
        let owner = owner.resolve().as_any().downcast_ref::<T>()?;
        (self.get)(owner).map(|value| Reflect::resolve(value))
    }

    fn get_mut<'a>(
        &self,
        owner: &'a mut (dyn Reflect + 'static),
    ) -> Option<&'a mut (dyn Reflect + 'static)> {
        let get_mut = self.get_mut?;
        let owner = owner.resolve_mut().as_any_mut().downcast_mut::<T>()?;
        get_mut(owner).map(|value| Reflect::resolve_mut(value))
    }

    fn set(
        &self,
        owner: &mut (dyn Reflect + 'static),
        value: Box<dyn Reflect>,
    ) -> Result<(), ReflectError> {
        let Some(set) = self.set else {
            return Err(ReflectError::Unsupported {
                type_name: std::any::type_name::<T>().to_string(),
                operation: "member assignment",
            });
        };
        let owner = owner
            .resolve_mut()
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| ReflectError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                actual: "unrelated owner".to_string(),
            })?;
        set(owner, downcast_boxed::<F>(value)?);
        Ok(())
    }

    fn can_write(&self) -> bool {
        self.set.is_some()
    }

    fn can_mutate(&self) -> bool {
        self.get_mut.is_some()
    }
}

/// A field or property of an object type.
pub struct MemberDescriptor {
    name: String,
    declared: TypeHandle,
    meta: MemberMeta,
    access: Box<dyn MemberAccess>,
}

impl MemberDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Arc<TypeDescriptor> {
        self.declared.resolve()
    }

    pub fn declared_handle(&self) -> TypeHandle {
        self.declared
    }

    pub fn meta(&self) -> &MemberMeta {
        &self.meta
    }

    /// No setter is registered.
    pub fn is_readonly(&self) -> bool {
        !self.access.can_write()
    }

    /// The current value can be mutated in place.
    pub fn can_mutate(&self) -> bool {
        self.access.can_mutate()
    }

    pub fn get<'a>(&self, owner: &'a dyn Reflect) -> Option<&'a (dyn Reflect + 'static)> {
        self.access.get(owner)
    }

    pub fn get_mut<'a>(
        &self,
        owner: &'a mut (dyn Reflect + 'static),
    ) -> Option<&'a mut (dyn Reflect + 'static)> {
        self.access.get_mut(owner)
    }

    pub fn set(
        &self,
        owner: &mut (dyn Reflect + 'static),
        value: Box<dyn Reflect>,
    ) -> Result<(), ReflectError> {
        if self.is_readonly() {
            return Err(ReflectError::ReadOnly {
                member: self.name.clone(),
            });
        }
        self.access.set(owner, value)
    }

    fn is_visible(&self, options: &Options) -> bool {
        !self.meta.ignored
            && (self.meta.visibility == Visibility::Public
                || self.meta.included
                || options.include_non_public_members)
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("meta", &self.meta)
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

/// Raw declaration of a type, as returned by [`Reflect::type_info`].
pub struct TypeInfo {
    key: TypeKey,
    name: String,
    meta: TypeMeta,
    members: Vec<MemberDescriptor>,
    generic_args: Vec<TypeHandle>,
    constructor: Option<Constructor>,
    scalar: Option<ScalarInfo>,
    enumeration: Option<EnumInfo>,
    list: Option<ListInfo>,
    array: Option<ArrayInfo>,
    map: Option<MapInfo>,
    shared: Option<SharedInfo>,
    top: bool,
    custom_collection: bool,
}

impl TypeInfo {
    fn bare<T: Reflect>(name: impl Into<String>) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            name: name.into(),
            meta: TypeMeta::default(),
            members: Vec::new(),
            generic_args: Vec::new(),
            constructor: None,
            scalar: None,
            enumeration: None,
            list: None,
            array: None,
            map: None,
            shared: None,
            top: false,
            custom_collection: false,
        }
    }

    fn with_default<T: Reflect + Default>(mut self) -> Self {
        self.constructor = Some(Constructor {
            kind: ConstructorKind::Default,
            factory: Arc::new(|_: Option<&dyn Reflect>| -> Box<dyn Reflect> {
                Box::new(T::default())
            }),
        });
        self
    }

    /// Starts describing an object constructed with `T::default()`.
    pub fn object<T: Reflect + Default>(name: impl Into<String>) -> TypeBuilder<T> {
        TypeBuilder::new(Self::bare::<T>(name).with_default::<T>())
    }

    /// Starts describing an object built by a parent-aware factory.
    pub fn object_with_factory<T: Reflect>(
        name: impl Into<String>,
        factory: fn(Option<&dyn Reflect>) -> T,
    ) -> TypeBuilder<T> {
        TypeBuilder::new(Self::bare::<T>(name)).parent_factory(factory)
    }

    /// A simple type converted through `scalar`.
    pub fn scalar<T: Reflect>(name: impl Into<String>, scalar: ScalarInfo) -> Self {
        let mut info = Self::bare::<T>(name);
        info.scalar = Some(scalar);
        info
    }

    /// A unit-like enum written through its variant identifiers.
    pub fn enumeration<T>(name: impl Into<String>, variants: &'static [(&'static str, T)]) -> Self
    where
        T: Reflect + PartialEq + Sync,
    {
        let mut info = Self::bare::<T>(name);
        info.enumeration = Some(EnumInfo {
            variants: variants.iter().map(|(ident, _)| *ident).collect(),
            ident_of: Arc::new(move |value: &dyn Reflect| {
                let value = value.as_any().downcast_ref::<T>()?;
                variants
                    .iter()
                    .find(|(_, variant)| variant == value)
                    .map(|(ident, _)| *ident)
            }),
            from_ident: Arc::new(move |identifier: &str| {
                variants
                    .iter()
                    .find(|(ident, _)| *ident == identifier)
                    .map(|(_, variant)| variant.clone_reflect())
            }),
        });
        info
    }

    /// A list exposing the erased [`List`](super::List) surface natively.
    pub fn list<C: Reflect + Default, I: Reflect>(name: impl Into<String>) -> Self {
        let mut info = Self::bare::<C>(name).with_default::<C>();
        info.generic_args.push(TypeHandle::of::<I>());
        info.list = Some(ListInfo {
            item: TypeHandle::of::<I>(),
            ops: None,
        });
        info
    }

    /// A collection reachable only through [`GenericCollection`].
    pub fn generic_list<C: GenericCollection + Default>(name: impl Into<String>) -> Self {
        let mut info = Self::bare::<C>(name).with_default::<C>();
        info.generic_args.push(TypeHandle::of::<C::Item>());
        info.list = Some(ListInfo {
            item: TypeHandle::of::<C::Item>(),
            ops: Some(ListOps::of::<C>()),
        });
        info
    }

    /// A fixed-size boxed slice.
    pub fn array<T: Reflect + Clone>() -> Self {
        let mut info = Self::bare::<Box<[T]>>("Array");
        info.constructor = Some(Constructor {
            kind: ConstructorKind::Default,
            factory: Arc::new(|_: Option<&dyn Reflect>| -> Box<dyn Reflect> {
                Box::new(Vec::<T>::new().into_boxed_slice())
            }),
        });
        info.generic_args.push(TypeHandle::of::<T>());
        info.array = Some(ArrayInfo {
            item: TypeHandle::of::<T>(),
            build: build_array::<T>,
        });
        info
    }

    /// A map exposing the erased [`Map`](super::Map) surface natively.
    pub fn map<C: Reflect + Default, K: Reflect, V: Reflect>(name: impl Into<String>) -> Self {
        let mut info = Self::bare::<C>(name).with_default::<C>();
        info.generic_args.push(TypeHandle::of::<K>());
        info.generic_args.push(TypeHandle::of::<V>());
        info.map = Some(MapInfo {
            key: TypeHandle::of::<K>(),
            value: TypeHandle::of::<V>(),
            ops: None,
        });
        info
    }

    /// A dictionary reachable only through [`GenericDictionary`].
    pub fn generic_map<C: GenericDictionary + Default>(name: impl Into<String>) -> Self {
        let mut info = Self::bare::<C>(name).with_default::<C>();
        info.generic_args.push(TypeHandle::of::<C::Key>());
        info.generic_args.push(TypeHandle::of::<C::Value>());
        info.map = Some(MapInfo {
            key: TypeHandle::of::<C::Key>(),
            value: TypeHandle::of::<C::Value>(),
            ops: Some(MapOps::of::<C>()),
        });
        info
    }

    /// A reference-counted handle to `T`.
    pub fn shared<T: Reflect + Clone>() -> Self {
        let mut info = Self::bare::<Shared<T>>("Shared");
        info.shared = Some(SharedInfo {
            target: TypeHandle::of::<T>(),
            wrap: wrap_shared::<T>,
        });
        info
    }

    /// The universal top type.
    pub fn top() -> Self {
        let mut info = Self::bare::<Dynamic>("Object");
        info.top = true;
        info
    }
}

fn build_array<T: Reflect + Clone>(
    items: Vec<Box<dyn Reflect>>,
) -> Result<Box<dyn Reflect>, ReflectError> {
    let items = items
        .into_iter()
        .map(downcast_boxed::<T>)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(Box::new(items.into_boxed_slice()))
}

fn wrap_shared<T: Reflect + Clone>(
    target: Box<dyn Reflect>,
) -> Result<Box<dyn Reflect>, ReflectError> {
    Ok(Box::new(Shared::new(downcast_boxed::<T>(target)?)))
}

/// Fluent builder for object descriptions.
///
/// ```ignore
/// TypeInfo::object::<Person>("Person")
///     .member("Name", |p| Some(&p.name), |p, v| p.name = v)
///     .member_with("Age", |p| p.age.as_ref(), |p, v| p.age = Some(v), MemberMeta::new().as_attribute())
///     .build()
/// ```
pub struct TypeBuilder<T> {
    info: TypeInfo,
    marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> TypeBuilder<T> {
    fn new(info: TypeInfo) -> Self {
        Self {
            info,
            marker: PhantomData,
        }
    }

    /// Parameterless factory used when no parent-aware factory exists.
    pub fn factory(mut self, factory: fn() -> T) -> Self {
        let parent_aware = self
            .info
            .constructor
            .as_ref()
            .is_some_and(|c| c.kind == ConstructorKind::WithParent);
        if !parent_aware {
            self.info.constructor = Some(Constructor {
                kind: ConstructorKind::Default,
                factory: Arc::new(move |_: Option<&dyn Reflect>| -> Box<dyn Reflect> {
                    Box::new(factory())
                }),
            });
        }
        self
    }

    /// Factory receiving the instance of the enclosing object.
    pub fn parent_factory(mut self, factory: fn(Option<&dyn Reflect>) -> T) -> Self {
        self.info.constructor = Some(Constructor {
            kind: ConstructorKind::WithParent,
            factory: Arc::new(move |parent: Option<&dyn Reflect>| -> Box<dyn Reflect> {
                Box::new(factory(parent))
            }),
        });
        self
    }

    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.info.meta.root_name = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.info.meta.namespace = Some(namespace.into());
        self
    }

    /// Declares a generic argument, used to compose `BaseOfArg` names.
    pub fn generic_arg<A: Reflect>(mut self) -> Self {
        self.info.generic_args.push(TypeHandle::of::<A>());
        self
    }

    pub fn member<F: Reflect>(
        self,
        name: impl Into<String>,
        get: fn(&T) -> Option<&F>,
        set: fn(&mut T, F),
    ) -> Self {
        self.member_with(name, get, set, MemberMeta::default())
    }

    pub fn member_with<F: Reflect>(
        self,
        name: impl Into<String>,
        get: fn(&T) -> Option<&F>,
        set: fn(&mut T, F),
        meta: MemberMeta,
    ) -> Self {
        self.push_member(
            name.into(),
            meta,
            Accessor {
                get,
                get_mut: None,
                set: Some(set),
            },
        )
    }

    /// A member without a setter. With `get_mut`, collections and objects
    /// behind it are populated in place during deserialization.
    pub fn readonly_member<F: Reflect>(
        self,
        name: impl Into<String>,
        get: fn(&T) -> Option<&F>,
        get_mut: Option<fn(&mut T) -> Option<&mut F>>,
        meta: MemberMeta,
    ) -> Self {
        self.push_member(
            name.into(),
            meta,
            Accessor {
                get,
                get_mut,
                set: None,
            },
        )
    }

    fn push_member<F: Reflect>(
        mut self,
        name: String,
        meta: MemberMeta,
        access: Accessor<T, F>,
    ) -> Self {
        if self.info.members.iter().any(|m| m.name == name) {
            warn!(type_name = %self.info.name, member = %name, "duplicate member registration");
        }
        self.info.members.push(MemberDescriptor {
            name,
            declared: TypeHandle::of::<F>(),
            meta,
            access: Box::new(access),
        });
        self
    }

    /// Marks the object as a list of `I` exposed through `reflect_ref`.
    pub fn list_items<I: Reflect>(mut self) -> Self {
        self.info.list = Some(ListInfo {
            item: TypeHandle::of::<I>(),
            ops: None,
        });
        self.info.custom_collection = true;
        self
    }

    /// Marks the object as a map exposed through `reflect_ref`.
    pub fn map_entries<K: Reflect, V: Reflect>(mut self) -> Self {
        self.info.map = Some(MapInfo {
            key: TypeHandle::of::<K>(),
            value: TypeHandle::of::<V>(),
            ops: None,
        });
        self.info.custom_collection = true;
        self
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }
}

impl<T: GenericCollection> TypeBuilder<T> {
    /// Marks the object as a generic-only collection.
    pub fn generic_collection(mut self) -> Self {
        self.info.list = Some(ListInfo {
            item: TypeHandle::of::<T::Item>(),
            ops: Some(ListOps::of::<T>()),
        });
        self.info.custom_collection = true;
        self
    }
}

impl<T: GenericDictionary> TypeBuilder<T> {
    /// Marks the object as a generic-only dictionary.
    pub fn generic_dictionary(mut self) -> Self {
        self.info.map = Some(MapInfo {
            key: TypeHandle::of::<T::Key>(),
            value: TypeHandle::of::<T::Value>(),
            ops: Some(MapOps::of::<T>()),
        });
        self.info.custom_collection = true;
        self
    }
}

/// Immutable, classified description of a type.
pub struct TypeDescriptor {
    key: TypeKey,
    name: String,
    kind: TypeKind,
    meta: TypeMeta,
    members: Vec<Arc<MemberDescriptor>>,
    generic_args: Vec<TypeHandle>,
    constructor: Option<Constructor>,
    scalar: Option<ScalarInfo>,
    enumeration: Option<EnumInfo>,
    list: Option<ListInfo>,
    array: Option<ArrayInfo>,
    map: Option<MapInfo>,
    shared: Option<SharedInfo>,
    top: bool,
    custom_collection: bool,
}

impl TypeDescriptor {
    pub(crate) fn from_info(info: TypeInfo) -> Self {
        let kind = classify(&info);
        let (name, meta, generic_args) = match &info.shared {
            Some(shared) => {
                let target = shared.target.resolve();
                (
                    target.name.clone(),
                    target.meta.clone(),
                    target.generic_args.clone(),
                )
            }
            None => (info.name, info.meta, info.generic_args),
        };

        Self {
            key: info.key,
            name,
            kind,
            meta,
            members: info.members.into_iter().map(Arc::new).collect(),
            generic_args,
            constructor: info.constructor,
            scalar: info.scalar,
            enumeration: info.enumeration,
            list: info.list,
            array: info.array,
            map: info.map,
            shared: info.shared,
            top: info.top,
            custom_collection: info.custom_collection,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default classification, ignoring option overrides.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Classification after applying the treat-as-object overrides.
    pub fn classify(&self, options: &Options) -> TypeKind {
        match self.kind {
            TypeKind::Enumerable(_)
                if self.custom_collection && options.treat_enumerable_impls_as_objects =>
            {
                TypeKind::Object
            }
            TypeKind::Dictionary(_)
                if self.custom_collection && options.treat_dictionary_impls_as_objects =>
            {
                TypeKind::Object
            }
            kind => kind,
        }
    }

    pub fn meta(&self) -> &TypeMeta {
        &self.meta
    }

    /// All registered members, including hidden ones.
    pub fn members(&self) -> &[Arc<MemberDescriptor>] {
        &self.members
    }

    /// Members honoring visibility and inclusion metadata.
    pub fn members_for<'a>(
        &'a self,
        options: &'a Options,
    ) -> impl Iterator<Item = &'a Arc<MemberDescriptor>> + 'a {
        self.members.iter().filter(|m| m.is_visible(options))
    }

    pub fn member(&self, name: &str) -> Option<&Arc<MemberDescriptor>> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn generic_args(&self) -> &[TypeHandle] {
        &self.generic_args
    }

    pub fn constructor_kind(&self) -> ConstructorKind {
        self.constructor
            .as_ref()
            .map_or(ConstructorKind::None, |c| c.kind)
    }

    /// Creates a fresh instance, handing the parent to parent-aware factories.
    pub fn construct(&self, parent: Option<&dyn Reflect>) -> Result<Box<dyn Reflect>, ReflectError> {
        match &self.constructor {
            Some(constructor) => Ok((constructor.factory)(parent)),
            None => Err(ReflectError::NotConstructible {
                type_name: self.name.clone(),
            }),
        }
    }

    pub fn scalar(&self) -> Option<&ScalarInfo> {
        self.scalar.as_ref()
    }

    pub fn enumeration(&self) -> Option<&EnumInfo> {
        self.enumeration.as_ref()
    }

    pub fn list(&self) -> Option<&ListInfo> {
        self.list.as_ref()
    }

    pub fn array(&self) -> Option<&ArrayInfo> {
        self.array.as_ref()
    }

    pub fn map(&self) -> Option<&MapInfo> {
        self.map.as_ref()
    }

    pub fn shared(&self) -> Option<&SharedInfo> {
        self.shared.as_ref()
    }

    /// The descriptor behind any chain of shared handles.
    pub fn unshared(self: &Arc<Self>) -> Arc<TypeDescriptor> {
        let mut current = Arc::clone(self);
        while let Some(target) = current.shared.map(|shared| shared.target) {
            current = target.resolve();
        }
        current
    }

    /// Item type of arrays and lists.
    pub fn item_type(&self) -> Option<TypeHandle> {
        self.array
            .as_ref()
            .map(|a| a.item)
            .or_else(|| self.list.as_ref().map(|l| l.item))
    }

    pub fn is_top(&self) -> bool {
        self.top
    }

    pub fn is_custom_collection(&self) -> bool {
        self.custom_collection
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("path", &self.key.path())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("members", &self.members.len())
            .finish()
    }
}

fn classify(info: &TypeInfo) -> TypeKind {
    if let Some(map) = &info.map {
        return TypeKind::Dictionary(if map.value.is_top() {
            DictionaryKind::NonGeneric
        } else {
            DictionaryKind::Generic
        });
    }
    if info.array.is_some() {
        return TypeKind::Enumerable(EnumerableKind::Array);
    }
    if let Some(list) = &info.list {
        return TypeKind::Enumerable(if list.item.is_top() {
            EnumerableKind::NonGenericList
        } else {
            EnumerableKind::GenericList
        });
    }
    if info.scalar.is_some() || info.enumeration.is_some() {
        return TypeKind::Simple;
    }
    if let Some(shared) = &info.shared {
        return shared.target.resolve().kind();
    }
    TypeKind::Object
}
