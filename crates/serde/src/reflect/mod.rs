//! Runtime reflection over registered types.
//!
//! Every type the engine can walk implements [`Reflect`]. The only required
//! item is [`Reflect::type_info`], a declarative description of the type's
//! shape (members, factories, metadata and collection capabilities). The
//! description is turned into an immutable [`TypeDescriptor`] the first time
//! the type is seen and cached for the rest of the process.
//!
//! | Rust type | Classification |
//! |-----------|----------------|
//! | `bool`, numbers, `String`, dates, `Uuid`, `Url`, `Decimal`, registered enums | `Simple` |
//! | `Vec<T>`, `VecDeque<T>`, `HashSet<T>`, `BTreeSet<T>` | `Enumerable` |
//! | `Box<[T]>` | `Enumerable(Array)` |
//! | `HashMap<K, V>`, `BTreeMap<K, V>` | `Dictionary` |
//! | `Shared<T>` | classification of `T` |
//! | registered objects | `Object` |

mod cache;
mod collections;
mod descriptor;
mod dynamic;
mod scalar;

pub use cache::{cached_descriptor, describe};
pub use collections::{Array, GenericCollection, GenericDictionary, List, ListOps, Map, MapOps};
pub use descriptor::{
    ArrayInfo, ConstructorKind, DictionaryKind, EnumInfo, EnumerableKind, ListInfo, MapInfo,
    MemberDescriptor, MemberMeta, ScalarInfo, SharedInfo, TypeBuilder, TypeDescriptor, TypeHandle,
    TypeInfo, TypeKind, TypeMeta, Visibility,
};
pub use dynamic::{Dynamic, Shared, SharedRef};
pub use scalar::Scalar;

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::ReflectError;

/// Identity of a reflected type: its `TypeId` plus the type path for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    path: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Object-safe plumbing implemented for every `Reflect + Clone` type.
pub trait ReflectAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn as_reflect(&self) -> &(dyn Reflect + 'static);
    fn as_reflect_mut(&mut self) -> &mut (dyn Reflect + 'static);
    fn clone_reflect(&self) -> Box<dyn Reflect>;
    fn type_key(&self) -> TypeKey;
    /// Cached descriptor of the concrete runtime type.
    fn descriptor(&self) -> Arc<TypeDescriptor>;
}

impl<T: Reflect + Clone> ReflectAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn as_reflect(&self) -> &(dyn Reflect + 'static) {
        self
    }

    fn as_reflect_mut(&mut self) -> &mut (dyn Reflect + 'static) {
        self
    }

    fn clone_reflect(&self) -> Box<dyn Reflect> {
        Box::new(self.clone())
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn descriptor(&self) -> Arc<TypeDescriptor> {
        describe::<T>()
    }
}

/// A type the engine can inspect, construct and populate.
pub trait Reflect: ReflectAny {
    /// Declarative description of this type.
    fn type_info() -> TypeInfo
    where
        Self: Sized;

    /// Collection or reference capability exposed by this value.
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Opaque
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Opaque
    }

    /// The value behind any top-type wrapper.
    fn resolve(&self) -> &(dyn Reflect + 'static) {
        self.as_reflect()
    }

    fn resolve_mut(&mut self) -> &mut (dyn Reflect + 'static) {
        self.as_reflect_mut()
    }

    /// Structural equality when the type supports it.
    fn reflect_eq(&self, _other: &dyn Reflect) -> Option<bool> {
        None
    }
}

impl fmt::Debug for dyn Reflect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.resolve();
        let descriptor = value.descriptor();
        match descriptor.scalar().and_then(|scalar| scalar.write(value)) {
            Some(scalar) => write!(f, "{}({})", descriptor.name(), scalar),
            None => write!(f, "{}", descriptor.name()),
        }
    }
}

/// Borrowed view of a value's collection or reference capability.
pub enum ReflectRef<'a> {
    Opaque,
    List(&'a dyn List),
    Array(&'a dyn Array),
    Map(&'a dyn Map),
    Shared(&'a dyn SharedRef),
}

/// Mutable view of a value's collection or reference capability.
pub enum ReflectMut<'a> {
    Opaque,
    List(&'a mut dyn List),
    Map(&'a mut dyn Map),
    Shared(&'a dyn SharedRef),
}

/// Moves a boxed value into its concrete type.
///
/// Values are wrapped in [`Dynamic`] when the target is the top type, and
/// unwrapped when a top-type value is assigned to a concrete slot.
pub fn downcast_boxed<T: Reflect>(value: Box<dyn Reflect>) -> Result<T, ReflectError> {
    let target = TypeId::of::<T>();
    let dynamic = TypeId::of::<Dynamic>();
    let value: Box<dyn Reflect> = if target == dynamic && value.type_key().id() != dynamic {
        Box::new(Dynamic::from_boxed(value))
    } else if target != dynamic && value.type_key().id() == dynamic {
        match value.into_any().downcast::<Dynamic>() {
            Ok(wrapper) => wrapper.into_inner(),
            Err(_) => {
                return Err(ReflectError::TypeMismatch {
                    expected: std::any::type_name::<T>().to_string(),
                    actual: "Dynamic".to_string(),
                });
            }
        }
    } else {
        value
    };

    let actual = value.type_key().path();
    value
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| ReflectError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: actual.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_boxed_wraps_top_type() {
        let value: Box<dyn Reflect> = Box::new(42_i32);
        let wrapped = downcast_boxed::<Dynamic>(value).unwrap();
        assert_eq!(wrapped.downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn test_downcast_boxed_unwraps_top_type() {
        let value: Box<dyn Reflect> = Box::new(Dynamic::new("text".to_string()));
        let unwrapped = downcast_boxed::<String>(value).unwrap();
        assert_eq!(unwrapped, "text");
    }

    #[test]
    fn test_downcast_boxed_reports_mismatch() {
        let value: Box<dyn Reflect> = Box::new(true);
        let err = downcast_boxed::<String>(value).unwrap_err();
        assert!(matches!(err, ReflectError::TypeMismatch { .. }));
    }

    #[test]
    fn test_type_key_equality_ignores_path() {
        assert_eq!(TypeKey::of::<Vec<i32>>(), TypeKey::of::<Vec<i32>>());
        assert_ne!(TypeKey::of::<Vec<i32>>(), TypeKey::of::<Vec<u32>>());
    }
}
