//! The top type and shared references.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::{Reflect, ReflectMut, ReflectRef, TypeInfo};
use crate::error::ReflectError;

/// A value of any reflected type.
///
/// Members declared as `Dynamic` are serialized with their runtime type and
/// deserialized by inferring a type from the node.
pub struct Dynamic(Box<dyn Reflect>);

impl Dynamic {
    pub fn new<T: Reflect>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn from_boxed(value: Box<dyn Reflect>) -> Self {
        Self(value)
    }

    pub fn get(&self) -> &(dyn Reflect + 'static) {
        self.0.resolve()
    }

    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        self.0.resolve().as_any().downcast_ref::<T>()
    }

    pub fn into_inner(self) -> Box<dyn Reflect> {
        self.0
    }
}

impl Clone for Dynamic {
    fn clone(&self) -> Self {
        Self(self.0.clone_reflect())
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dynamic").field(&self.0).finish()
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        self.0.reflect_eq(other.get()).unwrap_or(false)
    }
}

impl Reflect for Dynamic {
    fn type_info() -> TypeInfo {
        TypeInfo::top()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        self.0.reflect_ref()
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        self.0.reflect_mut()
    }

    fn resolve(&self) -> &(dyn Reflect + 'static) {
        self.0.resolve()
    }

    fn resolve_mut(&mut self) -> &mut (dyn Reflect + 'static) {
        self.0.resolve_mut()
    }

    fn reflect_eq(&self, other: &dyn Reflect) -> Option<bool> {
        self.0.reflect_eq(other)
    }
}

/// A reference-counted value with identity.
///
/// Cloning a `Shared` clones the handle, not the value; two handles to the
/// same allocation are the same node of the object graph.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(value) => f.debug_tuple("Shared").field(&*value).finish(),
            Err(_) => f.write_str("Shared(<borrowed>)"),
        }
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

/// Erased access to a shared value.
pub trait SharedRef {
    fn identity(&self) -> usize;

    fn target(&self) -> Result<Ref<'_, dyn Reflect + 'static>, ReflectError>;

    fn target_mut(&self) -> Result<RefMut<'_, dyn Reflect + 'static>, ReflectError>;
}

impl<T: Reflect + Clone> SharedRef for Shared<T> {
    fn identity(&self) -> usize {
        Shared::identity(self)
    }

    fn target(&self) -> Result<Ref<'_, dyn Reflect + 'static>, ReflectError> {
        self.0
            .try_borrow()
            .map(|value| Ref::map(value, |v| v as &(dyn Reflect + 'static)))
            .map_err(|_| borrowed::<T>())
    }

    fn target_mut(&self) -> Result<RefMut<'_, dyn Reflect + 'static>, ReflectError> {
        self.0
            .try_borrow_mut()
            .map(|value| RefMut::map(value, |v| v as &mut (dyn Reflect + 'static)))
            .map_err(|_| borrowed::<T>())
    }
}

fn borrowed<T>() -> ReflectError {
    ReflectError::Borrowed {
        type_name: std::any::type_name::<T>().to_string(),
    }
}

impl<T: Reflect + Clone> Reflect for Shared<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::shared::<T>()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Shared(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Shared(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_identity_survives_clone() {
        let first = Shared::new(1_i32);
        let second = first.clone();
        assert_eq!(first.identity(), second.identity());
        assert_ne!(first.identity(), Shared::new(1_i32).identity());
        *second.borrow_mut() = 2;
        assert_eq!(*first.borrow(), 2);
    }

    #[test]
    fn test_shared_target_reports_conflicting_borrow() {
        let shared = Shared::new("x".to_string());
        let _guard = shared.borrow_mut();
        assert!(matches!(
            SharedRef::target(&shared),
            Err(ReflectError::Borrowed { .. })
        ));
    }

    #[test]
    fn test_dynamic_equality_and_resolution() {
        let value = Dynamic::new(5_u8);
        assert_eq!(value, Dynamic::new(5_u8));
        assert_ne!(value, Dynamic::new(5_u16));
        assert_eq!(value.downcast_ref::<u8>(), Some(&5));
        assert_eq!(value.get().type_key(), crate::reflect::TypeKey::of::<u8>());
    }
}
