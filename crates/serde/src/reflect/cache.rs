//! Process-wide descriptor cache.
//!
//! Lookups take a read lock. On a miss the descriptor is computed outside any
//! lock and published under the write lock; when two threads race on the
//! same type the first insertion wins and both observe the stored instance.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::trace;

use super::{Reflect, TypeDescriptor};

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the cached descriptor for `T`, computing it on first use.
pub fn describe<T: Reflect>() -> Arc<TypeDescriptor> {
    let id = TypeId::of::<T>();
    if let Some(descriptor) = DESCRIPTORS.read().get(&id) {
        return Arc::clone(descriptor);
    }

    let computed = Arc::new(TypeDescriptor::from_info(T::type_info()));
    let mut descriptors = DESCRIPTORS.write();
    let stored = descriptors.entry(id).or_insert_with(|| {
        trace!(
            type_path = computed.key().path(),
            name = computed.name(),
            kind = ?computed.kind(),
            members = computed.members().len(),
            "Cached type descriptor"
        );
        Arc::clone(&computed)
    });
    Arc::clone(stored)
}

/// Looks up a descriptor that has already been computed.
pub fn cached_descriptor(id: TypeId) -> Option<Arc<TypeDescriptor>> {
    DESCRIPTORS.read().get(&id).cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::thread;

    use super::*;
    use crate::reflect::{Dynamic, DictionaryKind, EnumerableKind, TypeKind};

    #[test]
    fn test_describe_is_idempotent() {
        let first = describe::<Vec<String>>();
        let second = describe::<Vec<String>>();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cached_descriptor(TypeId::of::<Vec<String>>()).is_some());
    }

    #[test]
    fn test_concurrent_describe_converges() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(describe::<Vec<u128>>))
            .collect();
        let descriptors: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        for descriptor in &descriptors {
            assert!(Arc::ptr_eq(descriptor, &descriptors[0]));
        }
    }

    #[test]
    fn test_default_classification() {
        assert_eq!(describe::<i32>().kind(), TypeKind::Simple);
        assert_eq!(
            describe::<Vec<i32>>().kind(),
            TypeKind::Enumerable(EnumerableKind::GenericList)
        );
        assert_eq!(
            describe::<Vec<Dynamic>>().kind(),
            TypeKind::Enumerable(EnumerableKind::NonGenericList)
        );
        assert_eq!(
            describe::<Box<[i32]>>().kind(),
            TypeKind::Enumerable(EnumerableKind::Array)
        );
        assert_eq!(
            describe::<HashMap<String, i32>>().kind(),
            TypeKind::Dictionary(DictionaryKind::Generic)
        );
        assert_eq!(
            describe::<BTreeMap<String, Dynamic>>().kind(),
            TypeKind::Dictionary(DictionaryKind::NonGeneric)
        );
    }
}
