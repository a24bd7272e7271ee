//! Collection adapters.
//!
//! The engine populates and walks collections only through the [`List`] and
//! [`Map`] surfaces. Native collections expose them directly; arrays and
//! generic-only collections are wrapped here.

use std::sync::Arc;

use tracing::trace;

use crate::error::{ReflectError, Result, UnsupportedError};
use crate::reflect::{
    ArrayInfo, List, ListOps, Map, MapOps, Reflect, ReflectMut, ReflectRef, TypeDescriptor,
};
use crate::value::Value;

fn incompatible(ty: &TypeDescriptor, expected: &'static str) -> UnsupportedError {
    UnsupportedError::IncompatibleCollection {
        type_name: ty.name().to_string(),
        expected,
    }
}

/// When an [`ArrayAdapter`] publishes its buffer to the backing value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Every mutation replaces the backing array.
    #[default]
    Immediate,
    /// Mutations stay in the buffer until [`ArrayAdapter::export`].
    Deferred,
}

/// Growable view over a fixed-size array value.
pub struct ArrayAdapter<'v> {
    backing: &'v dyn Value,
    info: ArrayInfo,
    buffer: Vec<Box<dyn Reflect>>,
    sync: SyncMode,
}

impl<'v> ArrayAdapter<'v> {
    /// Wraps an array value, seeding the buffer with its current items.
    pub fn create(backing: &'v dyn Value) -> Result<Self> {
        let ty = backing.specified_type().unshared();
        let info = *ty.array().ok_or_else(|| incompatible(&ty, "array"))?;
        let buffer = seed(backing)?;
        Ok(Self {
            backing,
            info,
            buffer,
            sync: SyncMode::default(),
        })
    }

    pub fn with_sync(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    /// Replaces the backing instance with a snapshot of the buffer.
    pub fn export(&self) -> std::result::Result<(), ReflectError> {
        let snapshot = self.buffer.iter().map(|item| item.clone_reflect()).collect();
        let array = self.info.build(snapshot)?;
        trace!(len = self.buffer.len(), "Exported array snapshot");
        self.backing.set_instance(array)
    }

    fn after_mutation(&self) -> std::result::Result<(), ReflectError> {
        match self.sync {
            SyncMode::Immediate => self.export(),
            SyncMode::Deferred => Ok(()),
        }
    }

    fn checked(&self, value: Box<dyn Reflect>) -> std::result::Result<Box<dyn Reflect>, ReflectError> {
        let expected = self.info.item;
        let actual = value.resolve().type_key();
        if expected.is_top() || actual == expected.key() {
            Ok(value)
        } else {
            Err(ReflectError::TypeMismatch {
                expected: expected.key().path().to_string(),
                actual: actual.path().to_string(),
            })
        }
    }
}

fn seed(backing: &dyn Value) -> std::result::Result<Vec<Box<dyn Reflect>>, ReflectError> {
    let Some(instance) = backing.instance()? else {
        return Ok(Vec::new());
    };
    let items = match instance.reflect_ref() {
        ReflectRef::Array(array) => array.iter().map(|item| item.clone_reflect()).collect(),
        _ => Vec::new(),
    };
    Ok(items)
}

impl List for ArrayAdapter<'_> {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.buffer.get(index).map(|item| item.resolve())
    }

    fn set(&mut self, index: usize, value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        let value = self.checked(value)?;
        let len = self.buffer.len();
        let slot = self
            .buffer
            .get_mut(index)
            .ok_or(ReflectError::IndexOutOfRange { index, len })?;
        *slot = value;
        self.after_mutation()
    }

    fn insert(&mut self, index: usize, value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        let value = self.checked(value)?;
        let len = self.buffer.len();
        if index > len {
            return Err(ReflectError::IndexOutOfRange { index, len });
        }
        self.buffer.insert(index, value);
        self.after_mutation()
    }

    fn push(&mut self, value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        let value = self.checked(value)?;
        self.buffer.push(value);
        self.after_mutation()
    }

    fn remove_at(&mut self, index: usize) -> std::result::Result<Box<dyn Reflect>, ReflectError> {
        let len = self.buffer.len();
        if index >= len {
            return Err(ReflectError::IndexOutOfRange { index, len });
        }
        let removed = self.buffer.remove(index);
        self.after_mutation()?;
        Ok(removed)
    }

    fn clear(&mut self) -> std::result::Result<(), ReflectError> {
        self.buffer.clear();
        self.after_mutation()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_> {
        Box::new(self.buffer.iter().map(|item| item.resolve()))
    }
}

/// Destination of collection items during deserialization.
pub enum ListTarget<'v> {
    /// The value already exposes the list surface.
    List(&'v dyn Value, Arc<TypeDescriptor>),
    Array(ArrayAdapter<'v>),
}

impl<'v> ListTarget<'v> {
    pub fn create(value: &'v dyn Value, sync: SyncMode) -> Result<Self> {
        let ty = value.specified_type().unshared();
        if ty.array().is_some() {
            return Ok(ListTarget::Array(ArrayAdapter::create(value)?.with_sync(sync)));
        }
        if ty.list().is_some() {
            return Ok(ListTarget::List(value, ty));
        }
        Err(incompatible(&ty, "list").into())
    }

    pub fn push(&mut self, item: Box<dyn Reflect>) -> Result<()> {
        match self {
            ListTarget::List(value, ty) => {
                let mut instance = value.instance_mut()?.ok_or_else(|| {
                    ReflectError::MissingInstance {
                        type_name: ty.name().to_string(),
                    }
                })?;
                let mut list = ListMut::create(&mut *instance)?;
                list.push(item)?;
                Ok(())
            }
            ListTarget::Array(adapter) => Ok(adapter.push(item)?),
        }
    }

    /// Publishes deferred array contents.
    pub fn finish(self) -> Result<()> {
        if let ListTarget::Array(adapter) = self {
            adapter.export()?;
        }
        Ok(())
    }
}

/// List surface over a [`GenericCollection`](crate::reflect::GenericCollection).
pub struct GenericListAdapter<'a> {
    target: &'a mut (dyn Reflect + 'static),
    ops: ListOps,
}

impl List for GenericListAdapter<'_> {
    fn len(&self) -> usize {
        self.ops.count(&*self.target)
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.ops.items(&*self.target).nth(index)
    }

    fn set(&mut self, _index: usize, _value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        Err(ReflectError::Unsupported {
            type_name: self.target.type_key().path().to_string(),
            operation: "indexed assignment",
        })
    }

    fn insert(&mut self, index: usize, value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        let len = self.len();
        if index != len {
            return Err(ReflectError::Unsupported {
                type_name: self.target.type_key().path().to_string(),
                operation: "positional insertion",
            });
        }
        self.push(value)
    }

    fn push(&mut self, value: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        self.ops.add(self.target, value)
    }

    fn remove_at(&mut self, index: usize) -> std::result::Result<Box<dyn Reflect>, ReflectError> {
        let len = self.len();
        let item = self
            .get(index)
            .map(|item| item.clone_reflect())
            .ok_or(ReflectError::IndexOutOfRange { index, len })?;
        self.ops.remove(self.target, item.as_reflect());
        Ok(item)
    }

    fn contains(&self, value: &dyn Reflect) -> bool {
        self.ops.contains(&*self.target, value)
    }

    fn remove(&mut self, value: &dyn Reflect) -> std::result::Result<bool, ReflectError> {
        Ok(self.ops.remove(self.target, value))
    }

    fn clear(&mut self) -> std::result::Result<(), ReflectError> {
        self.ops.clear(self.target);
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_> {
        self.ops.items(&*self.target)
    }
}

/// A mutable list surface, native or adapted.
pub enum ListMut<'a> {
    Native(&'a mut dyn List),
    Adapted(GenericListAdapter<'a>),
}

impl<'a> ListMut<'a> {
    /// Passes native lists through and adapts generic-only collections.
    pub fn create(target: &'a mut (dyn Reflect + 'static)) -> Result<Self> {
        let target = target.resolve_mut();
        let ty = target.descriptor();
        if let Some(ops) = ty.list().and_then(|list| list.ops) {
            return Ok(ListMut::Adapted(GenericListAdapter { target, ops }));
        }
        match target.reflect_mut() {
            ReflectMut::List(list) => Ok(ListMut::Native(list)),
            _ => Err(incompatible(&ty, "generic list").into()),
        }
    }

    pub fn as_list(&mut self) -> &mut dyn List {
        match self {
            ListMut::Native(list) => &mut **list,
            ListMut::Adapted(adapter) => adapter,
        }
    }

    pub fn push(&mut self, item: Box<dyn Reflect>) -> std::result::Result<(), ReflectError> {
        self.as_list().push(item)
    }
}

/// Map surface over a [`GenericDictionary`](crate::reflect::GenericDictionary).
pub struct GenericDictionaryAdapter<'a> {
    target: &'a mut (dyn Reflect + 'static),
    ops: MapOps,
}

impl Map for GenericDictionaryAdapter<'_> {
    fn len(&self) -> usize {
        self.ops.count(&*self.target)
    }

    fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect> {
        self.ops.get(&*self.target, key)
    }

    fn insert(
        &mut self,
        key: Box<dyn Reflect>,
        value: Box<dyn Reflect>,
    ) -> std::result::Result<Option<Box<dyn Reflect>>, ReflectError> {
        self.ops.insert(self.target, key, value)
    }

    fn remove(&mut self, key: &dyn Reflect) -> std::result::Result<Option<Box<dyn Reflect>>, ReflectError> {
        Ok(self.ops.remove(self.target, key))
    }

    fn clear(&mut self) -> std::result::Result<(), ReflectError> {
        self.ops.clear(self.target);
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_> {
        self.ops.entries(&*self.target)
    }
}

/// A mutable map surface, native or adapted.
pub enum MapMut<'a> {
    Native(&'a mut dyn Map),
    Adapted(GenericDictionaryAdapter<'a>),
}

impl<'a> MapMut<'a> {
    /// Passes native maps through and adapts generic-only dictionaries.
    pub fn create(target: &'a mut (dyn Reflect + 'static)) -> Result<Self> {
        let target = target.resolve_mut();
        let ty = target.descriptor();
        if let Some(ops) = ty.map().and_then(|map| map.ops) {
            return Ok(MapMut::Adapted(GenericDictionaryAdapter { target, ops }));
        }
        match target.reflect_mut() {
            ReflectMut::Map(map) => Ok(MapMut::Native(map)),
            _ => Err(incompatible(&ty, "generic dictionary").into()),
        }
    }

    pub fn as_map(&mut self) -> &mut dyn Map {
        match self {
            MapMut::Native(map) => &mut **map,
            MapMut::Adapted(adapter) => adapter,
        }
    }
}

/// Iterates the items of any list-like or array value.
pub fn items(value: &dyn Reflect) -> Option<Box<dyn Iterator<Item = &dyn Reflect> + '_>> {
    let value = value.resolve();
    match value.reflect_ref() {
        ReflectRef::List(list) => Some(list.iter()),
        ReflectRef::Array(array) => Some(array.iter()),
        _ => {
            let ops = value.descriptor().list().and_then(|list| list.ops)?;
            Some(ops.items(value))
        }
    }
}

/// Iterates the entries of any map-like value.
pub fn entries(
    value: &dyn Reflect,
) -> Option<Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_>> {
    let value = value.resolve();
    match value.reflect_ref() {
        ReflectRef::Map(map) => Some(map.iter()),
        _ => {
            let ops = value.descriptor().map().and_then(|map| map.ops)?;
            Some(ops.entries(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};

    use super::*;
    use crate::error::Error;
    use crate::reflect::describe;
    use crate::value::SimpleValue;

    fn array_len(value: &dyn Value) -> usize {
        let instance = value.instance().unwrap().unwrap();
        match instance.reflect_ref() {
            ReflectRef::Array(array) => array.len(),
            _ => panic!("backing value is not an array"),
        }
    }

    fn array_value(items: Vec<i32>) -> SimpleValue<'static> {
        SimpleValue::owned(
            Box::new(items.into_boxed_slice()),
            describe::<Box<[i32]>>(),
        )
    }

    #[test]
    fn test_array_adapter_keeps_backing_in_sync() {
        let backing = array_value(vec![1, 2, 3]);
        let mut adapter = ArrayAdapter::create(&backing).unwrap();
        assert_eq!(adapter.len(), 3);

        adapter.push(Box::new(4_i32)).unwrap();
        assert_eq!(array_len(&backing), adapter.len());
        adapter.insert(0, Box::new(0_i32)).unwrap();
        assert_eq!(array_len(&backing), adapter.len());
        adapter.remove_at(1).unwrap();
        assert_eq!(array_len(&backing), adapter.len());
        assert!(adapter.remove(&4_i32).unwrap());
        assert_eq!(array_len(&backing), adapter.len());
        adapter.set(0, Box::new(9_i32)).unwrap();
        assert_eq!(array_len(&backing), 3);
        adapter.clear().unwrap();
        assert_eq!(array_len(&backing), 0);
    }

    #[test]
    fn test_array_adapter_rejects_wrong_item_type() {
        let backing = array_value(vec![1]);
        let mut adapter = ArrayAdapter::create(&backing).unwrap();
        assert!(adapter.push(Box::new("text".to_string())).is_err());
        assert_eq!(adapter.len(), 1);
        assert_eq!(array_len(&backing), 1);
    }

    #[test]
    fn test_deferred_array_adapter_exports_once() {
        let backing = array_value(Vec::new());
        let mut adapter = ArrayAdapter::create(&backing)
            .unwrap()
            .with_sync(SyncMode::Deferred);
        adapter.push(Box::new(1_i32)).unwrap();
        adapter.push(Box::new(2_i32)).unwrap();
        assert_eq!(array_len(&backing), 0);
        adapter.export().unwrap();
        assert_eq!(array_len(&backing), 2);
    }

    #[test]
    fn test_array_adapter_requires_array() {
        let list = vec![1_i32];
        let value = SimpleValue::of(&list);
        let err = ArrayAdapter::create(&value).err().unwrap();
        assert!(matches!(
            err,
            Error::Unsupported(UnsupportedError::IncompatibleCollection { .. })
        ));
    }

    #[test]
    fn test_list_target_passes_lists_through() {
        let value = SimpleValue::owned(Box::new(vec![1_i32]), describe::<Vec<i32>>());
        let mut target = ListTarget::create(&value, SyncMode::Deferred).unwrap();
        assert!(matches!(target, ListTarget::List(..)));
        target.push(Box::new(2_i32)).unwrap();
        target.finish().unwrap();
        let instance = value.into_instance().unwrap();
        assert_eq!(instance.as_any().downcast_ref::<Vec<i32>>(), Some(&vec![1, 2]));

        let text = SimpleValue::owned(Box::new("x".to_string()), describe::<String>());
        assert!(ListTarget::create(&text, SyncMode::Immediate).is_err());
    }

    #[test]
    fn test_generic_list_adapter_over_queue() {
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut list = ListMut::create(&mut queue).unwrap();
        assert!(matches!(list, ListMut::Adapted(_)));
        let surface = list.as_list();
        surface.push(Box::new("a".to_string())).unwrap();
        surface.push(Box::new("b".to_string())).unwrap();
        assert_eq!(surface.len(), 2);
        assert!(surface.contains(&"b".to_string()));
        let removed = surface.remove_at(0).unwrap();
        assert_eq!(removed.as_any().downcast_ref::<String>().map(String::as_str), Some("a"));
        assert!(surface.set(0, Box::new("c".to_string())).is_err());
        assert_eq!(queue, VecDeque::from(vec!["b".to_string()]));
    }

    #[test]
    fn test_generic_dictionary_adapter() {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        map.insert("item1".into(), "oh".into());
        map.insert("item2".into(), "hai".into());

        let mut adapted = MapMut::create(&mut map).unwrap();
        let surface = adapted.as_map();
        let key = "item1".to_string();
        assert!(surface.contains_key(&key));
        let value = surface.get(&key).and_then(|v| v.as_any().downcast_ref::<String>());
        assert_eq!(value.map(String::as_str), Some("oh"));
        assert_eq!(surface.len(), 2);
    }

    #[test]
    fn test_map_mut_rejects_non_maps() {
        let mut number = 3_i32;
        assert!(MapMut::create(&mut number).is_err());
        assert!(ListMut::create(&mut number).is_err());
    }

    #[test]
    fn test_read_helpers() {
        let set: std::collections::BTreeSet<i32> = [3, 1, 2].into_iter().collect();
        let collected: Vec<i32> = items(&set)
            .unwrap()
            .filter_map(|item| item.as_any().downcast_ref::<i32>().copied())
            .collect();
        assert_eq!(collected, vec![1, 2, 3]);

        let array: Box<[u8]> = vec![7, 8].into_boxed_slice();
        assert_eq!(items(&array).unwrap().count(), 2);

        let map: BTreeMap<String, i32> = [("a".to_string(), 1)].into_iter().collect();
        assert_eq!(entries(&map).unwrap().count(), 1);
        assert!(entries(&5_i32).is_none());
    }
}
