//! Collection capabilities.
//!
//! [`List`], [`Map`] and [`Array`] form the erased surface the engine walks.
//! `Vec`, `HashMap` and boxed slices implement it natively. Collections that
//! only offer a typed API implement [`GenericCollection`] or
//! [`GenericDictionary`] instead; their operations are erased once per type
//! into a [`ListOps`] / [`MapOps`] table stored in the type's descriptor.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;

use super::{Reflect, ReflectMut, ReflectRef, TypeInfo, downcast_boxed};
use crate::error::ReflectError;

/// Fixed-size sequence.
pub trait Array {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_>;
}

/// Growable ordered sequence.
pub trait List {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn set(&mut self, index: usize, value: Box<dyn Reflect>) -> Result<(), ReflectError>;

    fn insert(&mut self, index: usize, value: Box<dyn Reflect>) -> Result<(), ReflectError>;

    fn push(&mut self, value: Box<dyn Reflect>) -> Result<(), ReflectError>;

    fn remove_at(&mut self, index: usize) -> Result<Box<dyn Reflect>, ReflectError>;

    fn contains(&self, value: &dyn Reflect) -> bool {
        self.iter()
            .any(|item| item.reflect_eq(value).unwrap_or(false))
    }

    /// Removes the first item equal to `value`.
    fn remove(&mut self, value: &dyn Reflect) -> Result<bool, ReflectError> {
        let position = self
            .iter()
            .position(|item| item.reflect_eq(value).unwrap_or(false));
        match position {
            Some(index) => {
                self.remove_at(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&mut self) -> Result<(), ReflectError>;

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_>;
}

/// Keyed collection.
pub trait Map {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect>;

    fn insert(
        &mut self,
        key: Box<dyn Reflect>,
        value: Box<dyn Reflect>,
    ) -> Result<Option<Box<dyn Reflect>>, ReflectError>;

    fn contains_key(&self, key: &dyn Reflect) -> bool {
        self.get(key).is_some()
    }

    fn remove(&mut self, key: &dyn Reflect) -> Result<Option<Box<dyn Reflect>>, ReflectError>;

    fn clear(&mut self) -> Result<(), ReflectError>;

    fn iter(&self) -> Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_>;
}

fn index_error(index: usize, len: usize) -> ReflectError {
    ReflectError::IndexOutOfRange { index, len }
}

impl<T: Reflect + Clone> List for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|item| Reflect::resolve(item))
    }

    fn set(&mut self, index: usize, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        let len = self.as_slice().len();
        let slot = self
            .as_mut_slice()
            .get_mut(index)
            .ok_or_else(|| index_error(index, len))?;
        *slot = downcast_boxed::<T>(value)?;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        let len = self.as_slice().len();
        if index > len {
            return Err(index_error(index, len));
        }
        Vec::insert(self, index, downcast_boxed::<T>(value)?);
        Ok(())
    }

    fn push(&mut self, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        Vec::push(self, downcast_boxed::<T>(value)?);
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<Box<dyn Reflect>, ReflectError> {
        let len = self.as_slice().len();
        if index >= len {
            return Err(index_error(index, len));
        }
        Ok(Box::new(Vec::remove(self, index)))
    }

    fn clear(&mut self) -> Result<(), ReflectError> {
        Vec::clear(self);
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_> {
        Box::new(self.as_slice().iter().map(|item| Reflect::resolve(item)))
    }
}

impl<T: Reflect + Clone> Reflect for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::list::<Self, T>("List")
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::List(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::List(self)
    }

    fn reflect_eq(&self, other: &dyn Reflect) -> Option<bool> {
        let ReflectRef::List(other) = other.resolve().reflect_ref() else {
            return Some(false);
        };
        if other.len() != self.as_slice().len() {
            return Some(false);
        }
        self.as_slice()
            .iter()
            .zip(other.iter())
            .try_fold(true, |equal, (left, right)| {
                left.reflect_eq(right).map(|eq| equal && eq)
            })
    }
}

impl<T: Reflect + Clone> Array for Box<[T]> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        <[T]>::get(self, index).map(|item| Reflect::resolve(item))
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &dyn Reflect> + '_> {
        Box::new(<[T]>::iter(self).map(|item| Reflect::resolve(item)))
    }
}

impl<T: Reflect + Clone> Reflect for Box<[T]> {
    fn type_info() -> TypeInfo {
        TypeInfo::array::<T>()
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Array(self)
    }
}

impl<K, V> Map for HashMap<K, V>
where
    K: Reflect + Clone + Eq + Hash,
    V: Reflect + Clone,
{
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect> {
        let key = key.resolve().as_any().downcast_ref::<K>()?;
        HashMap::get(self, key).map(|value| Reflect::resolve(value))
    }

    fn insert(
        &mut self,
        key: Box<dyn Reflect>,
        value: Box<dyn Reflect>,
    ) -> Result<Option<Box<dyn Reflect>>, ReflectError> {
        let key = downcast_boxed::<K>(key)?;
        let value = downcast_boxed::<V>(value)?;
        Ok(HashMap::insert(self, key, value).map(|old| Box::new(old) as Box<dyn Reflect>))
    }

    fn remove(&mut self, key: &dyn Reflect) -> Result<Option<Box<dyn Reflect>>, ReflectError> {
        let Some(key) = key.resolve().as_any().downcast_ref::<K>() else {
            return Ok(None);
        };
        Ok(HashMap::remove(self, key).map(|old| Box::new(old) as Box<dyn Reflect>))
    }

    fn clear(&mut self) -> Result<(), ReflectError> {
        HashMap::clear(self);
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&dyn Reflect, &dyn Reflect)> + '_> {
        Box::new(
            HashMap::iter(self).map(|(key, value)| (Reflect::resolve(key), Reflect::resolve(value))),
        )
    }
}

impl<K, V> Reflect for HashMap<K, V>
where
    K: Reflect + Clone + Eq + Hash,
    V: Reflect + Clone,
{
    fn type_info() -> TypeInfo {
        TypeInfo::map::<Self, K, V>("Dictionary")
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Map(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Map(self)
    }
}

/// Typed collection API for collections without a native erased surface.
pub trait GenericCollection: Reflect + Clone {
    type Item: Reflect + Clone;

    fn item_count(&self) -> usize;

    fn items(&self) -> Box<dyn Iterator<Item = &Self::Item> + '_>;

    fn add_item(&mut self, item: Self::Item);

    fn remove_item(&mut self, item: &Self::Item) -> bool;

    fn contains_item(&self, item: &Self::Item) -> bool;

    fn clear_items(&mut self);
}

/// Typed dictionary API for maps without a native erased surface.
pub trait GenericDictionary: Reflect + Clone {
    type Key: Reflect + Clone;
    type Value: Reflect + Clone;

    fn entry_count(&self) -> usize;

    fn value_of(&self, key: &Self::Key) -> Option<&Self::Value>;

    fn put(&mut self, key: Self::Key, value: Self::Value) -> Option<Self::Value>;

    fn take(&mut self, key: &Self::Key) -> Option<Self::Value>;

    fn entries(&self) -> Box<dyn Iterator<Item = (&Self::Key, &Self::Value)> + '_>;

    fn clear_entries(&mut self);
}

impl<T: Reflect + Clone + PartialEq> GenericCollection for VecDeque<T> {
    type Item = T;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn add_item(&mut self, item: T) {
        self.push_back(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        match self.iter().position(|existing| existing == item) {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn clear_items(&mut self) {
        self.clear();
    }
}

impl<T: Reflect + Clone + PartialEq> Reflect for VecDeque<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::generic_list::<Self>("Queue")
    }
}

impl<T: Reflect + Clone + Eq + Hash> GenericCollection for HashSet<T> {
    type Item = T;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn add_item(&mut self, item: T) {
        self.insert(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.remove(item)
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn clear_items(&mut self) {
        self.clear();
    }
}

impl<T: Reflect + Clone + Eq + Hash> Reflect for HashSet<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::generic_list::<Self>("Set")
    }
}

impl<T: Reflect + Clone + Ord> GenericCollection for BTreeSet<T> {
    type Item = T;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }

    fn add_item(&mut self, item: T) {
        self.insert(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.remove(item)
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn clear_items(&mut self) {
        self.clear();
    }
}

impl<T: Reflect + Clone + Ord> Reflect for BTreeSet<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::generic_list::<Self>("SortedSet")
    }
}

impl<K, V> GenericDictionary for BTreeMap<K, V>
where
    K: Reflect + Clone + Ord,
    V: Reflect + Clone,
{
    type Key = K;
    type Value = V;

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn value_of(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        self.insert(key, value)
    }

    fn take(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        Box::new(self.iter())
    }

    fn clear_entries(&mut self) {
        self.clear();
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: Reflect + Clone + Ord,
    V: Reflect + Clone,
{
    fn type_info() -> TypeInfo {
        TypeInfo::generic_map::<Self>("SortedDictionary")
    }
}

type ItemsFn = for<'a> fn(&'a dyn Reflect) -> Box<dyn Iterator<Item = &'a dyn Reflect> + 'a>;
type EntriesFn =
    for<'a> fn(&'a dyn Reflect) -> Box<dyn Iterator<Item = (&'a dyn Reflect, &'a dyn Reflect)> + 'a>;

/// Erased operations of a [`GenericCollection`].
#[derive(Clone, Copy)]
pub struct ListOps {
    count: fn(&dyn Reflect) -> usize,
    items: ItemsFn,
    add: fn(&mut (dyn Reflect + 'static), Box<dyn Reflect>) -> Result<(), ReflectError>,
    remove: fn(&mut (dyn Reflect + 'static), &dyn Reflect) -> bool,
    contains: fn(&dyn Reflect, &dyn Reflect) -> bool,
    clear: fn(&mut (dyn Reflect + 'static)),
}

impl ListOps {
    pub fn of<C: GenericCollection>() -> Self {
        Self {
            count: list_count::<C>,
            items: list_items::<C>,
            add: list_add::<C>,
            remove: list_remove::<C>,
            contains: list_contains::<C>,
            clear: list_clear::<C>,
        }
    }

    pub fn count(&self, target: &dyn Reflect) -> usize {
        (self.count)(target)
    }

    pub fn items<'a>(&self, target: &'a dyn Reflect) -> Box<dyn Iterator<Item = &'a dyn Reflect> + 'a> {
        (self.items)(target)
    }

    pub fn add(
        &self,
        target: &mut (dyn Reflect + 'static),
        item: Box<dyn Reflect>,
    ) -> Result<(), ReflectError> {
        (self.add)(target, item)
    }

    pub fn remove(&self, target: &mut (dyn Reflect + 'static), item: &dyn Reflect) -> bool {
        (self.remove)(target, item)
    }

    pub fn contains(&self, target: &dyn Reflect, item: &dyn Reflect) -> bool {
        (self.contains)(target, item)
    }

    pub fn clear(&self, target: &mut (dyn Reflect + 'static)) {
        (self.clear)(target)
    }
}

impl fmt::Debug for ListOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ListOps")
    }
}

fn owner_mismatch<C>(target: &dyn Reflect) -> ReflectError {
    ReflectError::TypeMismatch {
        expected: std::any::type_name::<C>().to_string(),
        actual: target.type_key().path().to_string(),
    }
}

fn list_count<C: GenericCollection>(target: &dyn Reflect) -> usize {
    target
        .resolve()
        .as_any()
        .downcast_ref::<C>()
        .map_or(0, C::item_count)
}

fn list_items<'a, C: GenericCollection>(
    target: &'a dyn Reflect,
) -> Box<dyn Iterator<Item = &'a dyn Reflect> + 'a> {
    match target.resolve().as_any().downcast_ref::<C>() {
        Some(collection) => Box::new(collection.items().map(|item| Reflect::resolve(item))),
        None => Box::new(std::iter::empty()),
    }
}

fn list_add<C: GenericCollection>(
    target: &mut (dyn Reflect + 'static),
    item: Box<dyn Reflect>,
) -> Result<(), ReflectError> {
    let item = downcast_boxed::<C::Item>(item)?;
    let target = target.resolve_mut();
    let mismatch = owner_mismatch::<C>(target);
    let collection = target.as_any_mut().downcast_mut::<C>().ok_or(mismatch)?;
    collection.add_item(item);
    Ok(())
}

fn list_remove<C: GenericCollection>(
    target: &mut (dyn Reflect + 'static),
    item: &dyn Reflect,
) -> bool {
    let Some(item) = item.resolve().as_any().downcast_ref::<C::Item>() else {
        return false;
    };
    target
        .resolve_mut()
        .as_any_mut()
        .downcast_mut::<C>()
        .is_some_and(|collection| collection.remove_item(item))
}

fn list_contains<C: GenericCollection>(target: &dyn Reflect, item: &dyn Reflect) -> bool {
    let Some(item) = item.resolve().as_any().downcast_ref::<C::Item>() else {
        return false;
    };
    target
        .resolve()
        .as_any()
        .downcast_ref::<C>()
        .is_some_and(|collection| collection.contains_item(item))
}

fn list_clear<C: GenericCollection>(target: &mut (dyn Reflect + 'static)) {
    if let Some(collection) = target.resolve_mut().as_any_mut().downcast_mut::<C>() {
        collection.clear_items();
    }
}

/// Erased operations of a [`GenericDictionary`].
#[derive(Clone, Copy)]
pub struct MapOps {
    count: fn(&dyn Reflect) -> usize,
    get: for<'a> fn(&'a dyn Reflect, &dyn Reflect) -> Option<&'a dyn Reflect>,
    insert: fn(
        &mut (dyn Reflect + 'static),
        Box<dyn Reflect>,
        Box<dyn Reflect>,
    ) -> Result<Option<Box<dyn Reflect>>, ReflectError>,
    remove: fn(&mut (dyn Reflect + 'static), &dyn Reflect) -> Option<Box<dyn Reflect>>,
    entries: EntriesFn,
    clear: fn(&mut (dyn Reflect + 'static)),
}

impl MapOps {
    pub fn of<D: GenericDictionary>() -> Self {
        Self {
            count: map_count::<D>,
            get: map_get::<D>,
            insert: map_insert::<D>,
            remove: map_remove::<D>,
            entries: map_entries::<D>,
            clear: map_clear::<D>,
        }
    }

    pub fn count(&self, target: &dyn Reflect) -> usize {
        (self.count)(target)
    }

    pub fn get<'a>(&self, target: &'a dyn Reflect, key: &dyn Reflect) -> Option<&'a dyn Reflect> {
        (self.get)(target, key)
    }

    pub fn insert(
        &self,
        target: &mut (dyn Reflect + 'static),
        key: Box<dyn Reflect>,
        value: Box<dyn Reflect>,
    ) -> Result<Option<Box<dyn Reflect>>, ReflectError> {
        (self.insert)(target, key, value)
    }

    pub fn remove(
        &self,
        target: &mut (dyn Reflect + 'static),
        key: &dyn Reflect,
    ) -> Option<Box<dyn Reflect>> {
        (self.remove)(target, key)
    }

    pub fn entries<'a>(
        &self,
        target: &'a dyn Reflect,
    ) -> Box<dyn Iterator<Item = (&'a dyn Reflect, &'a dyn Reflect)> + 'a> {
        (self.entries)(target)
    }

    pub fn clear(&self, target: &mut (dyn Reflect + 'static)) {
        (self.clear)(target)
    }
}

impl fmt::Debug for MapOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MapOps")
    }
}

fn map_count<D: GenericDictionary>(target: &dyn Reflect) -> usize {
    target
        .resolve()
        .as_any()
        .downcast_ref::<D>()
        .map_or(0, D::entry_count)
}

fn map_get<'a, D: GenericDictionary>(
    target: &'a dyn Reflect,
    key: &dyn Reflect,
) -> Option<&'a dyn Reflect> {
    let key = key.resolve().as_any().downcast_ref::<D::Key>()?;
    let dictionary = target.resolve().as_any().downcast_ref::<D>()?;
    dictionary.value_of(key).map(|value| Reflect::resolve(value))
}

fn map_insert<D: GenericDictionary>(
    target: &mut (dyn Reflect + 'static),
    key: Box<dyn Reflect>,
    value: Box<dyn Reflect>,
) -> Result<Option<Box<dyn Reflect>>, ReflectError> {
    let key = downcast_boxed::<D::Key>(key)?;
    let value = downcast_boxed::<D::Value>(value)?;
    let target = target.resolve_mut();
    let mismatch = owner_mismatch::<D>(target);
    let dictionary = target.as_any_mut().downcast_mut::<D>().ok_or(mismatch)?;
    Ok(dictionary
        .put(key, value)
        .map(|old| Box::new(old) as Box<dyn Reflect>))
}

fn map_remove<D: GenericDictionary>(
    target: &mut (dyn Reflect + 'static),
    key: &dyn Reflect,
) -> Option<Box<dyn Reflect>> {
    let key = key.resolve().as_any().downcast_ref::<D::Key>()?;
    let dictionary = target.resolve_mut().as_any_mut().downcast_mut::<D>()?;
    dictionary
        .take(key)
        .map(|old| Box::new(old) as Box<dyn Reflect>)
}

fn map_entries<'a, D: GenericDictionary>(
    target: &'a dyn Reflect,
) -> Box<dyn Iterator<Item = (&'a dyn Reflect, &'a dyn Reflect)> + 'a> {
    match target.resolve().as_any().downcast_ref::<D>() {
        Some(dictionary) => Box::new(
            dictionary
                .entries()
                .map(|(key, value)| (Reflect::resolve(key), Reflect::resolve(value))),
        ),
        None => Box::new(std::iter::empty()),
    }
}

fn map_clear<D: GenericDictionary>(target: &mut (dyn Reflect + 'static)) {
    if let Some(dictionary) = target.resolve_mut().as_any_mut().downcast_mut::<D>() {
        dictionary.clear_entries();
    }
}
