//! Value slots.
//!
//! A [`Value`] is a place holding an instance together with its declared
//! (specified) type. The engine reads and writes instances only through
//! values, so standalone roots, object members and deferred collection items
//! share one access path.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::sync::Arc;

use crate::error::ReflectError;
use crate::options::Context;
use crate::reflect::{MemberDescriptor, Reflect, TypeDescriptor};

/// A place holding an instance.
pub trait Value {
    /// The type the slot is treated as.
    fn specified_type(&self) -> Arc<TypeDescriptor>;

    /// Runtime type of the current instance, or the specified type when the
    /// slot is empty.
    fn actual_type(&self) -> Result<Arc<TypeDescriptor>, ReflectError>;

    fn is_readonly(&self) -> bool {
        false
    }

    fn instance(&self) -> Result<Option<Ref<'_, dyn Reflect>>, ReflectError>;

    fn instance_mut(&self) -> Result<Option<RefMut<'_, dyn Reflect + 'static>>, ReflectError>;

    fn set_instance(&self, value: Box<dyn Reflect>) -> Result<(), ReflectError>;
}

fn runtime_type(
    instance: Option<Ref<'_, dyn Reflect>>,
    fallback: &Arc<TypeDescriptor>,
) -> Arc<TypeDescriptor> {
    instance.map_or_else(|| Arc::clone(fallback), |value| value.descriptor())
}

fn borrowed(ty: &TypeDescriptor) -> ReflectError {
    ReflectError::Borrowed {
        type_name: ty.name().to_string(),
    }
}

enum Slot<'a> {
    Empty,
    Borrowed(&'a (dyn Reflect + 'static)),
    Owned(Box<dyn Reflect>),
}

/// A standalone value, such as a document root.
pub struct SimpleValue<'a> {
    declared: Arc<TypeDescriptor>,
    slot: RefCell<Slot<'a>>,
}

impl<'a> SimpleValue<'a> {
    pub fn empty(declared: Arc<TypeDescriptor>) -> Self {
        Self {
            declared,
            slot: RefCell::new(Slot::Empty),
        }
    }

    pub fn of<T: Reflect>(value: &'a T) -> Self {
        Self::borrowed(value.as_reflect(), crate::reflect::describe::<T>())
    }

    pub fn borrowed(value: &'a (dyn Reflect + 'static), declared: Arc<TypeDescriptor>) -> Self {
        Self {
            declared,
            slot: RefCell::new(Slot::Borrowed(value)),
        }
    }

    pub fn owned(value: Box<dyn Reflect>, declared: Arc<TypeDescriptor>) -> Self {
        Self {
            declared,
            slot: RefCell::new(Slot::Owned(value)),
        }
    }

    /// Moves the instance out, cloning a borrowed one.
    pub fn into_instance(self) -> Option<Box<dyn Reflect>> {
        match self.slot.into_inner() {
            Slot::Empty => None,
            Slot::Borrowed(value) => Some(value.clone_reflect()),
            Slot::Owned(value) => Some(value),
        }
    }
}

impl Value for SimpleValue<'_> {
    fn specified_type(&self) -> Arc<TypeDescriptor> {
        Arc::clone(&self.declared)
    }

    fn actual_type(&self) -> Result<Arc<TypeDescriptor>, ReflectError> {
        Ok(runtime_type(self.instance()?, &self.declared))
    }

    fn instance(&self) -> Result<Option<Ref<'_, dyn Reflect>>, ReflectError> {
        let slot = self.slot.try_borrow().map_err(|_| borrowed(&self.declared))?;
        Ok(Ref::filter_map(slot, |slot| match slot {
            Slot::Empty => None,
            Slot::Borrowed(value) => Some(value.resolve()),
            Slot::Owned(value) => Some(value.resolve()),
        })
        .ok())
    }

    fn instance_mut(&self) -> Result<Option<RefMut<'_, dyn Reflect + 'static>>, ReflectError> {
        let slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| borrowed(&self.declared))?;
        match &*slot {
            Slot::Empty => return Ok(None),
            Slot::Borrowed(_) => {
                return Err(ReflectError::Unsupported {
                    type_name: self.declared.name().to_string(),
                    operation: "mutation of a borrowed value",
                });
            }
            Slot::Owned(_) => {}
        }
        Ok(RefMut::filter_map(slot, |slot| match slot {
            Slot::Owned(value) => Some(value.resolve_mut()),
            Slot::Empty | Slot::Borrowed(_) => None,
        })
        .ok())
    }

    fn set_instance(&self, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        let mut slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| borrowed(&self.declared))?;
        *slot = Slot::Owned(value);
        Ok(())
    }
}

/// A member of the instance held by a parent value.
pub struct MemberValue<'p> {
    parent: &'p dyn Value,
    member: Arc<MemberDescriptor>,
    specified: Arc<TypeDescriptor>,
}

impl<'p> MemberValue<'p> {
    /// Binds `member` of `parent`. When `use_actual` accepts the declared type
    /// and the member currently holds an instance, the specified type becomes
    /// the instance's runtime type.
    pub fn new(
        parent: &'p dyn Value,
        member: Arc<MemberDescriptor>,
        use_actual: impl FnOnce(&TypeDescriptor) -> bool,
    ) -> Result<Self, ReflectError> {
        let declared = member.declared_type();
        let mut value = Self {
            parent,
            member,
            specified: Arc::clone(&declared),
        };
        if use_actual(&declared) {
            let actual = value.instance()?.map(|instance| instance.descriptor());
            if let Some(actual) = actual {
                value.specified = actual;
            }
        }
        Ok(value)
    }

    pub fn member(&self) -> &Arc<MemberDescriptor> {
        &self.member
    }

    pub fn parent(&self) -> &'p dyn Value {
        self.parent
    }
}

impl Value for MemberValue<'_> {
    fn specified_type(&self) -> Arc<TypeDescriptor> {
        Arc::clone(&self.specified)
    }

    fn actual_type(&self) -> Result<Arc<TypeDescriptor>, ReflectError> {
        Ok(runtime_type(self.instance()?, &self.specified))
    }

    fn is_readonly(&self) -> bool {
        self.member.is_readonly()
    }

    fn instance(&self) -> Result<Option<Ref<'_, dyn Reflect>>, ReflectError> {
        let Some(owner) = self.parent.instance()? else {
            return Ok(None);
        };
        let member = &self.member;
        Ok(Ref::filter_map(owner, |owner| member.get(owner)).ok())
    }

    fn instance_mut(&self) -> Result<Option<RefMut<'_, dyn Reflect + 'static>>, ReflectError> {
        let Some(owner) = self.parent.instance_mut()? else {
            return Ok(None);
        };
        let member = &self.member;
        Ok(RefMut::filter_map(owner, |owner| member.get_mut(owner)).ok())
    }

    fn set_instance(&self, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        let Some(mut owner) = self.parent.instance_mut()? else {
            return Err(ReflectError::MissingInstance {
                type_name: self.parent.specified_type().name().to_string(),
            });
        };
        self.member.set(&mut *owner, value)
    }
}

type LazyFactory<'p> =
    Box<dyn FnMut(Option<&dyn Reflect>) -> Result<Box<dyn Reflect>, ReflectError> + 'p>;

/// A slot whose instance is created on first access.
///
/// The factory receives the parent's instance and runs until it first
/// succeeds. A failed run keeps the factory, so the next read reports the
/// failure again. An instance assigned before any read discards the factory.
pub struct LazyValue<'p> {
    parent: Option<&'p dyn Value>,
    specified: Arc<TypeDescriptor>,
    factory: Cell<Option<LazyFactory<'p>>>,
    slot: RefCell<Option<Box<dyn Reflect>>>,
    materialized: Cell<bool>,
}

impl<'p> LazyValue<'p> {
    pub fn new(
        parent: Option<&'p dyn Value>,
        specified: Arc<TypeDescriptor>,
        factory: impl FnMut(Option<&dyn Reflect>) -> Result<Box<dyn Reflect>, ReflectError> + 'p,
    ) -> Self {
        Self {
            parent,
            specified,
            factory: Cell::new(Some(Box::new(factory))),
            slot: RefCell::new(None),
            materialized: Cell::new(false),
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized.get()
    }

    /// Runs the factory unless the slot is already materialized.
    pub fn ensure_value(&self) -> Result<(), ReflectError> {
        if self.materialized.get() {
            return Ok(());
        }
        let Some(mut factory) = self.factory.take() else {
            return Ok(());
        };
        let value = match self.run_factory(&mut factory) {
            Ok(value) => value,
            Err(err) => {
                self.factory.set(Some(factory));
                return Err(err);
            }
        };
        *self
            .slot
            .try_borrow_mut()
            .map_err(|_| borrowed(&self.specified))? = Some(value);
        self.materialized.set(true);
        Ok(())
    }

    fn run_factory(&self, factory: &mut LazyFactory<'p>) -> Result<Box<dyn Reflect>, ReflectError> {
        let parent = match self.parent {
            Some(parent) => parent.instance()?,
            None => None,
        };
        factory(parent.as_deref())
    }

    /// Materializes and moves the instance out.
    pub fn take(self) -> Result<Option<Box<dyn Reflect>>, ReflectError> {
        self.ensure_value()?;
        Ok(self.slot.into_inner())
    }
}

impl Value for LazyValue<'_> {
    fn specified_type(&self) -> Arc<TypeDescriptor> {
        Arc::clone(&self.specified)
    }

    fn actual_type(&self) -> Result<Arc<TypeDescriptor>, ReflectError> {
        if !self.materialized.get() {
            return Ok(Arc::clone(&self.specified));
        }
        Ok(runtime_type(self.instance()?, &self.specified))
    }

    fn instance(&self) -> Result<Option<Ref<'_, dyn Reflect>>, ReflectError> {
        self.ensure_value()?;
        let slot = self
            .slot
            .try_borrow()
            .map_err(|_| borrowed(&self.specified))?;
        Ok(Ref::filter_map(slot, |slot| slot.as_deref().map(|value| value.resolve())).ok())
    }

    fn instance_mut(&self) -> Result<Option<RefMut<'_, dyn Reflect + 'static>>, ReflectError> {
        self.ensure_value()?;
        let slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| borrowed(&self.specified))?;
        Ok(RefMut::filter_map(slot, |slot| {
            slot.as_deref_mut().map(|value| value.resolve_mut())
        })
        .ok())
    }

    fn set_instance(&self, value: Box<dyn Reflect>) -> Result<(), ReflectError> {
        self.factory.take();
        *self
            .slot
            .try_borrow_mut()
            .map_err(|_| borrowed(&self.specified))? = Some(value);
        self.materialized.set(true);
        Ok(())
    }
}

/// Builds values with the actual-type policy of a call.
///
/// Serialization always follows runtime types. Deserialization keeps the
/// declared type unless `use_actual_type` is set or the declared type is the
/// top type.
pub struct ValueFactory<'c> {
    context: &'c Context,
}

impl<'c> ValueFactory<'c> {
    pub fn new(context: &'c Context) -> Self {
        Self { context }
    }

    pub fn root<'a>(
        &self,
        instance: &'a (dyn Reflect + 'static),
        declared: Arc<TypeDescriptor>,
    ) -> SimpleValue<'a> {
        SimpleValue::borrowed(instance, declared)
    }

    pub fn member<'p>(
        &self,
        parent: &'p dyn Value,
        member: &Arc<MemberDescriptor>,
    ) -> Result<MemberValue<'p>, ReflectError> {
        MemberValue::new(parent, Arc::clone(member), |declared| {
            self.context.use_actual_type(declared)
        })
    }

    /// A deferred slot constructed through the type's registered factory.
    pub fn lazy<'p>(&self, parent: Option<&'p dyn Value>, ty: Arc<TypeDescriptor>) -> LazyValue<'p> {
        let constructed = Arc::clone(&ty);
        LazyValue::new(parent, ty, move |owner| constructed.construct(owner))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::options::{Format, Mode, Options};
    use crate::reflect::{Dynamic, TypeInfo, TypeKey, describe};

    #[derive(Debug, Clone, Default)]
    struct Holder {
        value: Option<Dynamic>,
        count: i32,
    }

    impl Reflect for Holder {
        fn type_info() -> TypeInfo {
            TypeInfo::object::<Self>("Holder")
                .member("Value", |h| h.value.as_ref(), |h, v| h.value = Some(v))
                .member("Count", |h| Some(&h.count), |h, v| h.count = v)
                .build()
        }
    }

    fn context(mode: Mode) -> Context {
        Context::new(Arc::new(Options::default()), Format::Json, mode)
    }

    #[test]
    fn test_simple_value_reports_runtime_type() {
        let five = 5_i32;
        let value = SimpleValue::borrowed(&five, describe::<Dynamic>());
        assert_eq!(value.actual_type().unwrap().key(), TypeKey::of::<i32>());
        assert!(value.specified_type().is_top());
        assert!(value.instance_mut().is_err());
    }

    #[test]
    fn test_member_value_upgrades_on_serialize() {
        let holder = Holder {
            value: Some(Dynamic::new("text".to_string())),
            count: 3,
        };
        let ctx = context(Mode::Serialize);
        let factory = ValueFactory::new(&ctx);
        let root = factory.root(&holder, describe::<Holder>());
        let member = Arc::clone(describe::<Holder>().member("Value").unwrap());
        let value = factory.member(&root, &member).unwrap();
        assert_eq!(value.specified_type().key(), TypeKey::of::<String>());
    }

    #[test]
    fn test_member_value_keeps_declared_type_on_deserialize() {
        let ctx = context(Mode::Deserialize);
        let factory = ValueFactory::new(&ctx);
        let root = SimpleValue::owned(
            Box::new(Holder {
                value: None,
                count: 1,
            }),
            describe::<Holder>(),
        );
        let member = Arc::clone(describe::<Holder>().member("Count").unwrap());
        let value = factory.member(&root, &member).unwrap();
        assert_eq!(value.specified_type().key(), TypeKey::of::<i32>());

        value.set_instance(Box::new(9_i32)).unwrap();
        let count = value.instance().unwrap().unwrap();
        assert_eq!(count.as_any().downcast_ref::<i32>(), Some(&9));
    }

    #[test]
    fn test_member_actual_type_follows_live_instance() {
        let ctx = context(Mode::Deserialize);
        let factory = ValueFactory::new(&ctx);
        let root = SimpleValue::owned(Box::new(Holder::default()), describe::<Holder>());
        let member = Arc::clone(describe::<Holder>().member("Value").unwrap());
        let value = factory.member(&root, &member).unwrap();
        assert!(value.actual_type().unwrap().is_top());

        value.set_instance(Box::new(2.5_f64)).unwrap();
        assert_eq!(value.actual_type().unwrap().key(), TypeKey::of::<f64>());
        value.set_instance(Box::new(true)).unwrap();
        assert_eq!(value.actual_type().unwrap().key(), TypeKey::of::<bool>());
    }

    #[test]
    fn test_lazy_factory_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy = LazyValue::new(None, describe::<Holder>(), move |_| {
            counter.set(counter.get() + 1);
            Ok(Box::new(Holder::default()) as Box<dyn Reflect>)
        });

        assert_eq!(lazy.actual_type().unwrap().key(), TypeKey::of::<Holder>());
        assert_eq!(calls.get(), 0);
        for _ in 0..3 {
            assert!(lazy.instance().unwrap().is_some());
        }
        lazy.ensure_value().unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_lazy_factory_failure_is_repeated() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy = LazyValue::new(None, describe::<Holder>(), move |_| {
            counter.set(counter.get() + 1);
            Err::<Box<dyn Reflect>, _>(ReflectError::NotConstructible {
                type_name: "Holder".to_string(),
            })
        });

        assert!(lazy.instance().is_err());
        assert!(matches!(
            lazy.ensure_value(),
            Err(ReflectError::NotConstructible { .. })
        ));
        assert!(!lazy.is_materialized());
        assert!(lazy.take().is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_lazy_preassigned_value_skips_factory() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy = LazyValue::new(None, describe::<Dynamic>(), move |_| {
            counter.set(counter.get() + 1);
            Ok(Box::new(0_i32) as Box<dyn Reflect>)
        });

        assert!(lazy.actual_type().unwrap().is_top());
        lazy.set_instance(Box::new(7_u8)).unwrap();
        assert_eq!(lazy.actual_type().unwrap().key(), TypeKey::of::<u8>());
        let taken = lazy.take().unwrap().unwrap();
        assert_eq!(taken.as_any().downcast_ref::<u8>(), Some(&7));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_lazy_factory_receives_parent() {
        let parent = SimpleValue::owned(
            Box::new(Holder {
                value: None,
                count: 42,
            }),
            describe::<Holder>(),
        );
        let lazy = LazyValue::new(Some(&parent), describe::<i32>(), |owner| {
            let count = owner
                .and_then(|o| o.as_any().downcast_ref::<Holder>())
                .map_or(0, |h| h.count);
            Ok(Box::new(count) as Box<dyn Reflect>)
        });
        let value = lazy.instance().unwrap().unwrap();
        assert_eq!(value.as_any().downcast_ref::<i32>(), Some(&42));
    }
}
