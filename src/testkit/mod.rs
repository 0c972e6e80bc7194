//! A minimal reference object model, sufficient to drive this crate's own
//! tests end-to-end. Not a real garbage-collected runtime: no cycle
//! collection, no real descriptor protocol beyond what the load/store
//! fast paths actually need to exercise. A harness, not the object model
//! itself — the same relationship a JIT helper crate's own fake bytecode
//! interpreter has to the real one it stands in for.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::anchor::CodeCacheAnchor;
use crate::error::CacheError;
use crate::object_model::{
    Cacheable, Descriptor, HeapObject, InstanceLayout, SmallIntAllocator, SplitDictShape, TypeMutationSink, VersionedDict,
};
use crate::specialization::TypeId;
use crate::value::Value;

/// A boxed heap integer, the only heap shape this reference model needs
/// for the `unbox`/`box_value` round trip.
pub struct HeapInt(pub i64);

impl HeapObject for HeapInt {
    fn small_int_value(&self) -> Option<i64> {
        Some(self.0)
    }
}

/// Trivial allocator: never fails.
pub struct InfallibleIntAllocator;

impl SmallIntAllocator<HeapInt> for InfallibleIntAllocator {
    fn alloc_small_int(&self, value: i64) -> Option<Rc<HeapInt>> {
        Some(Rc::new(HeapInt(value)))
    }
}

/// A plain, non-split dictionary with a monotonic version tag.
#[derive(Default)]
pub struct TestDict {
    version: Cell<u64>,
    map: RefCell<HashMap<String, Value>>,
}

impl TestDict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.map.borrow_mut().insert(name.to_string(), value);
        self.version.set(self.version.get() + 1);
    }
}

impl VersionedDict for TestDict {
    fn version(&self) -> u64 {
        self.version.get()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.map.borrow().get(name).copied()
    }
}

/// The shared key table of a split dictionary: one per type, identified
/// by its own address.
#[derive(Default)]
pub struct SplitKeys {
    offsets: RefCell<HashMap<String, usize>>,
}

impl SplitKeys {
    #[must_use]
    pub fn identity(self: &Rc<Self>) -> usize {
        Rc::as_ptr(self) as usize
    }

    pub fn define(&self, name: &str) -> usize {
        let mut offsets = self.offsets.borrow_mut();
        let next = offsets.len();
        *offsets.entry(name.to_string()).or_insert(next)
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.offsets.borrow().len()
    }
}

/// An instance's split-dict storage: shares a [`SplitKeys`] table with
/// every instance of the same type, keeps only its own value array.
pub struct TestSplitDict {
    keys: Rc<SplitKeys>,
    values: RefCell<Vec<Value>>,
}

impl TestSplitDict {
    #[must_use]
    pub fn new(keys: Rc<SplitKeys>) -> Self {
        Self {
            keys,
            values: RefCell::new(Vec::new()),
        }
    }

    pub fn set(&self, name: &str, value: Value) {
        let offset = self.keys.define(name);
        let mut values = self.values.borrow_mut();
        if offset >= values.len() {
            values.resize(offset + 1, Value::NULL);
        }
        values[offset] = value;
    }
}

impl SplitDictShape for TestSplitDict {
    fn keys_identity(&self) -> usize {
        self.keys.identity()
    }

    fn entry_count(&self) -> usize {
        self.keys.entry_count()
    }

    fn split_offset_of(&self, name: &str) -> Option<usize> {
        self.keys.offsets.borrow().get(name).copied()
    }

    fn read_split_value(&self, offset: usize) -> Option<Value> {
        self.values.borrow().get(offset).copied().filter(|v| !v.is_null())
    }
}

/// A `__slots__`-style fixed instance layout, optionally paired with an
/// ordinary or split dict.
#[derive(Default)]
pub struct TestInstance {
    slot_names: RefCell<HashMap<String, usize>>,
    slots: RefCell<Vec<Value>>,
    pub dict: Option<TestDict>,
    pub split: Option<TestSplitDict>,
}

impl TestInstance {
    pub fn define_slot(&self, name: &str, value: Value) {
        let offset = {
            let mut names = self.slot_names.borrow_mut();
            let next = names.len();
            *names.entry(name.to_string()).or_insert(next)
        };
        let mut slots = self.slots.borrow_mut();
        if offset >= slots.len() {
            slots.resize(offset + 1, Value::NULL);
        }
        slots[offset] = value;
    }
}

impl InstanceLayout for TestInstance {
    fn slot_offset(&self, name: &str) -> Option<usize> {
        self.slot_names.borrow().get(name).copied()
    }

    fn read_slot(&self, offset: usize) -> Option<Value> {
        self.slots.borrow().get(offset).copied().filter(|v| !v.is_null())
    }

    fn dict_offset(&self) -> Option<usize> {
        self.dict.as_ref().map(|_| 0)
    }

    fn read_dict_attr(&self, name: &str) -> Option<Value> {
        self.dict.as_ref().and_then(|d| d.get(name))
    }
}

/// A type object: the `Cacheable` target for instance-attribute sites.
///
/// Also implements [`InstanceLayout`] over its own class-level attributes
/// (a nested [`TestInstance`]) so it can stand in as `owner` for a
/// class-level load (`C.x`, as opposed to `c.x`) — the ambiguous case
/// where the cached *type* is compared against the owner *object* pointer
/// directly.
#[derive(Default)]
pub struct TestType {
    anchor: RefCell<Option<Rc<CodeCacheAnchor>>>,
    class_attrs: TestInstance,
}

impl TestType {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn id(self: &Rc<Self>) -> TypeId {
        Rc::as_ptr(self) as TypeId
    }

    /// Define a class-level attribute, as if `C.x = value` had run.
    pub fn define_slot(&self, name: &str, value: Value) {
        self.class_attrs.define_slot(name, value);
    }

    /// Simulate a shape-changing mutation (e.g. `__slots__` turned into a
    /// property): notify the embedder-facing sink, which invalidates every
    /// cache entry registered against this type.
    pub fn mutate(&self) {
        if let Some(anchor) = self.anchor.borrow().as_ref() {
            self.on_type_modified(anchor);
        }
    }
}

impl Cacheable for TestType {
    fn anchor_slot(&self) -> &RefCell<Option<Rc<CodeCacheAnchor>>> {
        &self.anchor
    }
}

impl TypeMutationSink for TestType {
    fn on_type_modified(&self, anchor: &CodeCacheAnchor) {
        anchor.invalidate_all();
    }
}

impl InstanceLayout for TestType {
    fn slot_offset(&self, name: &str) -> Option<usize> {
        self.class_attrs.slot_offset(name)
    }

    fn read_slot(&self, offset: usize) -> Option<Value> {
        self.class_attrs.read_slot(offset)
    }

    fn dict_offset(&self) -> Option<usize> {
        self.class_attrs.dict_offset()
    }

    fn read_dict_attr(&self, name: &str) -> Option<Value> {
        self.class_attrs.read_dict_attr(name)
    }
}

/// A property-like non-data descriptor used in the invalidation scenario:
/// always returns a fixed value, ignoring the instance.
pub struct FixedDescriptor(pub Value);

impl Descriptor for FixedDescriptor {
    fn descr_get(&self, _instance: Option<Value>) -> Value {
        self.0
    }

    fn descr_set(&self, _instance: Value, _value: Value) -> Result<(), CacheError> {
        Err(CacheError::Uncacheable {
            reason: "FixedDescriptor has no __set__",
        })
    }

    fn is_data_descriptor(&self) -> bool {
        false
    }
}
