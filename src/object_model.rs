//! Interfaces the cache core consumes from a hosting interpreter's object
//! model. None of these are implemented here; `crate::testkit` provides a
//! minimal implementation sufficient to drive the crate's own tests.

use std::rc::Rc;

/// A heap object that can appear on the value-carrying side of a [`crate::value::Value`].
///
/// The cache core is agnostic to how an embedder lays out its heap objects;
/// it only needs to recognize the boxed-small-integer shape for `box`/`unbox`.
pub trait HeapObject {
    /// If this object is a boxed small integer, its numeric value.
    fn small_int_value(&self) -> Option<i64> {
        None
    }
}

/// Allocates boxed small integers on behalf of [`crate::value::box_value`].
pub trait SmallIntAllocator<H: HeapObject> {
    /// Allocate a heap integer with the given value, or `None` on
    /// allocator exhaustion.
    fn alloc_small_int(&self, value: i64) -> Option<Rc<H>>;
}

/// A target (type object or module object) that can own a lazily created
/// [`crate::anchor::CodeCacheAnchor`].
///
/// Rather than locating a cache anchor by scanning a weak-reference chain,
/// a cacheable target simply exposes the slot it stores its anchor in.
pub trait Cacheable {
    /// Borrow the anchor slot. Interior mutability (`RefCell`) lets callers
    /// fill it in lazily without requiring `&mut self` all the way up.
    fn anchor_slot(&self) -> &std::cell::RefCell<Option<Rc<crate::anchor::CodeCacheAnchor>>>;
}

/// A dictionary-like namespace with a monotonically increasing version tag,
/// bumped on every mutation. Used for module attribute caching and for the
/// globals+builtins merged-version rule.
pub trait VersionedDict {
    /// Current version. Must never decrease.
    fn version(&self) -> u64;

    /// Look up a name, returning a borrowed value reference.
    fn get(&self, name: &str) -> Option<crate::value::Value>;
}

/// Receives notification when a type's shape (MRO, slots, or any other
/// attribute-resolution-relevant structure) changes.
pub trait TypeMutationSink {
    /// Called by the embedder immediately after a mutation that can affect
    /// attribute resolution for instances of this type.
    fn on_type_modified(&self, anchor: &crate::anchor::CodeCacheAnchor);
}

/// Descriptor protocol dispatch for a cached descriptor value.
pub trait Descriptor {
    /// `__get__`-equivalent. `instance` is `None` for class-level access.
    fn descr_get(&self, instance: Option<crate::value::Value>) -> crate::value::Value;

    /// `__set__`-equivalent, for data descriptors.
    fn descr_set(&self, instance: crate::value::Value, value: crate::value::Value) -> Result<(), crate::error::CacheError>;

    /// Whether this descriptor implements `__set__`/`__delete__` (a "data"
    /// descriptor takes priority over an instance dict entry).
    fn is_data_descriptor(&self) -> bool;
}

/// Shape introspection for a split dictionary: one whose key table is
/// shared across every instance of a type and whose value storage is a
/// flat per-instance array indexed by a compile-time-resolved offset.
pub trait SplitDictShape {
    /// Identity of the shared key table. Two instances with the same
    /// identity here are guaranteed to resolve the same name to the same
    /// `split_offset`.
    fn keys_identity(&self) -> usize;

    /// Number of entries currently defined in the key table.
    fn entry_count(&self) -> usize;

    /// Resolve `name` to a slot offset in the per-instance value array,
    /// if present in the shared key table.
    fn split_offset_of(&self, name: &str) -> Option<usize>;

    /// Read the per-instance value array at `offset`.
    fn read_split_value(&self, offset: usize) -> Option<crate::value::Value>;
}

/// Resolution of an instance's in-memory layout, for `__slots__` and
/// instance-dict-offset style attribute access.
pub trait InstanceLayout {
    /// Byte offset of a `__slots__` member, if statically known.
    fn slot_offset(&self, name: &str) -> Option<usize>;

    /// Read a slot by offset. `None` means "unset" (slot exists but has
    /// no value bound, the host's equivalent of an `AttributeError`).
    fn read_slot(&self, offset: usize) -> Option<crate::value::Value>;

    /// Offset, in the instance's own memory, of its instance dictionary
    /// pointer, if the type's instances carry one.
    fn dict_offset(&self) -> Option<usize>;

    /// Look up `name` directly in the instance's (non-split, ordinary)
    /// dictionary, if it has one.
    fn read_dict_attr(&self, name: &str) -> Option<crate::value::Value> {
        let _ = name;
        None
    }
}

/// Where missing-attribute and similar host-language errors are recorded.
/// The cache core never constructs these itself; it forwards here.
pub trait ErrorSink {
    /// Record the equivalent of an `AttributeError` for `(owner, name)`.
    fn attribute_error(&self, owner: crate::value::Value, name: &str);
}
