use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{LoadOutcome, MethodOutcome, TypeId};
use crate::anchor::Invalidate;
use crate::object_model::{Descriptor, InstanceLayout, SplitDictShape};
use crate::value::Value;

/// Which of the closed family of instance-attribute specializations an
/// [`AttrEntry`] currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecializationKind {
    /// Plain instance dict, no shadowing descriptor on the type.
    DictNoDescr,
    /// Plain instance dict, shadowed by a (non-data) descriptor used as a
    /// fallback when the dict lookup misses.
    DictDescr,
    /// `__slots__`-style fixed byte offset, no dict at all.
    Slot,
    /// No instance dict; the cached descriptor is the whole answer.
    NoDictDescr,
    /// Split dictionary, no shadowing descriptor.
    SplitDict,
    /// Split dictionary, shadowed by a fallback descriptor.
    SplitDictDescr,
    /// `DictNoDescr`'s method-call fast path: skip constructing a bound
    /// method when the resolved value is a plain function.
    DictMethod,
    /// `NoDictDescr`'s method-call fast path.
    NoDictMethod,
    /// `SplitDict`'s method-call fast path.
    SplitDictMethod,
}

impl SpecializationKind {
    #[must_use]
    pub fn is_method_variant(self) -> bool {
        matches!(
            self,
            Self::DictMethod | Self::NoDictMethod | Self::SplitDictMethod
        )
    }
}

/// State specific to the split-dictionary shapes, separated out so the
/// poisoned-keys negative-hit path can be updated through `&self` without
/// touching the rest of the entry.
#[derive(Debug, Default)]
struct SplitDictState {
    /// Offset into the per-instance value array, if `name` is present in
    /// the shared key table as of the last fill. `None` means "not
    /// present, trust the poisoned-keys check below instead of rescanning".
    split_offset: Cell<Option<usize>>,
    /// Identity of the key table this entry was filled against.
    keys_identity: Cell<usize>,
    /// Entry count of the key table at fill time, used to detect growth.
    entry_count: Cell<usize>,
    /// Set when `split_offset` is `None`: lets a repeated negative lookup
    /// against the same unchanged key table skip re-scanning for `name`.
    poisoned: Cell<bool>,
}

/// A cache entry for one instance-attribute access site.
///
/// Shared fields live directly on the struct; shape-specific state lives
/// in `kind` (a plain tag) plus `split` (populated only for the three
/// split-dict shapes).
pub struct AttrEntry {
    name: Rc<str>,
    observed_type: Cell<TypeId>,
    valid: Cell<bool>,
    descriptor: RefCell<Option<Rc<dyn Descriptor>>>,
    slot_offset: Cell<Option<usize>>,
    kind: Cell<SpecializationKind>,
    split: SplitDictState,
}

impl AttrEntry {
    #[must_use]
    pub fn new(name: Rc<str>, observed_type: TypeId, kind: SpecializationKind) -> Self {
        Self {
            name,
            observed_type: Cell::new(observed_type),
            valid: Cell::new(true),
            descriptor: RefCell::new(None),
            slot_offset: Cell::new(None),
            kind: Cell::new(kind),
            split: SplitDictState::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> SpecializationKind {
        self.kind.get()
    }

    /// The type this entry was last filled against; used by the shadow
    /// table to tell "refresh the entry already covering this type" apart
    /// from "a genuinely new type arrived at this site".
    #[must_use]
    pub fn owner_type(&self) -> TypeId {
        self.observed_type.get()
    }

    pub fn set_slot_offset(&self, offset: usize) {
        self.slot_offset.set(Some(offset));
    }

    pub fn set_descriptor(&self, descriptor: Rc<dyn Descriptor>) {
        *self.descriptor.borrow_mut() = Some(descriptor);
    }

    pub fn fill_split(&self, keys_identity: usize, entry_count: usize, split_offset: Option<usize>) {
        self.split.keys_identity.set(keys_identity);
        self.split.entry_count.set(entry_count);
        self.split.split_offset.set(split_offset);
        self.split.poisoned.set(split_offset.is_none());
    }

    fn type_matches(&self, owner_type: TypeId) -> bool {
        self.valid.get() && self.observed_type.get() == owner_type
    }

    /// Split-dict shapes only: can the negative-hit (attribute does not
    /// exist on this shape) path be trusted without rescanning?
    fn split_negative_hit(&self, split: &dyn SplitDictShape) -> bool {
        self.split.poisoned.get()
            && self.split.keys_identity.get() == split.keys_identity()
            && self.split.entry_count.get() == split.entry_count()
    }

    /// Attempt an attribute load against this entry.
    pub fn load_attr(
        &self,
        owner: Value,
        owner_type: TypeId,
        layout: &dyn InstanceLayout,
        split: Option<&dyn SplitDictShape>,
    ) -> LoadOutcome {
        if !self.type_matches(owner_type) {
            return LoadOutcome::Miss;
        }
        match self.kind.get() {
            SpecializationKind::Slot => match self.slot_offset.get().and_then(|o| layout.read_slot(o)) {
                Some(v) => LoadOutcome::Hit(v),
                None => LoadOutcome::Absent,
            },
            SpecializationKind::DictNoDescr => match layout.read_dict_attr(&self.name) {
                Some(v) => LoadOutcome::Hit(v),
                None => LoadOutcome::Absent,
            },
            SpecializationKind::DictDescr => {
                if let Some(v) = layout.read_dict_attr(&self.name) {
                    return LoadOutcome::Hit(v);
                }
                self.fallback_descriptor(Some(owner))
            }
            SpecializationKind::NoDictDescr => self.fallback_descriptor(Some(owner)),
            SpecializationKind::SplitDict | SpecializationKind::SplitDictMethod => {
                let Some(split) = split else {
                    return LoadOutcome::Miss;
                };
                if self.split.keys_identity.get() != split.keys_identity() {
                    return LoadOutcome::Miss;
                }
                match self.split.split_offset.get() {
                    Some(offset) => match split.read_split_value(offset) {
                        Some(v) => LoadOutcome::Hit(v),
                        None => LoadOutcome::Absent,
                    },
                    // The key table is unchanged since this entry was
                    // filled (checked above) and was unchanged when the
                    // negative result was first recorded: trust it
                    // without rescanning the split index.
                    None if self.split_negative_hit(split) => LoadOutcome::Absent,
                    // The key table has grown since the negative result
                    // was recorded; `name` might now be present, so this
                    // must re-resolve rather than repeat the stale answer.
                    None => LoadOutcome::Miss,
                }
            }
            SpecializationKind::SplitDictDescr => {
                let Some(split) = split else {
                    return LoadOutcome::Miss;
                };
                if self.split.keys_identity.get() == split.keys_identity() {
                    if let Some(offset) = self.split.split_offset.get() {
                        if let Some(v) = split.read_split_value(offset) {
                            return LoadOutcome::Hit(v);
                        }
                    }
                }
                self.fallback_descriptor(Some(owner))
            }
            SpecializationKind::DictMethod => match layout.read_dict_attr(&self.name) {
                Some(v) => LoadOutcome::Hit(v),
                None => LoadOutcome::Absent,
            },
            SpecializationKind::NoDictMethod => self.fallback_descriptor(Some(owner)),
        }
    }

    /// Attempt a method-call load. Distinguishes the bound-method-skip
    /// fast path (`*Method` kinds) from the plain attribute kinds, which
    /// always report `Final` since they carry no special binding logic.
    pub fn load_method(
        &self,
        owner: Value,
        owner_type: TypeId,
        layout: &dyn InstanceLayout,
        split: Option<&dyn SplitDictShape>,
    ) -> MethodOutcome {
        if !self.type_matches(owner_type) {
            return MethodOutcome::Miss;
        }
        match self.load_attr(owner, owner_type, layout, split) {
            LoadOutcome::Hit(v) if self.kind.get().is_method_variant() => MethodOutcome::Unbound { func: v },
            LoadOutcome::Hit(v) => MethodOutcome::Final(v),
            LoadOutcome::Absent => MethodOutcome::Absent,
            LoadOutcome::Miss => MethodOutcome::Miss,
        }
    }

    /// Attempt an attribute store. Only the non-descriptor dict/slot
    /// shapes can store directly; descriptor shapes must defer to the
    /// resolver if the descriptor is a data descriptor, since this crate
    /// does not special-case `__set__` fast paths — stores are cached
    /// only for the plain shapes.
    pub fn store_attr(&self, owner_type: TypeId, descriptor: &dyn Fn(&str, Value) -> Result<(), crate::error::CacheError>, value: Value) -> Result<(), crate::error::CacheError> {
        if !self.type_matches(owner_type) {
            return Err(crate::error::CacheError::Uncacheable {
                reason: "store site missed its cached type",
            });
        }
        match self.kind.get() {
            SpecializationKind::DictNoDescr
            | SpecializationKind::Slot
            | SpecializationKind::SplitDict
            | SpecializationKind::DictMethod
            | SpecializationKind::SplitDictMethod => descriptor(&self.name, value),
            _ => Err(crate::error::CacheError::Uncacheable {
                reason: "store against a descriptor-shadowed attribute site",
            }),
        }
    }

    fn fallback_descriptor(&self, instance: Option<Value>) -> LoadOutcome {
        match self.descriptor.borrow().as_ref() {
            Some(d) => LoadOutcome::Hit(d.descr_get(instance)),
            // A descriptor-shaped entry with no descriptor cached is a
            // confirmed absence, not a shape mismatch: the type still
            // matches, there is simply nothing to return.
            None => LoadOutcome::Absent,
        }
    }

    /// Invalidate this entry. Called by the anchor on a type mutation.
    /// Drops the cached descriptor reference and marks the entry so the
    /// next dispatch takes the miss path and re-resolves.
    pub fn invalidate(&self) {
        self.valid.set(false);
        *self.descriptor.borrow_mut() = None;
    }
}

impl Invalidate for AttrEntry {
    fn invalidate(&self) {
        AttrEntry::invalidate(self);
    }
}
