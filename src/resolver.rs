//! Classification and installation: what runs on a cache miss.
//!
//! The resolver inspects the shape of `(owner, name)` once, on the slow
//! path, and decides which [`SpecializationKind`] (if any) can safely
//! memoize that resolution. Installation writes the resulting
//! [`AttrEntry`] into the function's [`ShadowCode`] and registers it with
//! the owner type's [`CodeCacheAnchor`] so a later type mutation reaches it.

use std::rc::Rc;

use crate::anchor::{CodeCacheAnchor, Invalidate};
use crate::error::CacheError;
use crate::object_model::{Descriptor, InstanceLayout, SplitDictShape};
use crate::specialization::{AttrEntry, SpecializationKind, TypeId};

/// Everything the resolver needs to know about the candidate owner to
/// classify an attribute access. Built by the dispatcher from its object
/// model on a cache miss.
pub struct ClassifyRequest<'a> {
    pub owner_type: TypeId,
    pub layout: &'a dyn InstanceLayout,
    pub split: Option<&'a dyn SplitDictShape>,
    pub descriptor: Option<(Rc<dyn Descriptor>, &'a str)>,
    pub has_custom_getattr: bool,
    pub is_method_call: bool,
}

/// Decide which specialization kind (if any) applies, without yet
/// constructing the [`AttrEntry`]. Kept separate from `resolve` so tests
/// can exercise classification without a real `ShadowCode`/anchor.
pub fn classify(name: &str, req: &ClassifyRequest<'_>) -> Result<SpecializationKind, CacheError> {
    if req.has_custom_getattr {
        return Err(CacheError::Uncacheable {
            reason: "type overrides attribute lookup",
        });
    }

    if let Some(offset) = req.layout.slot_offset(name) {
        let _ = offset;
        return Ok(SpecializationKind::Slot);
    }

    let has_data_descriptor = matches!(&req.descriptor, Some((d, _)) if d.is_data_descriptor());
    if has_data_descriptor {
        return Ok(SpecializationKind::NoDictDescr);
    }

    if let Some(split) = req.split {
        let _ = split.split_offset_of(name);
        return Ok(if req.is_method_call {
            SpecializationKind::SplitDictMethod
        } else if req.descriptor.is_some() {
            SpecializationKind::SplitDictDescr
        } else {
            SpecializationKind::SplitDict
        });
    }

    if req.layout.dict_offset().is_some() {
        return Ok(if req.is_method_call {
            SpecializationKind::DictMethod
        } else if req.descriptor.is_some() {
            SpecializationKind::DictDescr
        } else {
            SpecializationKind::DictNoDescr
        });
    }

    if req.descriptor.is_some() {
        return Ok(if req.is_method_call {
            SpecializationKind::NoDictMethod
        } else {
            SpecializationKind::NoDictDescr
        });
    }

    Err(CacheError::Uncacheable {
        reason: "no dict, slot, or descriptor resolves this name",
    })
}

/// Classify `(owner_type, name)`, build the resulting [`AttrEntry`], fill
/// in its shape-specific fields from `req`, and register it with
/// `anchor` so future type mutations invalidate it.
pub fn resolve(
    name: &Rc<str>,
    req: &ClassifyRequest<'_>,
    anchor: &CodeCacheAnchor,
) -> Result<Rc<AttrEntry>, CacheError> {
    let kind = classify(name, req)?;
    let entry = Rc::new(AttrEntry::new(name.clone(), req.owner_type, kind));

    match kind {
        SpecializationKind::Slot => {
            if let Some(offset) = req.layout.slot_offset(name) {
                entry.set_slot_offset(offset);
            }
        }
        SpecializationKind::SplitDict
        | SpecializationKind::SplitDictDescr
        | SpecializationKind::SplitDictMethod => {
            if let Some(split) = req.split {
                entry.fill_split(split.keys_identity(), split.entry_count(), split.split_offset_of(name));
            }
        }
        _ => {}
    }

    if let Some((descriptor, _)) = &req.descriptor {
        entry.set_descriptor(descriptor.clone());
    }

    anchor.register(Rc::downgrade(&entry) as std::rc::Weak<dyn Invalidate>);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    struct SlotLayout;
    impl InstanceLayout for SlotLayout {
        fn slot_offset(&self, name: &str) -> Option<usize> {
            (name == "x").then_some(0)
        }
        fn read_slot(&self, _offset: usize) -> Option<Value> {
            None
        }
        fn dict_offset(&self) -> Option<usize> {
            None
        }
    }

    #[test]
    fn slot_wins_when_present() {
        let layout = SlotLayout;
        let req = ClassifyRequest {
            owner_type: 1,
            layout: &layout,
            split: None,
            descriptor: None,
            has_custom_getattr: false,
            is_method_call: false,
        };
        assert_eq!(classify("x", &req).unwrap(), SpecializationKind::Slot);
    }

    #[test]
    fn custom_getattr_is_uncacheable() {
        let layout = SlotLayout;
        let req = ClassifyRequest {
            owner_type: 1,
            layout: &layout,
            split: None,
            descriptor: None,
            has_custom_getattr: true,
            is_method_call: false,
        };
        assert!(classify("x", &req).is_err());
    }
}
