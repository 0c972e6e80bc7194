//! Per-target cache anchor: the object that owns the specialization
//! catalog for one type or module, reached through [`Cacheable`] rather
//! than a weak-reference chain scan over every live cache entry.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Anything a [`CodeCacheAnchor`] can invalidate. Implemented by the
/// specialization record wrappers so the anchor's catalog can hold them
/// without knowing their concrete kind.
pub trait Invalidate {
    fn invalidate(&self);
}

/// Owns the catalog of specialization records registered against one
/// cacheable target (a type or a module). Created lazily on first cache
/// installation against the target and torn down with it via ordinary
/// `Drop` — no manual teardown call is needed.
#[derive(Default)]
pub struct CodeCacheAnchor {
    invalidate_count: std::cell::Cell<u64>,
    catalog: RefCell<Vec<Weak<dyn Invalidate>>>,
}

impl CodeCacheAnchor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of times this anchor has invalidated its catalog.
    /// Exposed mainly for tests and `profile`-feature telemetry.
    #[must_use]
    pub fn invalidate_count(&self) -> u64 {
        self.invalidate_count.get()
    }

    /// Register a specialization record so future type mutations reach it.
    pub fn register(&self, entry: Weak<dyn Invalidate>) {
        self.catalog.borrow_mut().push(entry);
    }

    /// Called by the embedder on any mutation that can affect attribute
    /// resolution for this target. Walks the catalog, invalidates every
    /// live entry, and drops dead weak references as it goes.
    pub fn invalidate_all(&self) {
        self.invalidate_count.set(self.invalidate_count.get() + 1);
        let mut catalog = self.catalog.borrow_mut();
        catalog.retain(|weak| {
            if let Some(entry) = weak.upgrade() {
                entry.invalidate();
                true
            } else {
                false
            }
        });
        tracing::debug!(count = self.invalidate_count.get(), "cache anchor invalidated");
    }
}

/// Find-or-create the anchor for `target`.
pub fn get_cache<T: crate::object_model::Cacheable>(target: &T) -> Rc<CodeCacheAnchor> {
    if let Some(existing) = find_cache(target) {
        return existing;
    }
    new_cache(target)
}

/// Return the anchor already installed on `target`, if any.
pub fn find_cache<T: crate::object_model::Cacheable>(target: &T) -> Option<Rc<CodeCacheAnchor>> {
    target.anchor_slot().borrow().clone()
}

/// Allocate and install a fresh anchor on `target`, replacing any
/// existing one. Callers normally want [`get_cache`] instead.
pub fn new_cache<T: crate::object_model::Cacheable>(target: &T) -> Rc<CodeCacheAnchor> {
    let anchor = Rc::new(CodeCacheAnchor::new());
    *target.anchor_slot().borrow_mut() = Some(anchor.clone());
    anchor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    struct RecordingEntry(StdCell<bool>);
    impl Invalidate for RecordingEntry {
        fn invalidate(&self) {
            self.0.set(true);
        }
    }

    #[test]
    fn invalidate_all_reaches_every_live_registrant() {
        let anchor = CodeCacheAnchor::new();
        let e1 = Rc::new(RecordingEntry(StdCell::new(false)));
        anchor.register(Rc::downgrade(&e1) as Weak<dyn Invalidate>);

        anchor.invalidate_all();
        assert!(e1.0.get());
        assert_eq!(anchor.invalidate_count(), 1);
    }

    #[test]
    fn dead_registrants_are_pruned() {
        let anchor = CodeCacheAnchor::new();
        {
            let e1 = Rc::new(RecordingEntry(StdCell::new(false)));
            anchor.register(Rc::downgrade(&e1) as Weak<dyn Invalidate>);
        }
        anchor.invalidate_all();
        assert_eq!(anchor.catalog.borrow().len(), 0);
    }
}
