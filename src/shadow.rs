//! Per-function side table: rewritten bytecode plus every cache array the
//! fast paths consult. One `ShadowCode` is owned exclusively by the code
//! object it specializes and is built lazily on that function's first
//! execution.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::specialization::{AttrEntry, FieldCache, GlobalsCacheEntry, ModuleAttrEntry, TypeId};

/// A call site's instance-attribute cache: either empty, a single
/// monomorphic entry, or a bounded polymorphic array. Matches
/// `InlineCacheState::{Monomorphic, Polymorphic}` from the jit-helper
/// style this crate follows — a sum type rather than a fixed-size array
/// with a separate "how many are used" counter.
enum SiteCache {
    Empty,
    Monomorphic(Rc<AttrEntry>),
    Polymorphic(Vec<Rc<AttrEntry>>),
    /// A fifth distinct type arrived at a full polymorphic site; this
    /// site never caches again.
    Degraded,
}

impl Default for SiteCache {
    fn default() -> Self {
        SiteCache::Empty
    }
}

/// The complete per-function cache side table.
pub struct ShadowCode {
    bytecode: RefCell<Vec<u8>>,
    globals: RefCell<Vec<Rc<GlobalsCacheEntry>>>,
    attr_sites: RefCell<Vec<SiteCache>>,
    module_attrs: RefCell<Vec<Option<Rc<ModuleAttrEntry>>>>,
    field_cache: RefCell<Vec<Option<FieldCache>>>,
    cast_type_cache: RefCell<Vec<Option<TypeId>>>,
    update_count: Cell<u64>,
    config: CacheConfig,
}

impl ShadowCode {
    /// Build a shadow table for a function whose (already compiled)
    /// bytecode is `bytecode` and which has `attr_sites` specializable
    /// attribute/method call sites.
    #[must_use]
    pub fn new(bytecode: Vec<u8>, attr_sites: usize, config: CacheConfig) -> Self {
        let mut sites = Vec::with_capacity(attr_sites);
        sites.resize_with(attr_sites, SiteCache::default);
        Self {
            bytecode: RefCell::new(bytecode),
            globals: RefCell::new(Vec::with_capacity(config.initial_globals_capacity)),
            attr_sites: RefCell::new(sites),
            module_attrs: RefCell::new(Vec::new()),
            field_cache: RefCell::new(Vec::with_capacity(config.initial_field_cache_capacity)),
            cast_type_cache: RefCell::new(Vec::new()),
            update_count: Cell::new(0),
            config,
        }
    }

    /// In-place opcode rewrite. Valid only under the single-threaded
    /// dispatch guarantee this crate assumes: concurrent dispatch through
    /// a half-patched opcode would be unsound.
    pub fn patch_bytecode(&self, pc: usize, opcode: u8) {
        self.bytecode.borrow_mut()[pc] = opcode;
        self.update_count.set(self.update_count.get() + 1);
    }

    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count.get()
    }

    #[must_use]
    pub fn bytecode_at(&self, pc: usize) -> u8 {
        self.bytecode.borrow()[pc]
    }

    /// Globals-cache slot accessor, growing the array if the compiler
    /// assigned an offset past the current length.
    pub fn globals_entry(&self, offset: usize, name: &Rc<str>) -> Rc<GlobalsCacheEntry> {
        let mut globals = self.globals.borrow_mut();
        if offset >= globals.len() {
            globals.resize_with(offset + 1, || Rc::new(GlobalsCacheEntry::new(Rc::from(""))));
        }
        if globals[offset].name().is_empty() {
            globals[offset] = Rc::new(GlobalsCacheEntry::new(name.clone()));
        }
        globals[offset].clone()
    }

    /// Look up the current monomorphic entry for an attribute site, if any.
    #[must_use]
    pub fn monomorphic_attr(&self, site: usize) -> Option<Rc<AttrEntry>> {
        match &self.attr_sites.borrow()[site] {
            SiteCache::Monomorphic(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// All entries currently installed at a (possibly polymorphic) site.
    #[must_use]
    pub fn site_entries(&self, site: usize) -> Vec<Rc<AttrEntry>> {
        match &self.attr_sites.borrow()[site] {
            SiteCache::Empty | SiteCache::Degraded => Vec::new(),
            SiteCache::Monomorphic(e) => vec![e.clone()],
            SiteCache::Polymorphic(v) => v.clone(),
        }
    }

    #[must_use]
    pub fn is_degraded(&self, site: usize) -> bool {
        matches!(self.attr_sites.borrow()[site], SiteCache::Degraded)
    }

    /// Install the first (or a replacement) monomorphic entry at `site`.
    pub fn install_monomorphic(&self, site: usize, entry: Rc<AttrEntry>) {
        self.attr_sites.borrow_mut()[site] = SiteCache::Monomorphic(entry);
    }

    /// Install `entry` at `site`. If the site already holds an entry for
    /// the same owner type (monomorphic or already polymorphic), that
    /// entry is refreshed in place — a type repeatedly taking the miss
    /// path (a genuinely absent attribute, or a negative split-dict hit
    /// whose shape since changed) must not grow the site on every access.
    /// Only a genuinely new type promotes an empty/monomorphic site to
    /// polymorphic or appends to one, and only that growth is bounded:
    /// the site degrades permanently (and this returns `Err`) once a
    /// *distinct* type would push the array past
    /// `config.max_polymorphic_entries`.
    pub fn promote_polymorphic(&self, site: usize, entry: Rc<AttrEntry>) -> Result<(), CacheError> {
        let mut sites = self.attr_sites.borrow_mut();
        let slot = &mut sites[site];
        match slot {
            SiteCache::Empty => {
                *slot = SiteCache::Monomorphic(entry);
                Ok(())
            }
            SiteCache::Monomorphic(existing) => {
                if existing.owner_type() == entry.owner_type() {
                    *existing = entry;
                    return Ok(());
                }
                let mut entries = vec![existing.clone(), entry];
                entries.truncate(self.config.max_polymorphic_entries);
                *slot = SiteCache::Polymorphic(entries);
                Ok(())
            }
            SiteCache::Polymorphic(entries) => {
                if let Some(existing) = entries.iter_mut().find(|e| e.owner_type() == entry.owner_type()) {
                    *existing = entry;
                    return Ok(());
                }
                if entries.len() >= self.config.max_polymorphic_entries {
                    *slot = SiteCache::Degraded;
                    return Err(CacheError::PolymorphicOverflow);
                }
                entries.push(entry);
                Ok(())
            }
            SiteCache::Degraded => Err(CacheError::PolymorphicOverflow),
        }
    }

    pub fn module_attr_entry(&self, offset: usize, name: &Rc<str>) -> Rc<ModuleAttrEntry> {
        let mut entries = self.module_attrs.borrow_mut();
        if offset >= entries.len() {
            entries.resize_with(offset + 1, || None);
        }
        entries[offset]
            .get_or_insert_with(|| Rc::new(ModuleAttrEntry::new(name.clone())))
            .clone()
    }

    pub fn set_field_cache(&self, offset: usize, cache: FieldCache) {
        let mut entries = self.field_cache.borrow_mut();
        if offset >= entries.len() {
            entries.resize_with(offset + 1, || None);
        }
        entries[offset] = Some(cache);
    }

    #[must_use]
    pub fn field_cache_at(&self, offset: usize) -> Option<FieldCache> {
        self.field_cache.borrow().get(offset).copied().flatten()
    }

    pub fn set_cast_type(&self, offset: usize, type_id: TypeId) {
        let mut entries = self.cast_type_cache.borrow_mut();
        if offset >= entries.len() {
            entries.resize_with(offset + 1, || None);
        }
        entries[offset] = Some(type_id);
    }

    #[must_use]
    pub fn cast_type_at(&self, offset: usize) -> Option<TypeId> {
        self.cast_type_cache.borrow().get(offset).copied().flatten()
    }

    /// Drop every specialization in this table, reverting all sites to
    /// the generic path. Does not reset the rewritten bytecode's opcodes;
    /// callers wanting a full reset should also reinstall the original
    /// generic opcodes.
    pub fn clear(&self) {
        for site in self.attr_sites.borrow_mut().iter_mut() {
            *site = SiteCache::Empty;
        }
        self.module_attrs.borrow_mut().clear();
        self.field_cache.borrow_mut().clear();
        self.cast_type_cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialization::SpecializationKind;

    fn entry(tag: crate::specialization::TypeId) -> Rc<AttrEntry> {
        Rc::new(AttrEntry::new(Rc::from("x"), tag, SpecializationKind::Slot))
    }

    #[test]
    fn promotion_bound_is_four_then_degrades() {
        let shadow = ShadowCode::new(vec![0; 4], 1, CacheConfig::default());
        shadow.install_monomorphic(0, entry(1));
        shadow.promote_polymorphic(0, entry(2)).unwrap();
        shadow.promote_polymorphic(0, entry(3)).unwrap();
        shadow.promote_polymorphic(0, entry(4)).unwrap();
        assert_eq!(shadow.site_entries(0).len(), 4);
        assert!(!shadow.is_degraded(0));

        assert!(shadow.promote_polymorphic(0, entry(5)).is_err());
        assert!(shadow.is_degraded(0));
        assert!(shadow.site_entries(0).is_empty());

        assert!(shadow.promote_polymorphic(0, entry(6)).is_err());
    }

    #[test]
    fn patch_bytecode_rewrites_in_place_and_bumps_update_count() {
        let shadow = ShadowCode::new(vec![0x01, 0x02], 0, CacheConfig::default());
        shadow.patch_bytecode(0, 0xAA);
        assert_eq!(shadow.bytecode_at(0), 0xAA);
        assert_eq!(shadow.update_count(), 1);
    }
}
