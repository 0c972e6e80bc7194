//! The dispatcher-facing surface: ties a function's [`ShadowCode`] to the
//! resolver and exposes the typed slot accessors and fast paths a
//! bytecode dispatcher calls into.

use std::rc::Rc;

use crate::anchor::CodeCacheAnchor;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::object_model::VersionedDict;
use crate::resolver::{self, ClassifyRequest};
use crate::shadow::ShadowCode;
use crate::specialization::{LoadOutcome, MethodOutcome};
use crate::value::Value;

/// Per-function evaluation state: the shadow table plus whatever the
/// dispatcher needs to drive it. One `EvalState` is built per code
/// object's first execution and lives as long as that code object.
pub struct EvalState {
    shadow: ShadowCode,
}

impl EvalState {
    /// `InitCache`: build the shadow table for a code object on first
    /// execution.
    #[must_use]
    pub fn init(bytecode: Vec<u8>, attr_sites: usize, config: CacheConfig) -> Self {
        Self {
            shadow: ShadowCode::new(bytecode, attr_sites, config),
        }
    }

    #[must_use]
    pub fn shadow(&self) -> &ShadowCode {
        &self.shadow
    }

    /// `PatchByteCode`.
    pub fn patch_bytecode(&self, pc: usize, opcode: u8) {
        self.shadow.patch_bytecode(pc, opcode);
    }

    /// `ClearCache`: drop every specialization, reverting to the generic
    /// path everywhere.
    pub fn clear_cache(&self) {
        self.shadow.clear();
    }

    /// `GetGlobal`.
    pub fn get_global(
        &self,
        offset: usize,
        name: &Rc<str>,
        globals: &dyn VersionedDict,
        builtins: &dyn VersionedDict,
    ) -> Option<Value> {
        self.shadow.globals_entry(offset, name).get(globals, builtins)
    }

    /// `GetModuleAttr`.
    pub fn get_module_attr(&self, offset: usize, name: &Rc<str>, module: &dyn VersionedDict) -> Option<Value> {
        self.shadow.module_attr_entry(offset, name).get(module)
    }

    /// `GetFieldCache`.
    #[must_use]
    pub fn get_field_cache(&self, offset: usize) -> Option<crate::specialization::FieldCache> {
        self.shadow.field_cache_at(offset)
    }

    /// Install a typed-attribute fast path at `offset`, for a dispatcher
    /// that has just classified a field access as a statically known
    /// type. The counterpart `get_field_cache` reads this back on later
    /// executions of the same opcode.
    pub fn set_field_cache(&self, offset: usize, cache: crate::specialization::FieldCache) {
        self.shadow.set_field_cache(offset, cache);
    }

    /// `GetCastType`.
    #[must_use]
    pub fn get_cast_type(&self, offset: usize) -> Option<crate::specialization::TypeId> {
        self.shadow.cast_type_at(offset)
    }

    /// Record the type a cast-check opcode resolved to at `offset`, so a
    /// later execution at the same site can compare against it directly
    /// instead of re-resolving.
    pub fn set_cast_type(&self, offset: usize, type_id: crate::specialization::TypeId) {
        self.shadow.set_cast_type(offset, type_id);
    }

    /// `GetInstanceAttr` / `GetPolymorphicAttr`: try every entry currently
    /// installed at `site` (one if monomorphic, up to the configured bound
    /// if polymorphic) before falling through to the resolver.
    ///
    /// `Ok(None)` means a cacheable shape was installed but the attribute
    /// is genuinely absent on `owner` right now; the caller should raise
    /// the equivalent of an `AttributeError` through `ErrorSink`. `Err`
    /// means the resolver found no shape it can cache at all.
    pub fn get_instance_attr(
        &self,
        site: usize,
        owner: Value,
        req: &ClassifyRequest<'_>,
        name: &Rc<str>,
        anchor: &CodeCacheAnchor,
    ) -> Result<Option<Value>, CacheError> {
        if self.shadow.is_degraded(site) {
            return Err(CacheError::Uncacheable {
                reason: "site permanently degraded after polymorphic overflow",
            });
        }
        for entry in self.shadow.site_entries(site) {
            match entry.load_attr(owner, req.owner_type, req.layout, req.split) {
                LoadOutcome::Hit(v) => return Ok(Some(v)),
                // The shape still matches `owner`'s type; the lookup it
                // performed confirms the attribute is absent. This is not
                // a cache miss, so it must not fall through to the
                // resolver below.
                LoadOutcome::Absent => return Ok(None),
                LoadOutcome::Miss => continue,
            }
        }
        self.load_attr_invalidate(site, owner, req, name, anchor)
    }

    /// Method-call counterpart of [`Self::get_instance_attr`].
    pub fn get_method(
        &self,
        site: usize,
        owner: Value,
        req: &ClassifyRequest<'_>,
        name: &Rc<str>,
        anchor: &CodeCacheAnchor,
    ) -> Result<MethodOutcome, CacheError> {
        if self.shadow.is_degraded(site) {
            return Err(CacheError::Uncacheable {
                reason: "site permanently degraded after polymorphic overflow",
            });
        }
        for entry in self.shadow.site_entries(site) {
            match entry.load_method(owner, req.owner_type, req.layout, req.split) {
                MethodOutcome::Miss => continue,
                outcome => return Ok(outcome),
            }
        }
        match self.load_attr_invalidate(site, owner, req, name, anchor)? {
            None => Ok(MethodOutcome::Absent),
            Some(v) => Ok(if self.shadow.monomorphic_attr(site).is_some_and(|e| e.kind().is_method_variant()) {
                MethodOutcome::Unbound { func: v }
            } else {
                MethodOutcome::Final(v)
            }),
        }
    }

    /// `LOAD_ATTR_CACHE_MISS`-equivalent: the miss stub. Classifies the
    /// target, builds a fresh entry, and installs it at `site` — refreshing
    /// the existing entry in place if `site` already has one for this
    /// owner type, or growing/promoting the site only for a genuinely new
    /// type — then returns the resolved value.
    fn load_attr_invalidate(
        &self,
        site: usize,
        owner: Value,
        req: &ClassifyRequest<'_>,
        name: &Rc<str>,
        anchor: &CodeCacheAnchor,
    ) -> Result<Option<Value>, CacheError> {
        let entry = resolver::resolve(name, req, anchor)?;
        let value = match entry.load_attr(owner, req.owner_type, req.layout, req.split) {
            LoadOutcome::Hit(v) => Some(v),
            LoadOutcome::Absent | LoadOutcome::Miss => None,
        };

        self.shadow.promote_polymorphic(site, entry)?;
        tracing::trace!(site, hit = value.is_some(), "attribute cache miss resolved and installed");
        Ok(value)
    }

    /// `STORE_ATTR_CACHE_MISS`-equivalent.
    pub fn store_attr_invalidate(
        &self,
        site: usize,
        req: &ClassifyRequest<'_>,
        name: &Rc<str>,
        anchor: &CodeCacheAnchor,
        store: &dyn Fn(&str, Value) -> Result<(), CacheError>,
        value: Value,
    ) -> Result<(), CacheError> {
        let entry = resolver::resolve(name, req, anchor)?;
        entry.store_attr(req.owner_type, store, value)?;
        self.shadow.promote_polymorphic(site, entry)?;
        Ok(())
    }
}
