/// Tunables for the cache core, broken out of the source material's
/// compile-time constants so an embedder can adjust them without
/// forking the crate.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Bound on a polymorphic cache site's entry array. The reference
    /// subsystem this crate is modeled on uses 4; sites that would grow
    /// past this degrade permanently to the generic path.
    pub max_polymorphic_entries: usize,

    /// Initial capacity reserved for a function's globals-cache array
    /// when its shadow table is first built.
    pub initial_globals_capacity: usize,

    /// Initial capacity reserved for a function's field-cache array.
    pub initial_field_cache_capacity: usize,
}

impl CacheConfig {
    /// Smallest sane configuration, useful for tests that want to
    /// exercise polymorphic overflow without four round trips.
    #[must_use]
    pub fn with_max_polymorphic_entries(mut self, n: usize) -> Self {
        self.max_polymorphic_entries = n;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_polymorphic_entries: 4,
            initial_globals_capacity: 16,
            initial_field_cache_capacity: 8,
        }
    }
}
