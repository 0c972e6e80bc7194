use thiserror::Error;

/// Errors the cache core can report to its embedder.
///
/// Attribute-errors and other host-language exceptions are never
/// represented here; those flow through [`crate::object_model::ErrorSink`]
/// instead. This enum only covers failures internal to the cache
/// machinery itself.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Boxing an immediate value into a heap object failed because the
    /// embedder's allocator returned `None`.
    #[error("allocation failed while boxing a value")]
    AllocFailed,

    /// A polymorphic site would have grown past [`crate::config::CacheConfig::max_polymorphic_entries`].
    /// Not fatal; the caller degrades the site to the generic path.
    #[error("polymorphic cache site overflowed its bound")]
    PolymorphicOverflow,

    /// The resolver classified the target but found no specialization
    /// shape it can safely cache.
    #[error("no cacheable shape for this attribute access: {reason}")]
    Uncacheable {
        /// Human-readable classification failure, kept for `tracing` events.
        reason: &'static str,
    },
}
