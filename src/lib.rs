//! Inline-cache acceleration core for a tagged-value, reference-counted
//! object runtime.
//!
//! Two cooperating subsystems live here: the tagged [`value::Value`]
//! encoding that lets small integers flow through the interpreter without
//! allocation, and the shadow-code inline-cache machinery ([`shadow`],
//! [`resolver`], [`specialization`]) that memoizes attribute, method,
//! global, and module lookups per bytecode site.
//!
//! Everything this crate needs from a hosting interpreter's object model
//! is expressed as traits in [`object_model`]; [`testkit`] is a minimal
//! reference implementation of those traits used by this crate's own
//! tests, not a production object model.

/// The tagged-value codec: immediate integers, heap object references,
/// and the distinguished `NULL`.
pub mod value;

/// Per-target cache anchor owning a catalog of specialization records.
pub mod anchor;

/// The closed family of specialization record shapes.
pub mod specialization;

/// Per-function shadow bytecode and cache side-tables.
pub mod shadow;

/// Cache-miss classification and installation.
pub mod resolver;

/// The dispatcher-facing surface tying a function's shadow table to the
/// resolver.
pub mod eval_state;

/// Traits the cache core consumes from a hosting interpreter.
pub mod object_model;

/// Tunable constants for the cache core.
pub mod config;

/// Error types internal to the cache machinery.
pub mod error;

/// Optional per-opcode telemetry, compiled in under the `profile` feature.
pub mod stats;

/// A minimal reference object model used to drive this crate's own tests.
pub mod testkit;

pub use self::anchor::CodeCacheAnchor;
pub use self::config::CacheConfig;
pub use self::error::CacheError;
pub use self::eval_state::EvalState;
pub use self::shadow::ShadowCode;
pub use self::value::{Value, ValueView};
