//! The closed family of specialization record shapes.
//!
//! Every shape answers the same four-operation contract (load-attr,
//! load-method, store-attr, invalidate); this crate represents the family
//! as a single enum matched on kind rather than a table of per-kind
//! trait objects, since the full set of kinds is closed and none of them
//! needs independent dynamic dispatch outside this module.

mod field;
mod globals;
mod instance;
mod module;

pub use field::{FieldCache, FieldTypeTag};
pub use globals::GlobalsCacheEntry;
pub use instance::{AttrEntry, SpecializationKind};
pub use module::ModuleAttrEntry;

use crate::value::Value;

/// Identity of an embedder type or module object, used for the hit-check
/// `entry.type == type_of(owner)` comparison. This crate does not need to
/// know the embedder's real type layout; a stable pointer-derived identity
/// is sufficient and is what the source material's identity compare
/// amounts to as well.
pub type TypeId = usize;

/// Outcome of an attribute load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fast path resolved a value.
    Hit(Value),
    /// The cached shape still matches the owner, and the lookup it
    /// performed confirms the attribute is not present — an
    /// attribute-error, not a cache miss. The caller must not re-run the
    /// resolver; it should surface the error directly.
    Absent,
    /// No usable cache entry (type mismatch, invalidated entry, or a
    /// shape-identifying key changed); caller must fall back to the
    /// resolver.
    Miss,
}

/// Outcome of a method load attempt. Distinguishes "bound method must be
/// constructed by the caller" from "this value is already the final
/// result" so the dispatcher can skip allocating a bound-method object on
/// the common case of a plain function pulled off the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOutcome {
    /// `owner` and `func` should be combined into a bound method by the
    /// caller (or pushed as a pair for a direct call, per the dispatcher's
    /// own convention).
    Unbound { func: Value },
    /// The resolved value is final; no binding step needed.
    Final(Value),
    /// The cached shape still matches; the method is confirmed absent.
    Absent,
    /// No usable cache entry.
    Miss,
}
