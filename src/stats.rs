//! Optional per-opcode cache telemetry, compiled in only under the
//! `profile` feature. Mirrors the source material's `OpcodeCacheStats`
//! tables, but counters are plain `Cell<u64>`s pushed out to `tracing`
//! events rather than a bespoke stats-dump routine, matching how the rest
//! of this crate's ambient stack reports state.

#![cfg(feature = "profile")]

use std::cell::Cell;

/// Counters for one specializable opcode site.
#[derive(Default)]
pub struct SiteStats {
    pub hits: Cell<u64>,
    pub misses: Cell<u64>,
    pub uncacheable: Cell<u64>,
}

impl SiteStats {
    pub fn record_hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    pub fn record_miss(&self) {
        self.misses.set(self.misses.get() + 1);
        tracing::trace!(misses = self.misses.get(), "cache site miss");
    }

    pub fn record_uncacheable(&self, reason: &str) {
        self.uncacheable.set(self.uncacheable.get() + 1);
        tracing::debug!(reason, "cache site marked uncacheable");
    }
}
