//! Store activity counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for session store activity since the store was created.
#[derive(Debug, Default)]
pub struct SessionStoreMetrics {
    /// Headers merged into the store, on either path.
    pub updates_applied: AtomicU64,

    /// Updates merged under the shared lock into an existing binding.
    pub fast_path_merges: AtomicU64,

    /// Updates that had to bind a new or changed identity.
    pub rebinds: AtomicU64,

    /// Token tables dropped through replacement or explicit eviction.
    pub evictions: AtomicU64,

    /// Headers dropped because they failed to decode.
    pub decode_failures: AtomicU64,

    /// Resolve calls that found session state.
    pub resolve_hits: AtomicU64,

    /// Resolve calls that found nothing.
    pub resolve_misses: AtomicU64,
}

impl SessionStoreMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_resolve(&self, hit: bool) {
        if hit {
            self.resolve_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.resolve_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> SessionStoreMetricsSnapshot {
        SessionStoreMetricsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            fast_path_merges: self.fast_path_merges.load(Ordering::Relaxed),
            rebinds: self.rebinds.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            resolve_hits: self.resolve_hits.load(Ordering::Relaxed),
            resolve_misses: self.resolve_misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of store metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStoreMetricsSnapshot {
    pub updates_applied: u64,
    pub fast_path_merges: u64,
    pub rebinds: u64,
    pub evictions: u64,
    pub decode_failures: u64,
    pub resolve_hits: u64,
    pub resolve_misses: u64,
}
