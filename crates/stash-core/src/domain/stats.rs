//! Hit/miss statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time cache statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), rounded to two decimal places; 0.0 before the
    /// first get.
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn from_counts(hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64 * 100.0).round() / 100.0
        };
        Self {
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Counters feeding [`CacheStats`]. Mutated on every get, never reset for
/// the lifetime of the client.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats::from_counts(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
