/// Point-in-time copy of a cache's counters.
///
/// Counters are monotonic until reset. `size`, `limit` and `shards` are
/// gauges captured when the snapshot is taken.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenCacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub use_calls: u64,
    pub promotions: u64,
    pub promotion_skips: u64, // stamp still fresh, LRU relink skipped

    pub inserts: u64,
    pub replaces: u64,
    pub amends: u64,
    pub ignores: u64,

    pub local_evictions: u64,
    pub remote_evictions: u64,
    pub remote_eviction_misses: u64, // victim shard had nothing to evict

    pub deletes: u64,
    pub tombstones: u64,
    pub tombstones_reclaimed: u64,
    pub scan_visits: u64,

    // gauges captured at snapshot time
    pub size: usize,
    pub limit: usize,
    pub shards: usize,
}

impl GenCacheMetricsSnapshot {
    /// Fraction of lookups that hit, or `0.0` before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }

    /// Evictions of either kind.
    pub fn evictions(&self) -> u64 {
        self.local_evictions + self.remote_evictions
    }
}
