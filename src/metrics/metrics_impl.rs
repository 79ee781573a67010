use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::GenCacheMetricsSnapshot;
use crate::metrics::traits::{GenCacheMetricsRecorder, MetricsReset};

/// Relaxed atomic counters shared by every shard of a cache.
///
/// Counters are observational only; they are never read to make a cache
/// decision, so relaxed ordering is enough.
#[derive(Debug, Default)]
pub struct GenCacheMetrics {
    get_hits: AtomicU64,
    get_misses: AtomicU64,
    use_calls: AtomicU64,
    promotions: AtomicU64,
    promotion_skips: AtomicU64,
    inserts: AtomicU64,
    replaces: AtomicU64,
    amends: AtomicU64,
    ignores: AtomicU64,
    local_evictions: AtomicU64,
    remote_evictions: AtomicU64,
    remote_eviction_misses: AtomicU64,
    deletes: AtomicU64,
    tombstones: AtomicU64,
    tombstones_reclaimed: AtomicU64,
    scan_visits: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl GenCacheMetrics {
    /// Copies the counters into a snapshot. Gauges are left at zero for the
    /// caller to fill in.
    pub fn counters(&self) -> GenCacheMetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let get_hits = load(&self.get_hits);
        let get_misses = load(&self.get_misses);
        GenCacheMetricsSnapshot {
            get_calls: get_hits + get_misses,
            get_hits,
            get_misses,
            use_calls: load(&self.use_calls),
            promotions: load(&self.promotions),
            promotion_skips: load(&self.promotion_skips),
            inserts: load(&self.inserts),
            replaces: load(&self.replaces),
            amends: load(&self.amends),
            ignores: load(&self.ignores),
            local_evictions: load(&self.local_evictions),
            remote_evictions: load(&self.remote_evictions),
            remote_eviction_misses: load(&self.remote_eviction_misses),
            deletes: load(&self.deletes),
            tombstones: load(&self.tombstones),
            tombstones_reclaimed: load(&self.tombstones_reclaimed),
            scan_visits: load(&self.scan_visits),
            ..Default::default()
        }
    }
}

impl GenCacheMetricsRecorder for GenCacheMetrics {
    fn record_get_hit(&self) {
        bump(&self.get_hits);
    }

    fn record_get_miss(&self) {
        bump(&self.get_misses);
    }

    fn record_use_call(&self) {
        bump(&self.use_calls);
    }

    fn record_promotion(&self) {
        bump(&self.promotions);
    }

    fn record_promotion_skip(&self) {
        bump(&self.promotion_skips);
    }

    fn record_insert(&self) {
        bump(&self.inserts);
    }

    fn record_replace(&self) {
        bump(&self.replaces);
    }

    fn record_amend(&self) {
        bump(&self.amends);
    }

    fn record_ignore(&self) {
        bump(&self.ignores);
    }

    fn record_local_eviction(&self) {
        bump(&self.local_evictions);
    }

    fn record_remote_eviction(&self) {
        bump(&self.remote_evictions);
    }

    fn record_remote_eviction_miss(&self) {
        bump(&self.remote_eviction_misses);
    }

    fn record_delete(&self) {
        bump(&self.deletes);
    }

    fn record_tombstone(&self) {
        bump(&self.tombstones);
    }

    fn record_tombstone_reclaim(&self) {
        bump(&self.tombstones_reclaimed);
    }

    fn record_scan_visit(&self) {
        bump(&self.scan_visits);
    }
}

impl MetricsReset for GenCacheMetrics {
    fn reset_metrics(&self) {
        for counter in [
            &self.get_hits,
            &self.get_misses,
            &self.use_calls,
            &self.promotions,
            &self.promotion_skips,
            &self.inserts,
            &self.replaces,
            &self.amends,
            &self.ignores,
            &self.local_evictions,
            &self.remote_evictions,
            &self.remote_eviction_misses,
            &self.deletes,
            &self.tombstones,
            &self.tombstones_reclaimed,
            &self.scan_visits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
