//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are separate responsibilities so that
//! cache logic never depends on how counters are consumed.
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │   GenCacheMetricsRecorder    │   written on the hot path (&self,
//!   │   get/use/add/evict/scan     │   relaxed atomics)
//!   └──────────────┬───────────────┘
//!                  │
//!   Consumption (decoupled from recording):
//!   ┌──────────────▼───────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │───►│ MetricsExporter<S>           │
//!   │ + MetricsReset (bench/test)  │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! All recorder methods take `&self`: the cache is shared between threads
//! and counters are bumped while only a shared shard lock, or no lock, is held.

/// Counters for the sharded cache.
pub trait GenCacheMetricsRecorder {
    fn record_get_hit(&self);
    fn record_get_miss(&self);
    fn record_use_call(&self);
    fn record_promotion(&self);
    fn record_promotion_skip(&self);
    fn record_insert(&self);
    fn record_replace(&self);
    fn record_amend(&self);
    fn record_ignore(&self);
    fn record_local_eviction(&self);
    fn record_remote_eviction(&self);
    fn record_remote_eviction_miss(&self);
    fn record_delete(&self);
    fn record_tombstone(&self);
    fn record_tombstone_reclaim(&self);
    fn record_scan_visit(&self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
