//! Lock-striped LRU cache keyed by string ids.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │ GenCache<T>                                                              │
//! │                                                                          │
//! │   limit: AtomicUsize      cur_size: AtomicUsize     last_mru: AtomicU64  │
//! │                                                                          │
//! │   selector: FNV-1a(id) % shards                                          │
//! │        │                                                                 │
//! │        ▼                                                                 │
//! │   ┌────────────────────┐ ┌────────────────────┐     ┌─────────────────┐  │
//! │   │ Shard 0            │ │ Shard 1            │ ... │ Shard N-1       │  │
//! │   │ RwLock<ShardInner> │ │ RwLock<ShardInner> │     │                 │  │
//! │   │  map: id → SlotId  │ │                    │     │                 │  │
//! │   │  lru:  head ◄─► tail (recency, tail evicted)    │                 │  │
//! │   │  scan: head ◄─► tail (insertion, walked tail→head)                 │  │
//! │   └────────────────────┘ └────────────────────┘     └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation locks exactly one shard at a time. When an insert finds
//! the cache full but its own shard empty, it inserts anyway, releases its
//! lock, and only then evicts from the most populous shard. The global size
//! may therefore overshoot the limit by roughly one entry per concurrent
//! inserter; it is never lower than the true number of live entries.
//!
//! ## Promotion
//!
//! Lookups through [`GenCache::use_entry`] only relink an entry at the LRU
//! head when its MRU stamp is stale: the global counter has moved more than
//! `limit / 2` past it, or has wrapped. Fresh entries are served under the
//! shared lock.
//!
//! ## Example
//!
//! ```
//! use gencache::GenCache;
//!
//! let cache = GenCache::new(2);
//! cache.add("a", 1);
//! cache.add("b", 2);
//! cache.use_entry("a");
//! cache.add("c", 3);
//!
//! assert_eq!(cache.size(), 2);
//! assert!(cache.get("b").is_none());
//! assert_eq!(cache.get("a").as_deref(), Some(&1));
//! ```

mod scan;
mod shard;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, trace};

use crate::builder::GenCacheBuilder;
use crate::ds::shard::ShardSelector;
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::GenCacheMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::GenCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{GenCacheMetricsRecorder, MetricsReset, MetricsSnapshotProvider};

use shard::{Shard, ShardInner, Unlinked};

/// Decision returned by the `process` callback of [`GenCache::add_with`]
/// when the id is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAction {
    /// Leave the entry untouched and skip promotion.
    Ignore,
    /// Keep the existing value; the callback changed it in place.
    Amend,
    /// Swap in the new value.
    Replace,
}

/// Which path an add took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Replaced,
    Amended,
    Ignored,
}

/// Concurrent, sharded, size-bounded cache.
///
/// Values are stored as `Arc<T>`; [`get`](Self::get) and
/// [`use_entry`](Self::use_entry) hand out clones of that `Arc`, while the
/// `*_with` variants run a callback against `&T` under the shard lock. A
/// `limit` of zero disables eviction.
pub struct GenCache<T> {
    shards: Box<[Shard<T>]>,
    selector: ShardSelector,
    limit: AtomicUsize,
    cur_size: AtomicUsize,
    last_mru: AtomicU64,
    #[cfg(feature = "metrics")]
    metrics: GenCacheMetrics,
}

impl<T> GenCache<T> {
    /// Creates a cache with the default shard count.
    pub fn new(limit: usize) -> Self {
        GenCacheBuilder::new(limit).build()
    }

    /// Creates a cache with an explicit shard count, clamped to
    /// `1..=`[`MAX_SHARDS`](crate::builder::MAX_SHARDS).
    pub fn with_shards(limit: usize, shards: usize) -> Self {
        GenCacheBuilder::new(limit).shards(shards).build()
    }

    pub(crate) fn from_parts(limit: usize, shards: usize) -> Self {
        let selector = ShardSelector::new(shards);
        let shards = (0..selector.shard_count()).map(|_| Shard::new()).collect();
        Self {
            shards,
            selector,
            limit: AtomicUsize::new(limit),
            cur_size: AtomicUsize::new(0),
            last_mru: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            metrics: GenCacheMetrics::default(),
        }
    }

    /// Approximate number of live entries.
    pub fn size(&self) -> usize {
        self.cur_size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_of(&self, id: &str) -> (usize, &Shard<T>) {
        let idx = self.selector.shard_for_key(id);
        (idx, &self.shards[idx])
    }

    /// Takes the next MRU stamp.
    #[inline]
    fn next_mru(&self) -> u64 {
        self.last_mru.fetch_add(1, Ordering::Relaxed)
    }

    /// True when an entry stamped `stamp` is worth relinking.
    #[inline]
    fn needs_promotion(&self, stamp: u64) -> bool {
        let global = self.last_mru.load(Ordering::Relaxed);
        global < stamp || global - stamp > (self.limit() / 2) as u64
    }

    fn promote_if_stale(&self, inner: &mut ShardInner<T>, slot: SlotId) {
        let Some(stamp) = inner.entry(slot).map(|entry| entry.last_mru) else {
            return;
        };
        if self.needs_promotion(stamp) {
            inner.promote(slot, self.next_mru());
            #[cfg(feature = "metrics")]
            self.metrics.record_promotion();
        } else {
            #[cfg(feature = "metrics")]
            self.metrics.record_promotion_skip();
        }
    }

    fn note_unlinked(&self, how: Unlinked) {
        if how == Unlinked::Tombstoned {
            #[cfg(feature = "metrics")]
            self.metrics.record_tombstone();
        }
    }

    /// Inserts an id the caller knows to be absent. No capacity check is
    /// made; meant for bulk loading a cache sized up front.
    ///
    /// Should the id exist after all, its value is replaced in place.
    pub fn fast_add(&self, id: &str, contents: T) {
        let (_, shard) = self.shard_of(id);
        let mut inner = shard.write();
        if let Some(slot) = inner.slot_of(id) {
            inner.replace(slot, Arc::new(contents));
            #[cfg(feature = "metrics")]
            self.metrics.record_replace();
            return;
        }
        inner.insert(Arc::from(id), Arc::new(contents), self.next_mru());
        self.cur_size.fetch_add(1, Ordering::Relaxed);
        shard.publish(&inner);
        #[cfg(feature = "metrics")]
        self.metrics.record_insert();
    }

    /// Inserts `contents`, replacing any existing value.
    pub fn add(&self, id: &str, contents: T) -> AddOutcome {
        self.add_inner(id, contents, None::<fn(&T) -> AddAction>)
    }

    /// Inserts `contents`. If `id` is present, `process` is called with the
    /// current value under the shard's exclusive lock and decides what to do.
    ///
    /// `process` must not block or re-enter the cache.
    pub fn add_with<F>(&self, id: &str, contents: T, process: F) -> AddOutcome
    where
        F: FnOnce(&T) -> AddAction,
    {
        self.add_inner(id, contents, Some(process))
    }

    fn add_inner<F>(&self, id: &str, contents: T, process: Option<F>) -> AddOutcome
    where
        F: FnOnce(&T) -> AddAction,
    {
        let (idx, shard) = self.shard_of(id);
        let mut inner = shard.write();

        if let Some(slot) = inner.slot_of(id) {
            let action = match (process, inner.entry(slot)) {
                (Some(process), Some(entry)) => process(&entry.value),
                _ => AddAction::Replace,
            };
            let outcome = match action {
                AddAction::Ignore => {
                    #[cfg(feature = "metrics")]
                    self.metrics.record_ignore();
                    return AddOutcome::Ignored;
                },
                AddAction::Amend => {
                    #[cfg(feature = "metrics")]
                    self.metrics.record_amend();
                    AddOutcome::Amended
                },
                AddAction::Replace => {
                    inner.replace(slot, Arc::new(contents));
                    #[cfg(feature = "metrics")]
                    self.metrics.record_replace();
                    AddOutcome::Replaced
                },
            };
            self.promote_if_stale(&mut inner, slot);
            shard.publish(&inner);
            return outcome;
        }

        let limit = self.limit();
        let mut evict_elsewhere = false;
        let mut evicted_locally = false;
        if limit > 0 && self.size() >= limit {
            match inner.evict_lru() {
                Some((victim, how)) => {
                    trace!(shard = idx, id = %victim, "evicted local lru tail");
                    self.note_unlinked(how);
                    evicted_locally = true;
                    #[cfg(feature = "metrics")]
                    self.metrics.record_local_eviction();
                },
                None => evict_elsewhere = true,
            }
        }

        inner.insert(Arc::from(id), Arc::new(contents), self.next_mru());
        if !evicted_locally {
            self.cur_size.fetch_add(1, Ordering::Relaxed);
        }
        shard.publish(&inner);
        drop(inner);
        #[cfg(feature = "metrics")]
        self.metrics.record_insert();

        if evict_elsewhere {
            self.evict_remote();
        }
        AddOutcome::Inserted
    }

    /// Most populous shard by published length; ties go to the oldest LRU
    /// tail, then the lowest index.
    fn pick_victim(&self) -> usize {
        let mut best = 0;
        for (idx, shard) in self.shards.iter().enumerate().skip(1) {
            let current = &self.shards[best];
            let len = shard.len_hint();
            let best_len = current.len_hint();
            if len > best_len || (len == best_len && shard.tail_hint() < current.tail_hint()) {
                best = idx;
            }
        }
        best
    }

    /// Evicts one entry from the fullest shard. Called with no lock held.
    fn evict_remote(&self) {
        let idx = self.pick_victim();
        let shard = &self.shards[idx];
        let mut inner = shard.write();
        match inner.evict_lru() {
            Some((victim, how)) => {
                shard.publish(&inner);
                drop(inner);
                self.cur_size.fetch_sub(1, Ordering::Relaxed);
                trace!(shard = idx, id = %victim, "evicted remote lru tail");
                self.note_unlinked(how);
                #[cfg(feature = "metrics")]
                self.metrics.record_remote_eviction();
            },
            None => {
                drop(inner);
                debug!(
                    shard = idx,
                    size = self.size(),
                    limit = self.limit(),
                    "remote eviction found nothing to evict"
                );
                #[cfg(feature = "metrics")]
                self.metrics.record_remote_eviction_miss();
            },
        }
    }

    fn lookup_shared<R>(&self, id: &str, f: impl FnOnce(&Arc<T>) -> R) -> Option<R> {
        let (_, shard) = self.shard_of(id);
        let inner = shard.read();
        let found = inner.lookup(id).map(|entry| f(&entry.value));
        #[cfg(feature = "metrics")]
        {
            if found.is_some() {
                self.metrics.record_get_hit();
            } else {
                self.metrics.record_get_miss();
            }
        }
        found
    }

    /// Returns the value for `id` without touching its recency.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.lookup_shared(id, Arc::clone)
    }

    /// Runs `f` on the value for `id` under the shard's shared lock.
    pub fn get_with<R>(&self, id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lookup_shared(id, |value| f(value))
    }

    pub fn contains(&self, id: &str) -> bool {
        let (_, shard) = self.shard_of(id);
        shard.read().lookup(id).is_some()
    }

    /// Returns the value for `id`, promoting it in the LRU order when its
    /// stamp is stale.
    ///
    /// Without a limit, or while the entry is fresh, this costs the same as
    /// [`get`](Self::get).
    pub fn use_entry(&self, id: &str) -> Option<Arc<T>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_use_call();
        if self.limit() == 0 {
            return self.get(id);
        }

        let (_, shard) = self.shard_of(id);
        {
            let inner = shard.read();
            let Some(entry) = inner.lookup(id) else {
                #[cfg(feature = "metrics")]
                self.metrics.record_get_miss();
                return None;
            };
            if !self.needs_promotion(entry.last_mru) {
                #[cfg(feature = "metrics")]
                {
                    self.metrics.record_get_hit();
                    self.metrics.record_promotion_skip();
                }
                return Some(Arc::clone(&entry.value));
            }
        }

        let mut inner = shard.write();
        let Some(slot) = inner.slot_of(id) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return None;
        };
        self.promote_if_stale(&mut inner, slot);
        shard.publish(&inner);
        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();
        inner.entry(slot).map(|entry| Arc::clone(&entry.value))
    }

    /// Runs `f` on the value for `id` under the shard's exclusive lock,
    /// promoting the entry when its stamp is stale.
    ///
    /// `f` must not block or re-enter the cache.
    pub fn use_with<R>(&self, id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        #[cfg(feature = "metrics")]
        self.metrics.record_use_call();
        let (_, shard) = self.shard_of(id);
        let mut inner = shard.write();
        let Some(slot) = inner.slot_of(id) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return None;
        };
        if self.limit() > 0 {
            self.promote_if_stale(&mut inner, slot);
            shard.publish(&inner);
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();
        inner.entry(slot).map(|entry| f(&entry.value))
    }

    /// Removes `id`. Returns `true` if it was present.
    pub fn delete(&self, id: &str) -> bool {
        self.remove_if(id, |_| true)
    }

    /// Removes `id`, first running `cleanup` on its value under the shard's
    /// exclusive lock.
    pub fn delete_with(&self, id: &str, cleanup: impl FnOnce(&T)) -> bool {
        self.remove_if(id, |value| {
            cleanup(value);
            true
        })
    }

    /// Removes `id` only if `check` returns `true` for its value. `check`
    /// runs under the shard's exclusive lock.
    pub fn delete_with_check(&self, id: &str, check: impl FnOnce(&T) -> bool) -> bool {
        self.remove_if(id, check)
    }

    fn remove_if(&self, id: &str, check: impl FnOnce(&T) -> bool) -> bool {
        let (_, shard) = self.shard_of(id);
        let mut inner = shard.write();
        let Some(slot) = inner.slot_of(id) else {
            return false;
        };
        if !inner.entry(slot).is_some_and(|entry| check(&entry.value)) {
            return false;
        }
        let Some((_, how)) = inner.remove(slot) else {
            return false;
        };
        shard.publish(&inner);
        drop(inner);
        self.cur_size.fetch_sub(1, Ordering::Relaxed);
        self.note_unlinked(how);
        #[cfg(feature = "metrics")]
        self.metrics.record_delete();
        true
    }

    /// Changes the limit and evicts, one LRU tail per shard per round, until
    /// the size fits. Zero removes the bound.
    pub fn set_limit(&self, limit: usize) {
        let previous = self.limit.swap(limit, Ordering::Relaxed);
        if limit == 0 {
            debug!(previous, "cache limit removed");
            return;
        }

        let mut evicted = 0usize;
        'rounds: while self.size() > limit {
            let mut progressed = false;
            for (idx, shard) in self.shards.iter().enumerate() {
                if self.size() <= limit {
                    break 'rounds;
                }
                let mut inner = shard.write();
                let Some((victim, how)) = inner.evict_lru() else {
                    continue;
                };
                shard.publish(&inner);
                drop(inner);
                self.cur_size.fetch_sub(1, Ordering::Relaxed);
                trace!(shard = idx, id = %victim, "evicted lru tail on shrink");
                self.note_unlinked(how);
                #[cfg(feature = "metrics")]
                self.metrics.record_local_eviction();
                evicted += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        debug!(previous, limit, evicted, size = self.size(), "cache limit updated");
    }

    /// Ids present at some point during the call, each once.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.size());
        self.for_each(|id, _| {
            names.push(id.to_string());
            true
        });
        names
    }

    /// Validates every shard's map and lists.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (idx, shard) in self.shards.iter().enumerate() {
            shard
                .read()
                .validate()
                .map_err(|msg| InvariantError::new(format!("shard {idx}: {msg}")))?;
        }
        Ok(())
    }

    /// Entries currently pinned by an iterator.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_pinned_entries(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let inner = shard.read();
                inner.entries.iter().filter(|(_, entry)| entry.refs() > 0).count()
            })
            .sum()
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> GenCacheMetricsSnapshot {
        GenCacheMetricsSnapshot {
            size: self.size(),
            limit: self.limit(),
            shards: self.shard_count(),
            ..self.metrics.counters()
        }
    }
}

impl<T> fmt::Debug for GenCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenCache")
            .field("size", &self.size())
            .field("limit", &self.limit())
            .field("shards", &self.shard_count())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl<T> MetricsSnapshotProvider<GenCacheMetricsSnapshot> for GenCache<T> {
    fn snapshot(&self) -> GenCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

#[cfg(feature = "metrics")]
impl<T> MetricsReset for GenCache<T> {
    fn reset_metrics(&self) {
        self.metrics.reset_metrics();
    }
}
