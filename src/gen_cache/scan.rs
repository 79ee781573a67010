//! Full-table iteration that tolerates concurrent mutation.
//!
//! Each shard's SCAN list is walked from the tail (oldest insertion) toward
//! the head. The walker pins the entry it stands on and the one after it, so
//! neither can be freed while the shard lock is dropped between steps. An
//! entry removed while pinned stays on the SCAN list as a tombstone; whoever
//! drops its last pin unlinks it, which takes the exclusive lock.
//!
//! The walk is not a snapshot. Entries added or removed meanwhile may or may
//! not be seen, but an entry that stays live for the whole call is visited
//! exactly once. Each shard's walk stops at the entry that was the SCAN head
//! when it began, so steady inserts cannot keep it running.

use std::ops::Deref;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::GenCache;
use super::shard::{Shard, ShardInner};
use crate::ds::slot_arena::SlotId;
#[cfg(feature = "metrics")]
use crate::metrics::traits::GenCacheMetricsRecorder;

enum ScanGuard<'a, T> {
    Shared(RwLockReadGuard<'a, ShardInner<T>>),
    Exclusive(RwLockWriteGuard<'a, ShardInner<T>>),
}

impl<T> Deref for ScanGuard<'_, T> {
    type Target = ShardInner<T>;

    fn deref(&self) -> &ShardInner<T> {
        match self {
            ScanGuard::Shared(guard) => guard,
            ScanGuard::Exclusive(guard) => guard,
        }
    }
}

impl<T> GenCache<T> {
    /// Calls `visit` with every entry, shard by shard, while holding that
    /// shard's shared lock. Stops as soon as `visit` returns `false`.
    ///
    /// `visit` must not block or call back into the cache.
    ///
    /// ```
    /// use gencache::GenCache;
    ///
    /// let cache = GenCache::new(0);
    /// cache.add("a", 1);
    /// cache.add("b", 2);
    ///
    /// let mut total = 0;
    /// cache.for_each(|_, v| {
    ///     total += *v;
    ///     true
    /// });
    /// assert_eq!(total, 3);
    /// ```
    pub fn for_each<F>(&self, visit: F)
    where
        F: FnMut(&str, &T) -> bool,
    {
        self.scan(visit, None::<fn() -> bool>);
    }

    /// Like [`for_each`](Self::for_each), but also calls `blocking` after
    /// every step of the walk, tombstones included, with no cache lock held.
    /// `blocking` may do I/O or use the cache; returning `false` stops the
    /// iteration.
    pub fn for_each_with_blocking<F, B>(&self, non_blocking: F, blocking: B)
    where
        F: FnMut(&str, &T) -> bool,
        B: FnMut() -> bool,
    {
        self.scan(non_blocking, Some(blocking));
    }

    fn scan<F, B>(&self, mut visit: F, mut blocking: Option<B>)
    where
        F: FnMut(&str, &T) -> bool,
        B: FnMut() -> bool,
    {
        for shard in self.shards.iter() {
            if !self.scan_shard(shard, &mut visit, &mut blocking) {
                return;
            }
        }
    }

    /// Walks one shard. Returns `false` if iteration must stop.
    ///
    /// The walk ends at the SCAN head as of the start, which stays pinned so
    /// it cannot be freed before the walker reaches it.
    fn scan_shard<F, B>(&self, shard: &Shard<T>, visit: &mut F, blocking: &mut Option<B>) -> bool
    where
        F: FnMut(&str, &T) -> bool,
        B: FnMut() -> bool,
    {
        let mut guard = ScanGuard::Shared(shard.read());
        let (Some(mut current), Some(last)) = (guard.scan.back_id(), guard.scan.front_id()) else {
            return true;
        };
        guard.pin(current);
        guard.pin(last);

        loop {
            let next = if current == last {
                None
            } else {
                guard.scan.prev_of(&guard.entries, current)
            };
            if let Some(next) = next {
                guard.pin(next);
            }

            let mut keep_going = true;
            if let Some(entry) = guard.entry(current).filter(|entry| !entry.deleted) {
                keep_going = visit(&entry.id, &entry.value);
                #[cfg(feature = "metrics")]
                self.metrics.record_scan_visit();
            }
            guard = self.unpin(shard, guard, current);

            if keep_going {
                guard = match blocking.as_mut() {
                    Some(blocking) => {
                        drop(guard);
                        keep_going = blocking();
                        ScanGuard::Shared(shard.read())
                    },
                    None => Self::relax(shard, guard),
                };
            }

            match next {
                Some(next) if keep_going => current = next,
                _ => {
                    if let Some(next) = next {
                        guard = self.unpin(shard, guard, next);
                    }
                    drop(self.unpin(shard, guard, last));
                    return keep_going;
                },
            }
        }
    }

    /// Drops a pin on `slot`. Releasing the last pin on a tombstone unlinks
    /// it, which needs the exclusive lock; the returned guard is exclusive in
    /// that case.
    fn unpin<'a>(
        &self,
        shard: &'a Shard<T>,
        guard: ScanGuard<'a, T>,
        slot: SlotId,
    ) -> ScanGuard<'a, T> {
        let mut inner = match guard {
            ScanGuard::Shared(inner) => {
                if inner.try_unpin_shared(slot) {
                    return ScanGuard::Shared(inner);
                }
                drop(inner);
                shard.write()
            },
            ScanGuard::Exclusive(inner) => inner,
        };
        if inner.release(slot) {
            #[cfg(feature = "metrics")]
            self.metrics.record_tombstone_reclaim();
        }
        ScanGuard::Exclusive(inner)
    }

    /// Goes back to shared mode between entries, and steps aside when a
    /// writer is queued on the shard.
    fn relax<'a>(shard: &'a Shard<T>, guard: ScanGuard<'a, T>) -> ScanGuard<'a, T> {
        match guard {
            ScanGuard::Exclusive(inner) => ScanGuard::Shared(RwLockWriteGuard::downgrade(inner)),
            ScanGuard::Shared(inner) if shard.has_waiting_writers() => {
                drop(inner);
                ScanGuard::Shared(shard.read())
            },
            shared => shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    use super::*;

    fn filled(shards: usize, n: usize) -> GenCache<usize> {
        let cache = GenCache::with_shards(0, shards);
        for i in 0..n {
            cache.add(&format!("k{i}"), i);
        }
        cache
    }

    #[test]
    fn for_each_visits_every_entry_once() {
        let cache = filled(4, 100);
        let mut seen = HashSet::new();
        cache.for_each(|id, _| {
            assert!(seen.insert(id.to_string()), "visited {id} twice");
            true
        });
        assert_eq!(seen.len(), 100);
        assert_eq!(cache.debug_pinned_entries(), 0);
    }

    #[test]
    fn single_shard_walks_in_insertion_order() {
        let cache = filled(1, 5);
        // promotion does not move the scan position
        cache.set_limit(6);
        cache.use_entry("k0");
        let mut order = Vec::new();
        cache.for_each(|_, v| {
            order.push(*v);
            true
        });
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn early_stop_leaves_no_pins() {
        let cache = filled(2, 50);
        let mut visits = 0;
        cache.for_each(|_, _| {
            visits += 1;
            visits < 7
        });
        assert_eq!(visits, 7);
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn blocking_false_stops_everything() {
        let cache = filled(4, 40);
        let mut visits = 0;
        let mut calls = 0;
        cache.for_each_with_blocking(
            |_, _| {
                visits += 1;
                true
            },
            || {
                calls += 1;
                calls < 3
            },
        );
        assert_eq!(visits, 3);
        assert_eq!(calls, 3);
        assert_eq!(cache.debug_pinned_entries(), 0);
    }

    #[test]
    fn blocking_callback_may_delete_pinned_next() {
        let cache = filled(1, 6);
        let mut visited = Vec::new();
        let last = Cell::new(None);
        cache.for_each_with_blocking(
            |_, v| {
                visited.push(*v);
                last.set(Some(*v));
                true
            },
            || {
                // remove the entry the walker pinned as its next step
                if let Some(v) = last.take()
                    && v % 2 == 0
                {
                    assert!(cache.delete(&format!("k{}", v + 1)));
                }
                true
            },
        );
        assert_eq!(visited, vec![0, 2, 4]);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
        assert_eq!(cache.names().len(), 3);
    }

    #[test]
    fn blocking_callback_may_delete_current_and_insert() {
        let cache = filled(1, 4);
        let current = RefCell::new(String::new());
        let mut added = 0;
        cache.for_each_with_blocking(
            |id, _| {
                *current.borrow_mut() = id.to_string();
                true
            },
            || {
                let id = current.take();
                if !id.is_empty() {
                    assert!(cache.delete(&id));
                }
                if added < 2 {
                    cache.add(&format!("new{added}"), 100 + added);
                    added += 1;
                }
                true
            },
        );
        // entries added at the head during the walk are past its end
        let mut names = cache.names();
        names.sort();
        assert_eq!(names, vec!["new0", "new1"]);
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn walk_stops_at_head_seen_when_it_began() {
        let cache = filled(1, 3);
        let mut visits = 0;
        let mut added = 0;
        cache.for_each_with_blocking(
            |_, _| {
                visits += 1;
                true
            },
            || {
                cache.add(&format!("late{added}"), added);
                added += 1;
                true
            },
        );
        assert_eq!(visits, 3);
        assert_eq!(added, 3);
        assert_eq!(cache.size(), 6);
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn blocking_runs_for_tombstones_too() {
        let cache = filled(1, 5);
        let shard = &cache.shards[0];
        let slots: Vec<_> = ["k1", "k2"]
            .iter()
            .map(|id| shard.read().slot_of(id).unwrap())
            .collect();
        for &slot in &slots {
            shard.read().pin(slot);
        }
        assert!(cache.delete("k1"));
        assert!(cache.delete("k2"));

        let mut visited = Vec::new();
        let mut calls = 0;
        cache.for_each_with_blocking(
            |_, v| {
                visited.push(*v);
                true
            },
            || {
                calls += 1;
                true
            },
        );
        assert_eq!(visited, vec![0, 3, 4]);
        assert_eq!(calls, 5);

        for slot in slots {
            drop(cache.unpin(shard, ScanGuard::Shared(shard.read()), slot));
        }
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn deleting_the_last_entry_mid_walk_still_ends_cleanly() {
        let cache = filled(1, 4);
        let mut visited = Vec::new();
        cache.for_each_with_blocking(
            |_, v| {
                visited.push(*v);
                true
            },
            || {
                cache.delete("k3");
                true
            },
        );
        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.debug_pinned_entries(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn pinned_entry_deleted_while_shared_lock_dropped_is_reclaimed() {
        let cache = filled(1, 3);
        let shard = &cache.shards[0];
        let slot = shard.read().slot_of("k1").unwrap();

        shard.read().pin(slot);
        assert!(cache.delete("k1"));
        {
            let inner = shard.read();
            assert_eq!(inner.scan.len(), 3);
            assert!(inner.entry(slot).is_some_and(|e| e.deleted));
        }
        cache.check_invariants().unwrap();

        let guard = cache.unpin(shard, ScanGuard::Shared(shard.read()), slot);
        assert!(matches!(guard, ScanGuard::Exclusive(_)));
        drop(guard);
        assert_eq!(shard.read().scan.len(), 2);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn relax_downgrades_exclusive_guard() {
        let cache = filled(1, 1);
        let shard = &cache.shards[0];
        let guard = GenCache::relax(shard, ScanGuard::Exclusive(shard.write()));
        assert!(matches!(guard, ScanGuard::Shared(_)));
        // a second reader can coexist with the downgraded guard
        assert!(shard.read().lookup("k0").is_some());
    }
}
