// ==============================================
// GENCACHE CONCURRENCY TESTS (integration)
// ==============================================
//
// Multi-threaded behaviour: iteration under churn and under eviction, the
// soft capacity bound with many inserters, limit shrinking under load, and
// callbacks that re-enter the cache. These need real threads and cannot live inline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use gencache::GenCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ==============================================
// Iteration under churn
// ==============================================
//
// Stable ids are never touched after setup. Churn ids are unique per thread
// and step, so no id is ever replaced by a second entry: any repeat visit is
// a real duplicate.

mod iteration_under_churn {
    use super::*;

    const STABLE: usize = 500;
    const MAX_WRITER_STEPS: usize = 50_000;

    fn run(threads: usize, rounds: usize, blocking: bool) {
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(0, 8));
        for i in 0..STABLE {
            cache.add(&format!("stable-{i}"), i);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(threads + 1));
        let mut handles = Vec::new();

        for t in 0..threads {
            let cache = cache.clone();
            let stop = stop.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let mut live = Vec::new();
                let mut n = 0usize;
                barrier.wait();
                for _ in 0..MAX_WRITER_STEPS {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if live.is_empty() || rng.random_bool(0.6) {
                        let id = format!("churn-{t}-{n}");
                        n += 1;
                        cache.add(&id, n);
                        live.push(id);
                    } else {
                        let idx = rng.random_range(0..live.len());
                        let id = live.swap_remove(idx);
                        assert!(cache.delete(&id));
                    }
                }
            }));
        }

        barrier.wait();
        for _ in 0..rounds {
            let mut seen = HashSet::new();
            let mut stable_seen = 0;
            let visit = |id: &str, _: &usize| {
                assert!(seen.insert(id.to_string()), "{id} visited twice");
                if id.starts_with("stable-") {
                    stable_seen += 1;
                }
                true
            };
            if blocking {
                cache.for_each_with_blocking(visit, || {
                    thread::yield_now();
                    true
                });
            } else {
                cache.for_each(visit);
            }
            assert_eq!(stable_seen, STABLE, "a stable entry was skipped");
        }

        stop.store(true, Ordering::Relaxed);
        for handle in handles {
            handle.join().unwrap();
        }

        cache.check_invariants().unwrap();
        assert_eq!(cache.size(), cache.names().len());
    }

    #[test]
    fn for_each_never_duplicates_or_skips_stable_entries() {
        run(4, 50, false);
    }

    #[test]
    fn blocking_for_each_never_duplicates_or_skips_stable_entries() {
        run(4, 10, true);
    }
}

// ==============================================
// Iteration while inserts never stop
// ==============================================
//
// Each shard walk ends at the head it saw when it began, so a scan finishes
// even when writers keep pushing new entries in front of it.

mod bounded_walk {
    use super::*;

    #[test]
    fn blocking_for_each_returns_while_writers_insert() {
        let limit = 64;
        let shards = 8;
        let writers = 2;
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(limit, shards));
        for i in 0..limit {
            cache.add(&format!("seed-{i}"), i);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(writers + 1));
        let handles: Vec<_> = (0..writers)
            .map(|t| {
                let cache = cache.clone();
                let stop = stop.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut n = 0usize;
                    while !stop.load(Ordering::Relaxed) {
                        let id = format!("w{t}-{n}");
                        cache.add(&id, n);
                        cache.use_entry(&id);
                        n += 1;
                    }
                })
            })
            .collect();

        barrier.wait();
        for _ in 0..5 {
            let mut visits = 0usize;
            cache.for_each_with_blocking(
                |_, _| {
                    visits += 1;
                    true
                },
                || {
                    thread::yield_now();
                    true
                },
            );
            assert!(
                visits <= (limit + writers) * shards,
                "walk visited {visits} entries in a cache of about {limit}"
            );
        }

        stop.store(true, Ordering::Relaxed);
        for handle in handles {
            handle.join().unwrap();
        }
        cache.check_invariants().unwrap();
    }
}

// ==============================================
// Iteration against eviction
// ==============================================
//
// Evictions from `add` and from a moving limit tombstone entries the
// scanners hold pinned. Ids are unique per writer and step, so any repeat
// visit is a duplicate.

mod eviction_churn {
    use super::*;

    #[test]
    fn scans_survive_eviction_and_limit_changes() {
        let writers = 3;
        let steps = 20_000;
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(128, 8));
        let done = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(writers + 3));

        let mut handles: Vec<_> = (0..writers)
            .map(|t| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(500 + t as u64);
                    barrier.wait();
                    for n in 0..steps {
                        cache.add(&format!("e{t}-{n}"), n);
                        if rng.random_bool(0.3) {
                            cache.use_entry(&format!("e{t}-{}", rng.random_range(0..=n)));
                        }
                    }
                })
            })
            .collect();

        handles.push({
            let cache = cache.clone();
            let done = done.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let limits = [32, 256, 8, 128];
                let mut i = 0;
                while !done.load(Ordering::Relaxed) && i < 10_000 {
                    cache.set_limit(limits[i % limits.len()]);
                    i += 1;
                    thread::yield_now();
                }
            })
        });

        let scanners: Vec<_> = [false, true]
            .into_iter()
            .map(|blocking| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..50 {
                        let mut seen = HashSet::new();
                        let visit = |id: &str, _: &usize| {
                            assert!(seen.insert(id.to_string()), "{id} visited twice");
                            true
                        };
                        if blocking {
                            cache.for_each_with_blocking(visit, || true);
                        } else {
                            cache.for_each(visit);
                        }
                    }
                })
            })
            .collect();

        for scanner in scanners {
            scanner.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for handle in handles {
            handle.join().unwrap();
        }

        cache.set_limit(64);
        assert!(cache.size() <= 64, "size {} over limit", cache.size());
        assert_eq!(cache.size(), cache.names().len());
        cache.check_invariants().unwrap();
    }
}

// ==============================================
// Soft capacity bound
// ==============================================

mod capacity_bound {
    use super::*;

    #[test]
    fn concurrent_adds_overshoot_by_at_most_one_per_thread() {
        let threads = 8;
        let limit = 256;
        let cache: Arc<GenCache<u64>> = Arc::new(GenCache::with_shards(limit, 8));
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..5_000u64 {
                        cache.add(&format!("t{t}-{i}"), i);
                        if i % 7 == 0 {
                            cache.use_entry(&format!("t{t}-{}", i / 2));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let size = cache.size();
        assert!(size <= limit + threads, "size {size} overshot limit {limit}");
        assert_eq!(size, cache.names().len());
        cache.check_invariants().unwrap();
    }

    #[test]
    fn concurrent_mixed_ops_keep_size_exact_at_quiescence() {
        let threads = 6;
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(100, 8));
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(1000 + t as u64);
                    barrier.wait();
                    for step in 0..10_000 {
                        let id = format!("k{}", rng.random_range(0..400));
                        match rng.random_range(0..4) {
                            0 => {
                                cache.add(&id, step);
                            },
                            1 => {
                                cache.delete(&id);
                            },
                            2 => {
                                cache.use_entry(&id);
                            },
                            _ => {
                                cache.get(&id);
                            },
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), cache.names().len());
        cache.check_invariants().unwrap();
    }
}

// ==============================================
// Limit changes under load
// ==============================================

mod set_limit_under_load {
    use super::*;

    #[test]
    fn shrink_while_readers_run() {
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(0, 16));
        for i in 0..2_000 {
            cache.add(&format!("k{i}"), i);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut i = t;
                    while !stop.load(Ordering::Relaxed) {
                        cache.use_entry(&format!("k{}", i % 2_000));
                        i += 4;
                    }
                })
            })
            .collect();

        cache.set_limit(100);
        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(cache.limit(), 100);
        assert_eq!(cache.size(), 100);
        assert_eq!(cache.names().len(), 100);
        cache.check_invariants().unwrap();
    }
}

// ==============================================
// Re-entrant blocking callbacks
// ==============================================

mod reentrant_blocking {
    use super::*;

    #[test]
    fn blocking_callback_mutates_cache_while_others_iterate() {
        let cache: Arc<GenCache<usize>> = Arc::new(GenCache::with_shards(0, 4));
        for i in 0..400 {
            cache.add(&format!("k{i}"), i);
        }
        let barrier = Arc::new(Barrier::new(3));

        let mutator = {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let current = std::cell::RefCell::new(String::new());
                cache.for_each_with_blocking(
                    |id, _| {
                        *current.borrow_mut() = id.to_string();
                        true
                    },
                    || {
                        let id = current.borrow().clone();
                        // swap some original entries for a fresh id in another shard
                        if !id.ends_with("-b") && id.len() % 2 == 0 {
                            cache.delete(&id);
                            cache.add(&format!("{id}-b"), 0);
                        }
                        true
                    },
                );
            })
        };

        let scanners: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..20 {
                        let mut seen = HashSet::new();
                        cache.for_each(|id, _| {
                            assert!(seen.insert(id.to_string()), "{id} visited twice");
                            true
                        });
                    }
                })
            })
            .collect();

        mutator.join().unwrap();
        for scanner in scanners {
            scanner.join().unwrap();
        }

        cache.check_invariants().unwrap();
        assert_eq!(cache.size(), cache.names().len());
    }
}
