#![no_main]

use std::collections::HashMap;

use gencache::{AddAction, AddOutcome, GenCache, GenCacheBuilder};
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on GenCache
//
// Byte 0 picks the limit (0 = unbounded) and byte 1 the shard count. The rest
// is read as (op, id, value) triples. Without a limit the cache is checked
// against a HashMap model; with one, every cached value must match the model
// and the size must stay within the limit.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let limit = (data[0] % 17) as usize;
    let shards = (data[1] % 8) as usize + 1;
    let cache: GenCache<u8> = GenCacheBuilder::new(limit).shards(shards).build();
    let mut model: HashMap<String, u8> = HashMap::new();

    for op in data[2..].chunks_exact(3) {
        let id = format!("id{}", op[1] % 32);
        let value = op[2];

        match op[0] % 8 {
            0 => {
                let outcome = cache.add(&id, value);
                if limit == 0 {
                    let expected = if model.contains_key(&id) {
                        AddOutcome::Replaced
                    } else {
                        AddOutcome::Inserted
                    };
                    assert_eq!(outcome, expected);
                }
                model.insert(id, value);
            },
            1 => {
                let action = match value % 3 {
                    0 => AddAction::Ignore,
                    1 => AddAction::Amend,
                    _ => AddAction::Replace,
                };
                let outcome = cache.add_with(&id, value, |_| action);
                match outcome {
                    AddOutcome::Inserted | AddOutcome::Replaced => {
                        model.insert(id, value);
                    },
                    AddOutcome::Amended | AddOutcome::Ignored => {
                        assert!(cache.contains(&id));
                    },
                }
            },
            2 => {
                // fast_add skips the capacity check, so only use it with room left
                if !cache.contains(&id) && (limit == 0 || cache.size() < limit) {
                    cache.fast_add(&id, value);
                    model.insert(id, value);
                }
            },
            3 => {
                let got = cache.get(&id).map(|v| *v);
                if let Some(v) = got {
                    assert_eq!(model.get(&id), Some(&v));
                } else if limit == 0 {
                    assert!(!model.contains_key(&id));
                }
            },
            4 => {
                let got = cache.use_entry(&id).map(|v| *v);
                if let Some(v) = got {
                    assert_eq!(model.get(&id), Some(&v));
                }
            },
            5 => {
                let deleted = cache.delete(&id);
                let known = model.remove(&id).is_some();
                if limit == 0 {
                    assert_eq!(deleted, known);
                }
                assert!(!cache.contains(&id));
            },
            6 => {
                let deleted = cache.delete_with_check(&id, |v| *v % 2 == 0);
                if deleted {
                    model.remove(&id);
                }
            },
            _ => {
                let mut seen = 0;
                cache.for_each(|id, v| {
                    assert_eq!(model.get(id), Some(v));
                    seen += 1;
                    true
                });
                assert_eq!(seen, cache.size());
            },
        }

        if limit > 0 {
            assert!(cache.size() <= limit);
        } else {
            assert_eq!(cache.size(), model.len());
        }
        assert!(cache.check_invariants().is_ok());
    }
});
