#![no_main]

use gencache::ds::{ShardSelector, fnv1a_32};
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary shard selection operations
//
// Tests determinism, range validity and agreement with the raw hash for
// various shard counts and string ids.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let shard_count = ((data[0] as usize) % 64) + 1; // 1 to 64 shards
    let selector = ShardSelector::new(shard_count);
    assert_eq!(selector.shard_count(), shard_count);

    // Arbitrary bytes as an id
    let id = String::from_utf8_lossy(&data[1..]);
    let shard = selector.shard_for_key(&id);
    assert!(shard < shard_count);
    assert_eq!(shard, selector.shard_for_key(&id));
    assert_eq!(shard, fnv1a_32(id.as_bytes()) as usize % shard_count);

    // Short derived ids
    for chunk in data[1..].chunks(2) {
        let id = format!("key_{}", chunk[0]);
        let shard = selector.shard_for_key(&id);
        assert!(shard < shard_count);
        assert_eq!(shard, selector.shard_for_key(&id));
    }
});
