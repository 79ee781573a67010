//! Deterministic key-to-shard mapping for string ids.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shard Selection Flow                            │
//! │                                                                         │
//! │   Input id ("plan:42")                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ┌───────────────────────────────────────────────────────────────┐     │
//! │   │  ShardSelector { shards: 4 }                                  │     │
//! │   │                                                               │     │
//! │   │  1. h = 0x811c9dc5                                            │     │
//! │   │  2. for each byte b:  h ^= b;  h *= 0x01000193  (wrapping)    │     │
//! │   │  3. index = h % 4                                             │     │
//! │   └───────────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ┌─────────┬─────────┬─────────┬─────────┐                             │
//! │   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │                             │
//! │   └─────────┴─────────┴─────────┴─────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The hash is 32-bit FNV-1a, computed byte by byte without allocating. It
//! does not depend on process state, so the same id lands in the same shard
//! across runs for a given shard count.
//!
//! ## Example Usage
//!
//! ```
//! use gencache::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(4);
//! let shard = selector.shard_for_key("user:123");
//! assert!(shard < 4);
//! assert_eq!(selector.shard_for_key("user:123"), shard);
//! ```

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Lower bound for the default shard count.
pub const MIN_DEFAULT_SHARDS: usize = 8;
/// Upper bound for the default shard count.
pub const MAX_DEFAULT_SHARDS: usize = 64;

/// 32-bit FNV-1a over `bytes`.
#[inline]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Shard count used when none is configured: available parallelism clamped
/// to `[MIN_DEFAULT_SHARDS, MAX_DEFAULT_SHARDS]`.
pub fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(MIN_DEFAULT_SHARDS, MAX_DEFAULT_SHARDS)
}

/// Maps string ids to a shard index in `[0, shards)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards.
    ///
    /// The shard count is clamped to at least 1.
    ///
    /// ```
    /// use gencache::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(16).shard_count(), 16);
    /// assert_eq!(ShardSelector::new(0).shard_count(), 1);
    /// ```
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps an id to its shard index.
    #[inline]
    pub fn shard_for_key(&self, id: &str) -> usize {
        fnv1a_32(id.as_bytes()) as usize % self.shards
    }
}

impl Default for ShardSelector {
    fn default() -> Self {
        Self::new(default_shard_count())
    }
}
