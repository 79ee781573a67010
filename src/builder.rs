//! Builder for [`GenCache`].
//!
//! The limit stays adjustable after construction through
//! [`GenCache::set_limit`]; the shard count is fixed for the cache's
//! lifetime.
//!
//! ## Example
//!
//! ```rust
//! use gencache::GenCacheBuilder;
//!
//! let cache = GenCacheBuilder::new(1_000).shards(16).build::<String>();
//! cache.add("plan:1", "select 1".to_string());
//! assert_eq!(cache.shard_count(), 16);
//! assert_eq!(cache.limit(), 1_000);
//! ```

use crate::ds::shard::default_shard_count;
use crate::error::ConfigError;
use crate::gen_cache::GenCache;

/// Largest shard count a cache may be built with.
pub const MAX_SHARDS: usize = 1024;

/// Builder for creating cache instances.
#[derive(Debug, Clone)]
pub struct GenCacheBuilder {
    limit: usize,
    shards: Option<usize>,
}

impl GenCacheBuilder {
    /// Create a new builder. A `limit` of zero means unbounded.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            shards: None,
        }
    }

    /// Overrides the shard count, which otherwise follows
    /// [`default_shard_count`].
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Builds the cache, clamping the shard count to `1..=MAX_SHARDS`.
    pub fn build<T>(self) -> GenCache<T> {
        let shards = self
            .shards
            .unwrap_or_else(default_shard_count)
            .clamp(1, MAX_SHARDS);
        GenCache::from_parts(self.limit, shards)
    }

    /// Builds the cache, rejecting an out-of-range shard count.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gencache::GenCacheBuilder;
    ///
    /// assert!(GenCacheBuilder::new(10).shards(4).try_build::<u8>().is_ok());
    /// assert!(GenCacheBuilder::new(10).shards(4096).try_build::<u8>().is_err());
    /// ```
    pub fn try_build<T>(self) -> Result<GenCache<T>, ConfigError> {
        match self.shards {
            Some(0) => Err(ConfigError::new("shards must be > 0")),
            Some(n) if n > MAX_SHARDS => Err(ConfigError::new(format!(
                "shards must be <= {MAX_SHARDS}, got {n}"
            ))),
            _ => Ok(self.build()),
        }
    }
}
