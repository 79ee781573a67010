//! Error types for the gencache library.
//!
//! Cache operations themselves are total: misses come back as `None`,
//! a callback returning [`AddAction::Ignore`](crate::AddAction::Ignore) is a
//! no-op, and capacity is enforced on a best-effort basis. The types here
//! only cover construction and diagnostics.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned by
//!   [`GenCache::check_invariants`](crate::GenCache::check_invariants) when a
//!   shard's map and lists disagree.
//! - [`ConfigError`]: Returned when builder parameters are invalid
//!   (e.g. zero shards).
//!
//! ## Example Usage
//!
//! ```
//! use gencache::GenCacheBuilder;
//! use gencache::error::ConfigError;
//!
//! let cache: Result<_, ConfigError> = GenCacheBuilder::new(100).shards(8).try_build::<u32>();
//! assert!(cache.is_ok());
//!
//! // Invalid shard count is caught without panicking
//! let bad = GenCacheBuilder::new(100).shards(0).try_build::<u32>();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`GenCache::check_invariants`](crate::GenCache::check_invariants).
/// Carries a human-readable description of which invariant failed, prefixed
/// with the offending shard index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`GenCacheBuilder::try_build`](crate::GenCacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use gencache::GenCacheBuilder;
///
/// let err = GenCacheBuilder::new(10).shards(0).try_build::<u64>().unwrap_err();
/// assert!(err.to_string().contains("shards"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
