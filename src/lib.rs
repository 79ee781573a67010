//! gencache: a lock-striped concurrent LRU cache keyed by string ids.
//!
//! [`GenCache`] spreads entries over independently locked shards, bounds the
//! total size with best-effort LRU eviction, and supports full-table
//! iteration that stays safe while other threads insert and delete.

pub mod builder;
pub mod ds;
pub mod error;
mod gen_cache;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;

pub use crate::builder::GenCacheBuilder;
pub use crate::gen_cache::{AddAction, AddOutcome, GenCache};
