pub use crate::builder::{GenCacheBuilder, MAX_SHARDS};
pub use crate::ds::{IntrusiveList, ShardSelector, SlotArena, SlotId};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::gen_cache::{AddAction, AddOutcome, GenCache};
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::GenCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
pub use crate::metrics::traits::{MetricsExporter, MetricsReset, MetricsSnapshotProvider};
