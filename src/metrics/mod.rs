//! Optional operation counters for [`GenCache`](crate::GenCache).
//!
//! Compiled only with the `metrics` feature. Recording is split from
//! snapshotting and exporting the same way across the three submodules:
//! [`metrics_impl`] writes counters, [`snapshot`] is the read-side value type,
//! and [`exporter`] publishes snapshots.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;
