//! Data models shared by the collector and its callers.
//!
//! - [`spec`]: counter definitions (flat or grouped) and their normalization
//! - [`snapshot`]: the structured result of one collection cycle

mod snapshot;
mod spec;

pub use snapshot::{CounterValue, Snapshot, SnapshotBuilder, SnapshotEntry};
pub use spec::{CounterConfig, CounterSpec, GroupConfig, GroupPlan, leaves, normalize};
