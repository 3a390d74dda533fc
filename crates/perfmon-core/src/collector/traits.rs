//! Abstraction over the OS performance-counter subsystem.
//!
//! The `PdhSubsystem` trait allows the collector to drive the real Windows
//! PDH library or an in-memory simulation for testing on any platform.

use std::fmt::Debug;

use super::decoder::{CounterFormat, FormattedValue};
use super::status::PdhStatus;

/// Operations the collector needs from the counter subsystem.
///
/// Every call either succeeds or returns the raw failing [`PdhStatus`];
/// mapping statuses to structured errors is the caller's job.
pub trait PdhSubsystem: Send {
    /// Opaque handle to an open query.
    type QueryHandle: Copy + Debug + Send;
    /// Opaque handle to a counter registered on a query.
    type CounterHandle: Copy + Debug + Send;

    /// Opens a new query (`PdhOpenQuery`).
    fn open_query(&mut self) -> Result<Self::QueryHandle, PdhStatus>;

    /// Adds a counter to an open query (`PdhAddCounter`).
    ///
    /// # Arguments
    /// * `query` - Handle returned by `open_query`
    /// * `path` - Full counter path, forwarded verbatim
    fn add_counter(
        &mut self,
        query: Self::QueryHandle,
        path: &str,
    ) -> Result<Self::CounterHandle, PdhStatus>;

    /// Samples every counter of the query as one batch (`PdhCollectQueryData`).
    fn collect_query_data(&mut self, query: Self::QueryHandle) -> Result<(), PdhStatus>;

    /// Reads the last sample of one counter (`PdhGetFormattedCounterValue`).
    fn get_formatted_counter_value(
        &mut self,
        counter: Self::CounterHandle,
        format: CounterFormat,
    ) -> Result<FormattedValue, PdhStatus>;

    /// Releases the query and all counters attached to it (`PdhCloseQuery`).
    fn close_query(&mut self, query: Self::QueryHandle) -> Result<(), PdhStatus>;
}
