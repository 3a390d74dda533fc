//! Main collector that owns one PDH query and serves collection cycles.
//!
//! The `Collector` struct provides a thread-safe interface for turning a
//! counter configuration into one `Snapshot` per call.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::collector::error::PerfmonError;
use crate::collector::query::QueryResource;
use crate::collector::traits::PdhSubsystem;
use crate::model::{CounterSpec, Snapshot};

/// Timing information for the phases of a collection cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleTiming {
    /// Total cycle time.
    pub total: Duration,
    /// Time spent in `PdhCollectQueryData`.
    pub refresh: Duration,
    /// Time spent reading back formatted values.
    pub read_back: Duration,
    /// Number of counters read.
    pub counters: usize,
}

/// A registered counter as seen from outside the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterLayout {
    pub alias: String,
    pub path: String,
    /// Value from the last successful cycle.
    pub last_value: Option<f64>,
}

/// A registered group as seen from outside the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLayout {
    /// `None` for counters configured outside any group.
    pub name: Option<String>,
    pub counters: Vec<CounterLayout>,
}

struct Inner<S: PdhSubsystem> {
    resource: QueryResource<S>,
    /// Timing information from the last successful cycle.
    last_timing: Option<CycleTiming>,
}

/// Collector over a single PDH query.
///
/// Construction opens the query and registers every configured counter;
/// any failure there is fatal and the collector is never returned. Cycles
/// are serialized by an internal lock, so a `Collector` can be shared across
/// threads without two cycles interleaving their native calls.
pub struct Collector<S: PdhSubsystem> {
    inner: Mutex<Inner<S>>,
}

impl<S: PdhSubsystem> Collector<S> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `subsystem` - PDH implementation (native or mock)
    /// * `specs` - Counter definitions; aliases must already be validated
    ///
    /// On a registration failure the partially filled query is released
    /// before the error is returned.
    pub fn new(subsystem: S, specs: &[CounterSpec]) -> Result<Self, PerfmonError> {
        let mut resource = QueryResource::open(subsystem)?;
        resource.register_all(specs)?;

        info!(
            "PDH query ready: {} counters in {} groups",
            resource.counter_count(),
            resource.groups().len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                resource,
                last_timing: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one collection cycle: refresh, then read back every counter.
    ///
    /// Returns either a complete snapshot or the first error; values read
    /// before a failure are discarded. Also records timing information
    /// accessible via `last_timing()`.
    pub fn collect_snapshot(&self) -> Result<Snapshot, PerfmonError> {
        let mut inner = self.lock();
        let total_start = Instant::now();
        let mut timing = CycleTiming::default();

        let start = Instant::now();
        inner.resource.refresh()?;
        timing.refresh = start.elapsed();

        let start = Instant::now();
        let values = inner.resource.read_back()?;
        timing.read_back = start.elapsed();

        let snapshot = inner.resource.assemble(values);

        timing.counters = snapshot.counter_count();
        timing.total = total_start.elapsed();
        debug!(
            "Cycle complete: {} counters, refresh={:?}, read_back={:?}",
            timing.counters, timing.refresh, timing.read_back
        );
        inner.last_timing = Some(timing);

        Ok(snapshot)
    }

    /// Releases the native query. Later cycles fail with `ResourceClosed`.
    pub fn close(&self) -> Result<(), PerfmonError> {
        let result = self.lock().resource.close();
        if result.is_ok() {
            info!("PDH query closed");
        }
        result
    }

    pub fn is_closed(&self) -> bool {
        self.lock().resource.is_closed()
    }

    /// Returns timing information from the last successful cycle.
    pub fn last_timing(&self) -> Option<CycleTiming> {
        self.lock().last_timing.clone()
    }

    pub fn counter_count(&self) -> usize {
        self.lock().resource.counter_count()
    }

    /// Returns the registered group/counter tree in declaration order.
    pub fn layout(&self) -> Vec<GroupLayout> {
        self.lock()
            .resource
            .groups()
            .iter()
            .map(|group| GroupLayout {
                name: group.name.clone(),
                counters: group
                    .counters
                    .iter()
                    .map(|c| CounterLayout {
                        alias: c.alias.clone(),
                        path: c.path.clone(),
                        last_value: c.last_value,
                    })
                    .collect(),
            })
            .collect()
    }
}
