//! Ownership of the native query and the counters registered on it.
//!
//! A `QueryResource` is opened once, filled with counters once, and then
//! refreshed and read back once per collection cycle. The native query is
//! released by `close()` or, failing that, when the resource is dropped, so a
//! construction that fails halfway through registration never leaks it.

use tracing::{debug, warn};

use crate::model::{CounterSpec, Snapshot, normalize};

use super::decoder::{CounterFormat, decode};
use super::error::{CounterRef, PerfmonError, map_status};
use super::status::Operation;
use super::traits::PdhSubsystem;

/// A counter registered on the query.
#[derive(Debug)]
pub(crate) struct RegisteredCounter<H> {
    pub alias: String,
    pub path: String,
    pub handle: H,
    /// Value from the last cycle that completed without error.
    pub last_value: Option<f64>,
}

impl<H> RegisteredCounter<H> {
    fn counter_ref(&self) -> CounterRef<'_> {
        CounterRef {
            alias: &self.alias,
            path: &self.path,
        }
    }
}

/// Registered counters of one configured group.
#[derive(Debug)]
pub(crate) struct CounterGroup<H> {
    /// `None` for the implicit group of top-level counters.
    pub name: Option<String>,
    pub counters: Vec<RegisteredCounter<H>>,
}

#[derive(Debug, Clone, Copy)]
enum QueryState<H> {
    Open(H),
    Closed,
}

/// The native query handle together with its counter tree.
pub(crate) struct QueryResource<S: PdhSubsystem> {
    subsystem: S,
    state: QueryState<S::QueryHandle>,
    groups: Vec<CounterGroup<S::CounterHandle>>,
}

impl<S: PdhSubsystem> QueryResource<S> {
    /// Opens a new query on the subsystem.
    pub fn open(mut subsystem: S) -> Result<Self, PerfmonError> {
        let handle = subsystem
            .open_query()
            .map_err(|status| map_status(Operation::OpenQuery, status, None))?;
        debug!("Opened PDH query {:?}", handle);

        Ok(Self {
            subsystem,
            state: QueryState::Open(handle),
            groups: Vec::new(),
        })
    }

    fn handle(&self) -> Result<S::QueryHandle, PerfmonError> {
        match self.state {
            QueryState::Open(handle) => Ok(handle),
            QueryState::Closed => Err(PerfmonError::ResourceClosed),
        }
    }

    /// Registers every counter of `specs` in declaration order.
    ///
    /// Stops at the first counter the subsystem rejects. Counters added
    /// before it stay attached to the query until it is released.
    pub fn register_all(&mut self, specs: &[CounterSpec]) -> Result<(), PerfmonError> {
        let query = self.handle()?;

        for plan in normalize(specs) {
            self.groups.push(CounterGroup {
                name: plan.name.map(str::to_string),
                counters: Vec::with_capacity(plan.members.len()),
            });

            for member in plan.members {
                let handle = self
                    .subsystem
                    .add_counter(query, &member.query)
                    .map_err(|status| {
                        map_status(
                            Operation::AddCounter,
                            status,
                            Some(CounterRef {
                                alias: &member.alias,
                                path: &member.query,
                            }),
                        )
                    })?;
                debug!("Registered counter '{}' ({})", member.alias, member.query);

                if let Some(group) = self.groups.last_mut() {
                    group.counters.push(RegisteredCounter {
                        alias: member.alias.clone(),
                        path: member.query.clone(),
                        handle,
                        last_value: None,
                    });
                }
            }
        }

        Ok(())
    }

    /// Phase one: sample all counters as one batch.
    pub fn refresh(&mut self) -> Result<(), PerfmonError> {
        let query = self.handle()?;
        self.subsystem
            .collect_query_data(query)
            .map_err(|status| map_status(Operation::CollectQueryData, status, None))
    }

    /// Phase two: read every counter in declaration order.
    ///
    /// Stops at the first counter that cannot be formatted; values read
    /// earlier in the same cycle are dropped with the error.
    pub fn read_back(&mut self) -> Result<Vec<f64>, PerfmonError> {
        self.handle()?;

        let mut values = Vec::with_capacity(self.counter_count());
        for counter in self.groups.iter().flat_map(|g| &g.counters) {
            let raw = self
                .subsystem
                .get_formatted_counter_value(counter.handle, CounterFormat::Double)
                .map_err(|status| {
                    map_status(
                        Operation::GetFormattedCounterValue,
                        status,
                        Some(counter.counter_ref()),
                    )
                })?;
            values.push(decode(&raw));
        }
        Ok(values)
    }

    /// Stores the values of a complete read-back and builds the snapshot.
    ///
    /// `values` must come from `read_back` on this resource; a failed
    /// read-back never reaches this point, so no partial cycle is stored.
    pub fn assemble(&mut self, values: Vec<f64>) -> Snapshot {
        let mut values = values.into_iter();
        let mut builder = Snapshot::builder();

        for group in &mut self.groups {
            for counter in &mut group.counters {
                counter.last_value = values.next();
            }
            builder.push_group(
                group.name.as_deref(),
                group
                    .counters
                    .iter()
                    .map(|c| (c.alias.as_str(), c.last_value.unwrap_or(f64::NAN))),
            );
        }

        builder.build()
    }

    /// Releases the native query.
    ///
    /// The handle is considered gone even when the subsystem reports a
    /// failure; later calls return [`PerfmonError::ResourceClosed`].
    pub fn close(&mut self) -> Result<(), PerfmonError> {
        let query = self.handle()?;
        self.state = QueryState::Closed;
        self.subsystem
            .close_query(query)
            .map_err(|status| map_status(Operation::CloseQuery, status, None))?;
        debug!("Closed PDH query {:?}", query);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, QueryState::Closed)
    }

    pub fn groups(&self) -> &[CounterGroup<S::CounterHandle>] {
        &self.groups
    }

    pub fn counter_count(&self) -> usize {
        self.groups.iter().map(|g| g.counters.len()).sum()
    }
}

impl<S: PdhSubsystem> Drop for QueryResource<S> {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!("Failed to release PDH query: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockCall, MockPdh};
    use crate::collector::status::PdhStatus;
    use crate::model::CounterConfig;

    fn disk_specs() -> Vec<CounterSpec> {
        vec![
            CounterSpec::flat("cpu", "cpu_path"),
            CounterSpec::group(
                "disk",
                vec![
                    CounterConfig::new("reads", "reads_path"),
                    CounterConfig::new("writes", "writes_path"),
                ],
            ),
        ]
    }

    fn cycle(resource: &mut QueryResource<MockPdh>) -> Result<Snapshot, PerfmonError> {
        resource.refresh()?;
        let values = resource.read_back()?;
        Ok(resource.assemble(values))
    }

    fn mock_with_values() -> MockPdh {
        let mut pdh = MockPdh::new();
        pdh.set_value("cpu_path", 1.0);
        pdh.set_value("reads_path", 2.0);
        pdh.set_value("writes_path", 3.0);
        pdh
    }

    #[test]
    fn test_register_all_mirrors_input_tree() {
        let pdh = mock_with_values();
        let mut resource = QueryResource::open(pdh.clone()).unwrap();
        resource.register_all(&disk_specs()).unwrap();

        let groups = resource.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, None);
        assert_eq!(groups[0].counters[0].alias, "cpu");
        assert_eq!(groups[1].name.as_deref(), Some("disk"));
        let aliases: Vec<_> = groups[1].counters.iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(aliases, ["reads", "writes"]);
        assert_eq!(pdh.added_paths(), ["cpu_path", "reads_path", "writes_path"]);
    }

    #[test]
    fn test_partial_registration_is_retained_until_drop() {
        let mut pdh = mock_with_values();
        pdh.fail_add("reads_path", PdhStatus::CSTATUS_NO_COUNTER);

        let mut resource = QueryResource::open(pdh.clone()).unwrap();
        let err = resource.register_all(&disk_specs()).unwrap_err();
        assert_eq!(err.alias(), Some("reads"));
        assert_eq!(resource.counter_count(), 1);
        assert!(!pdh.is_closed());

        drop(resource);
        assert!(pdh.is_closed());
    }

    #[test]
    fn test_read_back_order_follows_declaration() {
        let pdh = mock_with_values();
        let mut resource = QueryResource::open(pdh.clone()).unwrap();
        resource.register_all(&disk_specs()).unwrap();
        pdh.clear_calls();

        cycle(&mut resource).unwrap();
        assert_eq!(
            pdh.calls(),
            vec![
                MockCall::CollectQueryData,
                MockCall::GetFormattedCounterValue("cpu_path".to_string()),
                MockCall::GetFormattedCounterValue("reads_path".to_string()),
                MockCall::GetFormattedCounterValue("writes_path".to_string()),
            ]
        );
    }

    #[test]
    fn test_last_value_only_updated_by_complete_cycle() {
        let mut pdh = mock_with_values();
        let mut resource = QueryResource::open(pdh.clone()).unwrap();
        resource.register_all(&disk_specs()).unwrap();

        cycle(&mut resource).unwrap();
        assert_eq!(resource.groups()[1].counters[1].last_value, Some(3.0));

        pdh.set_value("cpu_path", 100.0);
        pdh.fail_read("writes_path", PdhStatus::INVALID_DATA);
        assert!(cycle(&mut resource).is_err());
        assert_eq!(resource.groups()[0].counters[0].last_value, Some(1.0));
    }

    #[test]
    fn test_close_then_use_fails() {
        let pdh = mock_with_values();
        let mut resource = QueryResource::open(pdh.clone()).unwrap();
        resource.register_all(&disk_specs()).unwrap();

        resource.close().unwrap();
        assert!(resource.is_closed());
        assert!(pdh.is_closed());
        assert_eq!(resource.refresh(), Err(PerfmonError::ResourceClosed));
        assert_eq!(resource.read_back(), Err(PerfmonError::ResourceClosed));
        assert_eq!(resource.close(), Err(PerfmonError::ResourceClosed));
        assert_eq!(
            resource.register_all(&disk_specs()),
            Err(PerfmonError::ResourceClosed)
        );
    }

    #[test]
    fn test_close_failure_still_releases_handle() {
        let mut pdh = mock_with_values();
        pdh.fail_close(PdhStatus::INVALID_HANDLE);
        let mut resource = QueryResource::open(pdh).unwrap();

        assert_eq!(
            resource.close(),
            Err(PerfmonError::QueryClose {
                status: PdhStatus::INVALID_HANDLE
            })
        );
        assert!(resource.is_closed());
    }
}
