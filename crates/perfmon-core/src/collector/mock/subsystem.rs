//! In-memory PDH simulation for testing collectors without Windows.
//!
//! `MockPdh` keeps its state behind an `Arc<Mutex<_>>`, so a test can hand one
//! clone to a collector and keep another to inspect calls or inject failures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::collector::decoder::{CounterFormat, FormattedValue};
use crate::collector::status::PdhStatus;
use crate::collector::traits::PdhSubsystem;

/// A call received by the mock, with the counter path where applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    OpenQuery,
    AddCounter(String),
    CollectQueryData,
    GetFormattedCounterValue(String),
    CloseQuery,
}

#[derive(Debug, Default)]
struct MockState {
    /// Counter path to the value it reports.
    values: HashMap<String, f64>,
    open_failure: Option<PdhStatus>,
    add_failures: HashMap<String, PdhStatus>,
    collect_failure: Option<PdhStatus>,
    read_failures: HashMap<String, PdhStatus>,
    close_failure: Option<PdhStatus>,
    /// Paths that need two samples before they can be formatted.
    rate_paths: HashSet<String>,

    next_query: usize,
    open_queries: HashSet<usize>,
    /// Query to number of successful `collect_query_data` calls.
    samples: HashMap<usize, usize>,
    /// Counter handle (index) to `(query, path)`.
    counters: Vec<(usize, String)>,
    calls: Vec<MockCall>,
    call_delay: Duration,

    cycle_owner: Option<ThreadId>,
    pending_reads: usize,
    interleaved: bool,
}

/// Simulated PDH subsystem.
///
/// Only paths with a configured value can be added; any other path is
/// rejected with `PDH_CSTATUS_NO_COUNTER`, like an unknown counter on a real
/// machine.
#[derive(Debug, Clone, Default)]
pub struct MockPdh {
    state: Arc<Mutex<MockState>>,
}

impl MockPdh {
    /// Creates a new mock with no known counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for the configured delay, then records `call`.
    fn enter(&self, call: MockCall) -> MutexGuard<'_, MockState> {
        let delay = self.state().call_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    /// Sets the value a counter path reports, making the path known.
    pub fn set_value(&mut self, path: impl Into<String>, value: f64) {
        self.state().values.insert(path.into(), value);
    }

    /// Makes `open_query` fail.
    pub fn fail_open(&mut self, status: PdhStatus) {
        self.state().open_failure = Some(status);
    }

    /// Makes `add_counter` fail for one path.
    pub fn fail_add(&mut self, path: impl Into<String>, status: PdhStatus) {
        self.state().add_failures.insert(path.into(), status);
    }

    /// Makes every `collect_query_data` fail until failures are cleared.
    pub fn fail_collect(&mut self, status: PdhStatus) {
        self.state().collect_failure = Some(status);
    }

    /// Makes reads of one path fail until failures are cleared.
    pub fn fail_read(&mut self, path: impl Into<String>, status: PdhStatus) {
        self.state().read_failures.insert(path.into(), status);
    }

    /// Makes `close_query` report a failure (the query is released anyway).
    pub fn fail_close(&mut self, status: PdhStatus) {
        self.state().close_failure = Some(status);
    }

    /// Treats a path as a rate counter: reads fail with
    /// `PDH_CSTATUS_INVALID_DATA` until its query has been sampled twice.
    pub fn mark_rate(&mut self, path: impl Into<String>) {
        self.state().rate_paths.insert(path.into());
    }

    /// Removes every injected failure.
    pub fn clear_failures(&mut self) {
        let mut state = self.state();
        state.open_failure = None;
        state.add_failures.clear();
        state.collect_failure = None;
        state.read_failures.clear();
        state.close_failure = None;
    }

    /// Delays every call, widening the window for overlapping cycles.
    pub fn set_call_delay(&mut self, delay: Duration) {
        self.state().call_delay = delay;
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Paths passed to `add_counter` that were accepted, in order.
    pub fn added_paths(&self) -> Vec<String> {
        self.state()
            .counters
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Whether a query was opened and every opened query has been closed.
    pub fn is_closed(&self) -> bool {
        let state = self.state();
        state.next_query > 0 && state.open_queries.is_empty()
    }

    /// Whether a refresh or read ran while another thread's cycle was unfinished.
    pub fn interleaving_detected(&self) -> bool {
        self.state().interleaved
    }
}

impl PdhSubsystem for MockPdh {
    type QueryHandle = usize;
    type CounterHandle = usize;

    fn open_query(&mut self) -> Result<usize, PdhStatus> {
        let mut state = self.enter(MockCall::OpenQuery);
        if let Some(status) = state.open_failure {
            return Err(status);
        }
        let query = state.next_query;
        state.next_query += 1;
        state.open_queries.insert(query);
        Ok(query)
    }

    fn add_counter(&mut self, query: usize, path: &str) -> Result<usize, PdhStatus> {
        let mut state = self.enter(MockCall::AddCounter(path.to_string()));
        if !state.open_queries.contains(&query) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        if let Some(status) = state.add_failures.get(path) {
            return Err(*status);
        }
        if !state.values.contains_key(path) {
            return Err(PdhStatus::CSTATUS_NO_COUNTER);
        }
        state.counters.push((query, path.to_string()));
        Ok(state.counters.len() - 1)
    }

    fn collect_query_data(&mut self, query: usize) -> Result<(), PdhStatus> {
        let mut state = self.enter(MockCall::CollectQueryData);
        if !state.open_queries.contains(&query) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        if let Some(status) = state.collect_failure {
            return Err(status);
        }

        let me = thread::current().id();
        if state.pending_reads > 0 && state.cycle_owner != Some(me) {
            state.interleaved = true;
        }
        state.cycle_owner = Some(me);
        state.pending_reads = state.counters.iter().filter(|(q, _)| *q == query).count();
        *state.samples.entry(query).or_default() += 1;
        Ok(())
    }

    fn get_formatted_counter_value(
        &mut self,
        counter: usize,
        format: CounterFormat,
    ) -> Result<FormattedValue, PdhStatus> {
        let path = self
            .state()
            .counters
            .get(counter)
            .map(|(_, path)| path.clone())
            .ok_or(PdhStatus::INVALID_HANDLE)?;
        let mut state = self.enter(MockCall::GetFormattedCounterValue(path.clone()));

        let query = state.counters[counter].0;
        if !state.open_queries.contains(&query) {
            return Err(PdhStatus::INVALID_HANDLE);
        }

        if state.cycle_owner != Some(thread::current().id()) {
            state.interleaved = true;
        }
        state.pending_reads = state.pending_reads.saturating_sub(1);

        let sampled = state.samples.get(&query).copied().unwrap_or(0);
        let value = match state.read_failures.get(&path) {
            Some(status) => Err(*status),
            None if state.rate_paths.contains(&path) && sampled < 2 => {
                Err(PdhStatus::CSTATUS_INVALID_DATA)
            }
            None => state
                .values
                .get(&path)
                .copied()
                .ok_or(PdhStatus::CSTATUS_INVALID_DATA),
        };
        let value = match value {
            Ok(value) => value,
            Err(status) => {
                // A failed read ends the cycle.
                state.pending_reads = 0;
                state.cycle_owner = None;
                return Err(status);
            }
        };

        Ok(match format {
            CounterFormat::Double => FormattedValue::Double(value),
            CounterFormat::Long => FormattedValue::Long(value as i32),
            CounterFormat::Large => FormattedValue::Large(value as i64),
        })
    }

    fn close_query(&mut self, query: usize) -> Result<(), PdhStatus> {
        let mut state = self.enter(MockCall::CloseQuery);
        if !state.open_queries.remove(&query) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        match state.close_failure {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_path_is_rejected() {
        let mut pdh = MockPdh::new();
        let query = pdh.open_query().unwrap();
        assert_eq!(
            pdh.add_counter(query, r"\Nope\Nothing"),
            Err(PdhStatus::CSTATUS_NO_COUNTER)
        );
        assert!(pdh.added_paths().is_empty());
    }

    #[test]
    fn test_read_returns_requested_format() {
        let mut pdh = MockPdh::new();
        pdh.set_value("p", 7.9);
        let query = pdh.open_query().unwrap();
        let counter = pdh.add_counter(query, "p").unwrap();
        pdh.collect_query_data(query).unwrap();

        assert_eq!(
            pdh.get_formatted_counter_value(counter, CounterFormat::Double),
            Ok(FormattedValue::Double(7.9))
        );
        assert_eq!(
            pdh.get_formatted_counter_value(counter, CounterFormat::Long),
            Ok(FormattedValue::Long(7))
        );
    }

    #[test]
    fn test_closed_query_rejects_calls() {
        let mut pdh = MockPdh::new();
        pdh.set_value("p", 1.0);
        let query = pdh.open_query().unwrap();
        let counter = pdh.add_counter(query, "p").unwrap();
        pdh.close_query(query).unwrap();

        assert!(pdh.is_closed());
        assert_eq!(pdh.collect_query_data(query), Err(PdhStatus::INVALID_HANDLE));
        assert_eq!(
            pdh.get_formatted_counter_value(counter, CounterFormat::Double),
            Err(PdhStatus::INVALID_HANDLE)
        );
        assert_eq!(pdh.close_query(query), Err(PdhStatus::INVALID_HANDLE));
    }

    #[test]
    fn test_clones_share_state() {
        let mut pdh = MockPdh::new();
        let observer = pdh.clone();
        pdh.set_value("p", 1.0);
        let query = pdh.open_query().unwrap();
        pdh.add_counter(query, "p").unwrap();

        assert_eq!(observer.added_paths(), ["p"]);
        assert_eq!(
            observer.calls(),
            vec![MockCall::OpenQuery, MockCall::AddCounter("p".to_string())]
        );
    }

    #[test]
    fn test_interleaving_is_detected() {
        let mut pdh = MockPdh::new();
        pdh.set_value("a", 1.0);
        pdh.set_value("b", 2.0);
        let query = pdh.open_query().unwrap();
        let a = pdh.add_counter(query, "a").unwrap();
        pdh.add_counter(query, "b").unwrap();

        pdh.collect_query_data(query).unwrap();
        pdh.get_formatted_counter_value(a, CounterFormat::Double).unwrap();
        assert!(!pdh.interleaving_detected());

        let mut other = pdh.clone();
        thread::spawn(move || other.collect_query_data(query).unwrap())
            .join()
            .unwrap();
        assert!(pdh.interleaving_detected());
    }

    #[test]
    fn test_rate_counter_needs_two_samples() {
        let mut pdh = MockPdh::new();
        pdh.set_value("rate", 5.0);
        pdh.mark_rate("rate");
        let query = pdh.open_query().unwrap();
        let counter = pdh.add_counter(query, "rate").unwrap();

        pdh.collect_query_data(query).unwrap();
        assert_eq!(
            pdh.get_formatted_counter_value(counter, CounterFormat::Double),
            Err(PdhStatus::CSTATUS_INVALID_DATA)
        );

        pdh.collect_query_data(query).unwrap();
        assert_eq!(
            pdh.get_formatted_counter_value(counter, CounterFormat::Double),
            Ok(FormattedValue::Double(5.0))
        );
    }

    #[test]
    fn test_failed_read_ends_cycle() {
        let mut pdh = MockPdh::new();
        pdh.set_value("a", 1.0);
        pdh.set_value("b", 2.0);
        pdh.fail_read("a", PdhStatus::CSTATUS_INVALID_DATA);
        let query = pdh.open_query().unwrap();
        let a = pdh.add_counter(query, "a").unwrap();
        pdh.add_counter(query, "b").unwrap();

        pdh.collect_query_data(query).unwrap();
        assert!(pdh.get_formatted_counter_value(a, CounterFormat::Double).is_err());

        let mut other = pdh.clone();
        thread::spawn(move || other.collect_query_data(query).unwrap())
            .join()
            .unwrap();
        assert!(!pdh.interleaving_detected());
    }
}
