//! Structured errors for query construction and collection cycles.

use thiserror::Error;

use super::status::{Operation, PdhStatus};

/// Error raised by the query resource or a collection cycle.
///
/// `QueryOpen` and `CounterRegistration` are fatal for the collector that
/// produced them. `Collection` and `Formatting` abort a single cycle only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PerfmonError {
    #[error("PdhOpenQuery failed with status {status}")]
    QueryOpen { status: PdhStatus },

    #[error("PdhAddCounter failed for counter '{alias}' ({path}) with status {status}")]
    CounterRegistration {
        alias: String,
        path: String,
        status: PdhStatus,
    },

    #[error("PdhCollectQueryData failed with status {status}")]
    Collection { status: PdhStatus },

    #[error("PdhGetFormattedCounterValue failed for counter '{alias}' with status {status}")]
    Formatting { alias: String, status: PdhStatus },

    #[error("PdhCloseQuery failed with status {status}")]
    QueryClose { status: PdhStatus },

    #[error("query resource is closed")]
    ResourceClosed,
}

impl PerfmonError {
    /// Native operation that failed, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            PerfmonError::QueryOpen { .. } => Some(Operation::OpenQuery),
            PerfmonError::CounterRegistration { .. } => Some(Operation::AddCounter),
            PerfmonError::Collection { .. } => Some(Operation::CollectQueryData),
            PerfmonError::Formatting { .. } => Some(Operation::GetFormattedCounterValue),
            PerfmonError::QueryClose { .. } => Some(Operation::CloseQuery),
            PerfmonError::ResourceClosed => None,
        }
    }

    /// Raw status code reported by the subsystem.
    pub fn status(&self) -> Option<PdhStatus> {
        match self {
            PerfmonError::QueryOpen { status }
            | PerfmonError::CounterRegistration { status, .. }
            | PerfmonError::Collection { status }
            | PerfmonError::Formatting { status, .. }
            | PerfmonError::QueryClose { status } => Some(*status),
            PerfmonError::ResourceClosed => None,
        }
    }

    /// Alias of the counter involved, for per-counter failures.
    pub fn alias(&self) -> Option<&str> {
        match self {
            PerfmonError::CounterRegistration { alias, .. }
            | PerfmonError::Formatting { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// Whether the collector can still serve later cycles after this error.
    pub fn is_cycle_local(&self) -> bool {
        matches!(
            self,
            PerfmonError::Collection { .. } | PerfmonError::Formatting { .. }
        )
    }
}

/// Counter identity attached to a failing status.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CounterRef<'a> {
    pub alias: &'a str,
    pub path: &'a str,
}

/// Maps a failing native status to the error kind of its operation.
pub(crate) fn map_status(
    operation: Operation,
    status: PdhStatus,
    counter: Option<CounterRef<'_>>,
) -> PerfmonError {
    let (alias, path) = counter
        .map(|c| (c.alias.to_string(), c.path.to_string()))
        .unwrap_or_default();

    match operation {
        Operation::OpenQuery => PerfmonError::QueryOpen { status },
        Operation::AddCounter => PerfmonError::CounterRegistration {
            alias,
            path,
            status,
        },
        Operation::CollectQueryData => PerfmonError::Collection { status },
        Operation::GetFormattedCounterValue => PerfmonError::Formatting { alias, status },
        Operation::CloseQuery => PerfmonError::QueryClose { status },
    }
}
