//! Performance counter collector for Windows PDH.
//!
//! This module provides infrastructure for registering PDH counters once and
//! sampling them on every call, with support for a simulated subsystem for
//! testing on any platform.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │   Mutex ─► QueryResource                                    │
//! │            - open / register_all / close                    │
//! │            - refresh ─► read_back ─► assemble ─► Snapshot   │
//! │                            │                                │
//! │                     ┌──────▼───────┐                        │
//! │                     │ PdhSubsystem │ (trait)                │
//! │                     └──────┬───────┘                        │
//! └────────────────────────────┼────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              │               │               │
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │ WindowsPdh  │ │   MockPdh   │ │  Scenarios  │
//!       │ (Windows)   │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Windows)
//!
//! ```ignore
//! use perfmon_core::collector::{Collector, WindowsPdh};
//! use perfmon_core::model::CounterSpec;
//!
//! let specs = [CounterSpec::flat("cpu", r"\Processor(_Total)\% Processor Time")];
//! let collector = Collector::new(WindowsPdh::new(), &specs).unwrap();
//! let snapshot = collector.collect_snapshot().unwrap();
//! ```
//!
//! ## Testing (with MockPdh)
//!
//! ```
//! use perfmon_core::collector::{Collector, MockPdh};
//! use perfmon_core::collector::mock::scenarios::CPU_TOTAL;
//! use perfmon_core::model::CounterSpec;
//!
//! let specs = [CounterSpec::flat("cpu", CPU_TOTAL)];
//! let collector = Collector::new(MockPdh::typical_system(), &specs).unwrap();
//! let snapshot = collector.collect_snapshot().unwrap();
//! assert_eq!(snapshot.get("cpu"), Some(12.5));
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod decoder;
mod error;
pub mod mock;
#[cfg(windows)]
mod native;
mod query;
pub mod status;
pub mod traits;

pub use collector::{Collector, CounterLayout, CycleTiming, GroupLayout};
pub use decoder::{CounterFormat, FormattedValue};
pub use error::PerfmonError;
pub use mock::{MockCall, MockPdh};
#[cfg(windows)]
pub use native::WindowsPdh;
pub use status::{Operation, PdhStatus};
pub use traits::PdhSubsystem;
