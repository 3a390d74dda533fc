//! perfmon-core — Windows performance counter collection.
//!
//! Provides:
//! - `collector` — PDH query lifecycle, collection cycles, simulated subsystem
//! - `model` — counter definitions and snapshot structures
//! - `config` — JSON settings document and validation

pub mod collector;
pub mod config;
pub mod model;
