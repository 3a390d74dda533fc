//! Simulated PDH subsystem for testing.
//!
//! This module provides `MockPdh` and pre-built scenarios for testing
//! collectors without requiring Windows.

pub mod scenarios;
mod subsystem;

pub use subsystem::{MockCall, MockPdh};
