//! Native PDH status codes and the operations that produce them.

use std::fmt;

use serde::Serialize;

/// Raw status code returned by a PDH call.
///
/// `0` means success; every other value is a failure that must be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PdhStatus(pub u32);

impl PdhStatus {
    /// `ERROR_SUCCESS` / `PDH_CSTATUS_VALID_DATA`.
    pub const SUCCESS: PdhStatus = PdhStatus(0x0000_0000);
    pub const NO_DATA: PdhStatus = PdhStatus(0x8000_07D5);
    pub const CALC_NEGATIVE_DENOMINATOR: PdhStatus = PdhStatus(0x8000_07D6);
    pub const CSTATUS_NO_OBJECT: PdhStatus = PdhStatus(0xC000_0BB8);
    pub const CSTATUS_NO_COUNTER: PdhStatus = PdhStatus(0xC000_0BB9);
    pub const CSTATUS_INVALID_DATA: PdhStatus = PdhStatus(0xC000_0BBA);
    pub const MEMORY_ALLOCATION_FAILURE: PdhStatus = PdhStatus(0xC000_0BBB);
    pub const INVALID_HANDLE: PdhStatus = PdhStatus(0xC000_0BBC);
    pub const INVALID_ARGUMENT: PdhStatus = PdhStatus(0xC000_0BBD);
    pub const CSTATUS_BAD_COUNTERNAME: PdhStatus = PdhStatus(0xC000_0BC0);
    pub const INVALID_PATH: PdhStatus = PdhStatus(0xC000_0BC4);
    pub const INVALID_DATA: PdhStatus = PdhStatus(0xC000_0BC6);

    /// Returns `true` for the success sentinel.
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Converts a raw return value into `Ok(())` or the failing status.
    pub fn check(raw: u32) -> Result<(), PdhStatus> {
        let status = PdhStatus(raw);
        if status.is_success() {
            Ok(())
        } else {
            Err(status)
        }
    }

    /// Symbolic name for well-known PDH codes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "ERROR_SUCCESS",
            Self::NO_DATA => "PDH_NO_DATA",
            Self::CALC_NEGATIVE_DENOMINATOR => "PDH_CALC_NEGATIVE_DENOMINATOR",
            Self::CSTATUS_NO_OBJECT => "PDH_CSTATUS_NO_OBJECT",
            Self::CSTATUS_NO_COUNTER => "PDH_CSTATUS_NO_COUNTER",
            Self::CSTATUS_INVALID_DATA => "PDH_CSTATUS_INVALID_DATA",
            Self::MEMORY_ALLOCATION_FAILURE => "PDH_MEMORY_ALLOCATION_FAILURE",
            Self::INVALID_HANDLE => "PDH_INVALID_HANDLE",
            Self::INVALID_ARGUMENT => "PDH_INVALID_ARGUMENT",
            Self::CSTATUS_BAD_COUNTERNAME => "PDH_CSTATUS_BAD_COUNTERNAME",
            Self::INVALID_PATH => "PDH_INVALID_PATH",
            Self::INVALID_DATA => "PDH_INVALID_DATA",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for PdhStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{:#010X} ({})", self.0, name),
            None => write!(f, "{:#010X}", self.0),
        }
    }
}

/// Native PDH operation that reported a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    OpenQuery,
    AddCounter,
    CollectQueryData,
    GetFormattedCounterValue,
    CloseQuery,
}

impl Operation {
    /// Name of the underlying PDH entry point.
    pub fn native_name(self) -> &'static str {
        match self {
            Operation::OpenQuery => "PdhOpenQuery",
            Operation::AddCounter => "PdhAddCounter",
            Operation::CollectQueryData => "PdhCollectQueryData",
            Operation::GetFormattedCounterValue => "PdhGetFormattedCounterValue",
            Operation::CloseQuery => "PdhCloseQuery",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.native_name())
    }
}
