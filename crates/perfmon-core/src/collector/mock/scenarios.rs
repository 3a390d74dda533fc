//! Pre-built PDH scenarios for testing.
//!
//! These scenarios provide realistic counter sets for exercising
//! collectors under normal and failing conditions.

use super::subsystem::MockPdh;
use crate::collector::status::PdhStatus;

pub const CPU_TOTAL: &str = r"\Processor(_Total)\% Processor Time";
pub const CPU_USER: &str = r"\Processor(_Total)\% User Time";
pub const CPU_PRIVILEGED: &str = r"\Processor(_Total)\% Privileged Time";
pub const MEM_AVAILABLE: &str = r"\Memory\Available MBytes";
pub const MEM_PAGES: &str = r"\Memory\Pages/sec";
pub const DISK_READS: &str = r"\PhysicalDisk(_Total)\Disk Reads/sec";
pub const DISK_WRITES: &str = r"\PhysicalDisk(_Total)\Disk Writes/sec";
pub const DISK_QUEUE: &str = r"\PhysicalDisk(_Total)\Current Disk Queue Length";
pub const TCP_ESTABLISHED: &str = r"\TCPv4\Connections Established";
pub const QUEUE_LENGTH: &str = r"\System\Processor Queue Length";

impl MockPdh {
    /// A lightly loaded workstation with common processor, memory, disk and
    /// network counters.
    pub fn typical_system() -> Self {
        let mut pdh = Self::new();
        pdh.set_value(CPU_TOTAL, 12.5);
        pdh.set_value(CPU_USER, 8.0);
        pdh.set_value(CPU_PRIVILEGED, 4.5);
        pdh.set_value(MEM_AVAILABLE, 8192.0);
        pdh.set_value(MEM_PAGES, 3.0);
        pdh.set_value(DISK_READS, 10.0);
        pdh.set_value(DISK_WRITES, 20.0);
        pdh.set_value(DISK_QUEUE, 0.0);
        pdh.set_value(TCP_ESTABLISHED, 42.0);
        pdh.set_value(QUEUE_LENGTH, 1.0);
        pdh
    }

    /// A typical system whose refresh reports `PDH_NO_DATA`.
    pub fn stalled_system() -> Self {
        let mut pdh = Self::typical_system();
        pdh.fail_collect(PdhStatus::NO_DATA);
        pdh
    }

    /// A typical system where the disk write counter cannot be formatted,
    /// as happens right after a rate counter is added.
    pub fn unsettled_disk() -> Self {
        let mut pdh = Self::typical_system();
        pdh.fail_read(DISK_WRITES, PdhStatus::CSTATUS_INVALID_DATA);
        pdh
    }
}
