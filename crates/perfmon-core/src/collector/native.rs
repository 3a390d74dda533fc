//! Windows PDH backend.

use windows::Win32::System::Performance::{
    PDH_FMT_COUNTERVALUE, PDH_FMT_DOUBLE, PDH_FMT_LARGE, PDH_FMT_LONG, PdhAddCounterW,
    PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterValue, PdhOpenQueryW,
};
use windows::core::PCWSTR;

use super::decoder::{CounterFormat, FormattedValue};
use super::status::PdhStatus;
use super::traits::PdhSubsystem;

/// Real PDH implementation backed by `pdh.dll`.
///
/// Handles are the raw `PDH_HQUERY`/`PDH_HCOUNTER` values; ownership and
/// release are tracked by the query resource that holds them.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPdh;

impl WindowsPdh {
    /// Creates a new `WindowsPdh` instance.
    pub fn new() -> Self {
        Self
    }
}

impl PdhSubsystem for WindowsPdh {
    type QueryHandle = isize;
    type CounterHandle = isize;

    fn open_query(&mut self) -> Result<isize, PdhStatus> {
        let mut query: isize = 0;
        // SAFETY: a null data source selects real-time data; `query` outlives the call.
        PdhStatus::check(unsafe { PdhOpenQueryW(PCWSTR::null(), 0, &mut query) })?;
        Ok(query)
    }

    fn add_counter(&mut self, query: isize, path: &str) -> Result<isize, PdhStatus> {
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
        let mut counter: isize = 0;
        // SAFETY: `wide` is NUL-terminated and alive for the duration of the call.
        PdhStatus::check(unsafe { PdhAddCounterW(query, PCWSTR(wide.as_ptr()), 0, &mut counter) })?;
        Ok(counter)
    }

    fn collect_query_data(&mut self, query: isize) -> Result<(), PdhStatus> {
        // SAFETY: `query` was returned by PdhOpenQueryW and not yet closed.
        PdhStatus::check(unsafe { PdhCollectQueryData(query) })
    }

    fn get_formatted_counter_value(
        &mut self,
        counter: isize,
        format: CounterFormat,
    ) -> Result<FormattedValue, PdhStatus> {
        let flag = match format {
            CounterFormat::Long => PDH_FMT_LONG,
            CounterFormat::Large => PDH_FMT_LARGE,
            CounterFormat::Double => PDH_FMT_DOUBLE,
        };

        let mut value = PDH_FMT_COUNTERVALUE::default();
        // SAFETY: `value` is a valid out-pointer; the type out-param is optional.
        PdhStatus::check(unsafe { PdhGetFormattedCounterValue(counter, flag, None, &mut value) })?;

        // SAFETY: PDH fills the union member selected by `flag`, and only that
        // member is read.
        let decoded = unsafe {
            match format {
                CounterFormat::Long => FormattedValue::Long(value.Anonymous.longValue),
                CounterFormat::Large => FormattedValue::Large(value.Anonymous.largeValue),
                CounterFormat::Double => FormattedValue::Double(value.Anonymous.doubleValue),
            }
        };
        Ok(decoded)
    }

    fn close_query(&mut self, query: isize) -> Result<(), PdhStatus> {
        // SAFETY: `query` is closed at most once by its owning resource.
        PdhStatus::check(unsafe { PdhCloseQuery(query) })
    }
}
