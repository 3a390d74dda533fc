//! Decoding of formatted counter values.
//!
//! PDH hands back a `PDH_FMT_COUNTERVALUE` whose payload is a C union. The
//! native backend reads only the member that matches the requested format
//! and wraps it in [`FormattedValue`], so everything above the subsystem
//! works with a plain tagged enum.

/// Representation requested from `PdhGetFormattedCounterValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterFormat {
    /// `PDH_FMT_LONG`
    Long,
    /// `PDH_FMT_LARGE`
    Large,
    /// `PDH_FMT_DOUBLE`
    #[default]
    Double,
}

/// A formatted counter value, tagged by representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedValue {
    Long(i32),
    Large(i64),
    Double(f64),
    Text(String),
}

/// Extracts a double from a formatted value.
///
/// Never fails: integers are widened and text that does not parse as a
/// number decodes to NaN.
pub fn decode(value: &FormattedValue) -> f64 {
    match value {
        FormattedValue::Double(v) => *v,
        FormattedValue::Long(v) => f64::from(*v),
        FormattedValue::Large(v) => *v as f64,
        FormattedValue::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
    }
}
