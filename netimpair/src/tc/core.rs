//! Unit formatting shared by the qdisc builders.
//!
//! `tc` parses times, rates and percentages from strings with unit suffixes. Every value we
//! emit uses the exact unit it was configured in so the conversion is lossless: whole
//! milliseconds render as `ms`, anything finer as `us`.

use std::time::Duration;

/// A rate high enough that shaping never kicks in. Used for the HTB classes and for the
/// passthrough form of a TBF leaf.
pub const UNLIMITED_RATE_KBIT: u64 = 10_000_000;

/// Render a duration with the coarsest unit that represents it exactly.
///
/// ```
/// use std::time::Duration;
/// use netimpair::tc::core::format_time;
///
/// assert_eq!(format_time(Duration::from_millis(100)), "100ms");
/// assert_eq!(format_time(Duration::from_micros(1500)), "1500us");
/// ```
pub fn format_time(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros % 1_000 == 0 {
        format!("{}ms", micros / 1_000)
    } else {
        format!("{micros}us")
    }
}

/// Render a percentage, e.g. `5%` or `0.25%`.
pub fn format_percent(percent: f64) -> String {
    format!("{percent}%")
}

/// Render a rate in kilobits per second.
pub fn format_rate(kbit: u64) -> String {
    format!("{kbit}kbit")
}
