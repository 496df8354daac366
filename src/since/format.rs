//! Human-readable elapsed time.

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Format whole seconds as `D HH:MM:SS`, or `NA` when unknown.
///
/// ```
/// use reachability_rs_esp32::since::format_duration;
///
/// assert_eq!(format_duration(Some(93_784)), "1 02:03:04");
/// assert_eq!(format_duration(None), "NA");
/// ```
pub fn format_duration(seconds: Option<u64>) -> String {
    let Some(mut remainder) = seconds else {
        return "NA".to_string();
    };

    let days = remainder / SECONDS_PER_DAY;
    remainder %= SECONDS_PER_DAY;
    let hours = remainder / SECONDS_PER_HOUR;
    remainder %= SECONDS_PER_HOUR;
    let minutes = remainder / SECONDS_PER_MINUTE;
    let seconds = remainder % SECONDS_PER_MINUTE;

    format!("{} {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}


#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use reachability_rs_esp32_macros::tap_test;

    #[tap_test]
    fn duration_formats_days_hours_minutes_seconds() {
        assert_eq!(format_duration(Some(93_784)), "1 02:03:04");
    }

    #[tap_test]
    fn duration_unknown_is_na() {
        assert_eq!(format_duration(None), "NA");
    }
}
