//! Duration formatting for records and the live timer.

use chrono::{DateTime, Utc};

/// Shown when either end of the interval is missing.
pub const PLACEHOLDER: &str = "-";
/// Shown when `end <= start` (clock skew or rollback).
pub const ZERO: &str = "0s";

/// Elapsed time between two timestamps as `HH:MM:SS`.
///
/// Hours are not wrapped at 24 and grow past two digits when needed.
pub fn duration(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    let (Some(start), Some(end)) = (start, end) else {
        return PLACEHOLDER.to_string();
    };

    let millis = (end - start).num_milliseconds();
    if millis <= 0 {
        return ZERO.to_string();
    }

    format_hms(millis / 1000)
}

/// Live timer value as `HH:MM:SS`.
pub fn format_elapsed(elapsed_millis: u64) -> String {
    format_hms((elapsed_millis / 1000) as i64)
}

fn format_hms(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
