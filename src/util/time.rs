//! Timestamp helpers for siemview.
//!
//! Event timestamps arrive as loosely formatted strings. These helpers parse
//! them for date-range filtering and pull the hour out for the dashboard
//! timeline, without ever rejecting a record for a bad timestamp.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Formats tried in order after the fractional-seconds suffix and the `Z`
/// marker have been stripped.
const EVENT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Calendar-date form used by filter bounds and date-only timestamps.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an event timestamp for range comparison.
///
/// Accepts `YYYY-MM-DDTHH:MM:SSZ`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`, with any `.fff` suffix dropped.
/// Empty or unrecognised input yields [`NaiveDateTime::MIN`], so such events
/// behave as arbitrarily old.
pub fn parse_event_timestamp(timestamp: &str) -> NaiveDateTime {
    if timestamp.is_empty() {
        return NaiveDateTime::MIN;
    }

    let head = timestamp.split('.').next().unwrap_or_default();
    let cleaned = head.replace('Z', "");

    for format in EVENT_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return parsed;
        }
    }

    NaiveDate::parse_from_str(&cleaned, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Strict `YYYY-MM-DD`. Surrounding whitespace makes the date malformed.
fn parse_bound_date(input: &str) -> Option<NaiveDate> {
    if input.trim() != input {
        return None;
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).ok()
}

/// Parse a `YYYY-MM-DD` start bound (midnight). `None` if unparsable.
pub fn parse_start_bound(input: &str) -> Option<NaiveDateTime> {
    parse_bound_date(input)?.and_hms_opt(0, 0, 0)
}

/// Parse a `YYYY-MM-DD` end bound, inclusive through 23:59:59.
/// `None` if unparsable.
pub fn parse_end_bound(input: &str) -> Option<NaiveDateTime> {
    parse_bound_date(input)?.and_hms_opt(23, 59, 59)
}

fn hour_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[T ](\d{2}):(\d{2})").expect("static hour pattern"))
}

/// Timeline bucket for a raw timestamp string.
///
/// Finds the first `[T ]HH:MM` in the string; minutes >= 30 round up to the
/// next hour, wrapping 23:30 into bucket 0. Returns `None` when the pattern
/// is absent or out of range.
pub fn timeline_hour(timestamp: &str) -> Option<usize> {
    let caps = hour_pattern().captures(timestamp)?;
    let hour: usize = caps.get(1)?.as_str().parse().ok()?;
    let minute: usize = caps.get(2)?.as_str().parse().ok()?;

    if hour > 23 || minute > 59 {
        return None;
    }

    Some(if minute >= 30 { (hour + 1) % 24 } else { hour })
}

/// Format a `std::time::Duration` into a human-readable string.
///
/// Used in store-client log lines to show how long an exchange took.
/// Examples: `0.3s`, `1.2s`, `45.6s`.
pub fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.01 {
        format!("{:.1}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let mins = secs / 60.0;
        format!("{mins:.1}m")
    }
}
