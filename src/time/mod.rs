//! Timestamp extraction from free-form log text.

pub mod timezone;

use chrono::{Datelike, Local, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

pub use timezone::TimezoneCorrector;

static ISO_TZ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2}))").unwrap()
});
static ISO_NO_TZ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?)").unwrap()
});
static SYSLOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}(?:\.\d+)?)").unwrap()
});

/// Parse a timestamp out of a raw log line, falling back to "now" when no
/// recognizable pattern is present. `file_mtime_ms` anchors year inference
/// for year-less syslog timestamps.
pub fn parse_ts(line: &str, file_mtime_ms: Option<i64>) -> i64 {
    if let Some(caps) = ISO_TZ.captures(line) {
        if let Some(ts) = parse_iso_with_tz(&caps[1]) {
            return ts;
        }
    }
    if let Some(caps) = ISO_NO_TZ.captures(line) {
        if let Some(ts) = parse_iso_local(&caps[1]) {
            return ts;
        }
    }
    if let Some(caps) = SYSLOG.captures(line) {
        if let Some(ts) = parse_syslog(&caps[1], file_mtime_ms) {
            return ts;
        }
    }
    Local::now().timestamp_millis()
}

fn parse_iso_with_tz(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn parse_iso_local(s: &str) -> Option<i64> {
    let normalized = s.replacen('T', " ", 1);
    let fmts = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for fmt in fmts {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            if let Some(local) = Local.from_local_datetime(&naive).single() {
                return Some(local.timestamp_millis());
            }
        }
    }
    None
}

fn parse_syslog(s: &str, file_mtime_ms: Option<i64>) -> Option<i64> {
    let anchor = file_mtime_ms
        .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    let mut year = anchor.year();
    for _ in 0..2 {
        let with_year = format!("{year} {s}");
        for fmt in ["%Y %b %e %H:%M:%S%.f", "%Y %b %e %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, fmt) {
                if let Some(local) = Local.from_local_datetime(&naive).single() {
                    let ts_ms = local.timestamp_millis();
                    // If this reading is more than 30 days in the future
                    // relative to the anchor, the line is probably from
                    // last December; step the year back and retry once.
                    if ts_ms > anchor.timestamp_millis() + 30 * 24 * 3_600_000 {
                        year -= 1;
                        continue;
                    }
                    return Some(ts_ms);
                }
            }
        }
    }
    None
}

/// Guess a level from free-form log text; delegates to [`crate::model::LogLevel::guess`].
pub fn guess_level(line: &str) -> crate::model::LogLevel {
    crate::model::LogLevel::guess(line)
}

/// Ensures intra-file monotonic order: bumps `ts` by 1ms if it collides with
/// the previous entry's timestamp from the same file.
pub fn dedupe_tie(ts: i64, prev_ts: Option<i64>) -> i64 {
    match prev_ts {
        Some(prev) if prev == ts => ts + 1,
        _ => ts,
    }
}
