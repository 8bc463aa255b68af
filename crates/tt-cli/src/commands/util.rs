//! Shared utilities for CLI commands.

use std::fmt::Write as _;
use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use tt_core::TimeEntry;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time, resolving
/// relative times against `now`.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Formats billed minutes as `45m` or `1h 15m`.
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let minutes = minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats a UTC instant for display.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// One-line summary of an entry.
pub fn format_entry(entry: &TimeEntry) -> String {
    let end = match entry.end_time {
        None => "running".to_string(),
        Some(end) if end.date_naive() == entry.start_time.date_naive() => {
            end.format("%H:%M").to_string()
        }
        Some(end) => format_time(end),
    };
    format!(
        "#{} {} {} -> {} ({})",
        entry.id,
        entry.project,
        format_time(entry.start_time),
        end,
        format_minutes(u64::from(entry.duration))
    )
}

/// Renders entries one per line, in the order given.
pub fn format_entries(entries: &[TimeEntry]) -> String {
    let mut output = String::new();
    if entries.is_empty() {
        writeln!(output, "No time entries recorded.").unwrap();
        return output;
    }
    for entry in entries {
        writeln!(output, "{}", format_entry(entry)).unwrap();
    }
    output
}
