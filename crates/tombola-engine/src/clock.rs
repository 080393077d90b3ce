//! Wall-clock parsing and duration formatting.
//!
//! Stored instants are always UTC; the display offset only affects how
//! operator-facing times are parsed and rendered.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Wall-clock format accepted from operators, e.g. `2026-03-01 07:30 PM`.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Default display offset, UTC+05:30.
pub fn default_display_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("offset is in range")
}

/// Parse a wall-clock string in the given offset into a UTC instant.
/// Returns `None` for anything that does not match [`WALL_CLOCK_FORMAT`].
pub fn parse_wall_clock(input: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let normalized = input.trim().to_uppercase();
    let naive = NaiveDateTime::parse_from_str(&normalized, WALL_CLOCK_FORMAT).ok()?;
    let local = naive.and_local_timezone(offset).single()?;
    Some(local.with_timezone(&Utc))
}

/// Render a UTC instant as a wall-clock string in the given offset.
pub fn format_wall_clock(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format(WALL_CLOCK_FORMAT)
        .to_string()
}

/// Spelled-out span between two instants: `"2 days, 3 hours, 5 minutes"`.
pub fn humanize_between(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total_minutes = (end - start).num_minutes();
    if total_minutes < 1 {
        return "less than a minute".to_string();
    }

    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} day{}", plural(days)));
    }
    if hours > 0 {
        parts.push(format!("{hours} hour{}", plural(hours)));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minute{}", plural(minutes)));
    }
    parts.join(", ")
}

/// Compact time left until `end`: `"1d 2h 3m"`, `"45s"`, or `"Ended"`.
pub fn time_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now >= end {
        return "Ended".to_string();
    }

    let total_seconds = (end - now).num_seconds();
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
