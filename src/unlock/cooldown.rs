//! Cooldown arithmetic and the persisted timestamp format.
//!
//! The last unlock is stored as Unix epoch milliseconds in decimal text.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// `max(0, cooldown - (now - last))`, zero when never unlocked.
///
/// A timestamp in the future (wall clock moved backwards) is clamped so the
/// result never exceeds `cooldown`.
pub fn remaining_cooldown(
    last_unlock_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Duration {
    let Some(last) = last_unlock_at else {
        return Duration::ZERO;
    };
    let elapsed = now
        .signed_duration_since(last)
        .to_std()
        .unwrap_or(Duration::ZERO);
    cooldown.saturating_sub(elapsed)
}

pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

/// Parse a stored timestamp; unreadable values count as "never unlocked".
pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ms: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Countdown display, `HH:MM:SS`. Sub-second remainders are truncated.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
