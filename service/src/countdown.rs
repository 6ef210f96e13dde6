//! Countdown computation.
//!
//! Pure: the caller samples the clock once and passes `now` in, so every
//! field of a [`DerivedCountdown`] describes the same instant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Countdown state derived per request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedCountdown {
    /// Target as epoch milliseconds.
    pub target_timestamp: i64,
    #[serde(serialize_with = "serialize_now")]
    pub now: DateTime<Utc>,
    /// `now` as epoch milliseconds.
    pub now_timestamp: i64,
    /// `max(0, target - now)` in milliseconds.
    pub remaining_ms: u64,
    pub is_complete: bool,
    pub remaining: RemainingParts,
}

/// `remaining_ms` split into the units the display labels name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RemainingParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl RemainingParts {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            days: ms / MS_PER_DAY,
            hours: (ms % MS_PER_DAY) / MS_PER_HOUR,
            minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (ms % MS_PER_MINUTE) / MS_PER_SECOND,
        }
    }
}

/// Compute the countdown from `target` as seen at `now`.
///
/// Works at millisecond resolution: `is_complete` holds exactly when the
/// millisecond difference is zero or negative.
pub fn compute_countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> DerivedCountdown {
    let target_timestamp = target.timestamp_millis();
    let now_timestamp = now.timestamp_millis();
    let diff = target_timestamp.saturating_sub(now_timestamp);
    let remaining_ms = u64::try_from(diff).unwrap_or(0);

    DerivedCountdown {
        target_timestamp,
        now,
        now_timestamp,
        remaining_ms,
        is_complete: diff <= 0,
        remaining: RemainingParts::from_millis(remaining_ms),
    }
}

fn serialize_now<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}
