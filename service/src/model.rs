//! Typed schema for the persisted event record.
//!
//! Every load and every save goes through serde plus [`EventConfig::validate`],
//! so the rest of the crate only ever sees a fully-typed record.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Longest timezone identifier accepted from clients or on disk.
pub const MAX_TIMEZONE_LEN: usize = 64;

/// The single persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfig {
    pub event_details: EventDetails,
    pub display: DisplayConfig,
    pub settings: RecordSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(with = "instant")]
    pub target_instant: DateTime<Utc>,
    pub location: String,
    pub timezone: String,
    pub title: String,
    pub participants: Participants,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    pub completed_message: String,
    pub unit_labels: UnitLabels,
}

/// Labels for the four countdown units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLabels {
    pub days: String,
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSettings {
    /// One-way update lock. `false` rejects every update operation.
    pub updates_allowed: bool,
    /// Stamped by the service on every committed write.
    #[serde(with = "instant")]
    pub last_updated: DateTime<Utc>,
}

impl EventConfig {
    /// Checks the constraints serde cannot express.
    ///
    /// Returns a human-readable description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        validate_timezone(&self.event_details.timezone)
            .map_err(|reason| format!("eventDetails.timezone {reason}"))?;
        check_storable("eventDetails.targetInstant", &self.event_details.target_instant)?;
        check_storable("settings.lastUpdated", &self.settings.last_updated)
    }

    /// Template record written by `countdown-service init`.
    pub fn template(now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            event_details: EventDetails {
                target_instant: now + chrono::Duration::days(30),
                location: "To be announced".to_string(),
                timezone: "UTC".to_string(),
                title: "Our Big Day".to_string(),
                participants: Participants {
                    primary: "Primary".to_string(),
                    secondary: "Secondary".to_string(),
                },
            },
            display: DisplayConfig {
                completed_message: "The day is here!".to_string(),
                unit_labels: UnitLabels {
                    days: "Days".to_string(),
                    hours: "Hours".to_string(),
                    minutes: "Minutes".to_string(),
                    seconds: "Seconds".to_string(),
                },
            },
            settings: RecordSettings {
                updates_allowed: true,
                last_updated: now,
            },
        }
    }
}

/// Validate a timezone identifier. Returns the reason on failure.
pub fn validate_timezone(value: &str) -> Result<(), &'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("must not be blank");
    }
    if trimmed.chars().count() > MAX_TIMEZONE_LEN {
        return Err("is too long");
    }
    if trimmed.chars().any(char::is_control) {
        return Err("must not contain control characters");
    }
    Ok(())
}

/// Canonical wire form of an instant: UTC, `Z` suffix, fractional seconds
/// only when non-zero and never finer than milliseconds.
pub fn canonical_instant(value: &DateTime<Utc>) -> String {
    value
        .trunc_subsecs(3)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Whether `value` has a four-digit year, the range RFC 3339 can express.
pub fn is_representable(value: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&value.year())
}

/// The canonical form of `value` must read back as the same instant, so a
/// saved document always loads again.
fn check_storable(field: &str, value: &DateTime<Utc>) -> Result<(), String> {
    let rendered = canonical_instant(value);
    match DateTime::parse_from_rfc3339(&rendered) {
        Ok(parsed) if is_representable(value) && parsed == value.trunc_subsecs(3) => Ok(()),
        _ => Err(format!("{field} {rendered:?} is not a storable ISO-8601 instant")),
    }
}

/// Parse a client-supplied date string into an instant.
///
/// Accepts RFC 3339 with any offset, or a naive `YYYY-MM-DDTHH:MM[:SS[.f]]`
/// / `YYYY-MM-DD` value which is read as UTC. Precision is truncated to
/// milliseconds. Instants outside years 0000..=9999 (after conversion to
/// UTC) are rejected.
pub fn parse_instant_input(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_any_instant(raw)
        .map(|parsed| parsed.trunc_subsecs(3))
        .filter(is_representable)
}

fn parse_any_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter that stores instants in canonical form and rejects anything
/// that is not a valid RFC 3339 instant. Loaded values are truncated to
/// milliseconds.
pub mod instant {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::canonical_instant(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc).trunc_subsecs(3))
            .map_err(|e| D::Error::custom(format!("invalid ISO-8601 instant {raw:?}: {e}")))
    }
}
