//! Wire types for the HTTP surface.
//!
//! Request bodies, response views, and the error body. Field names are
//! camelCase to match the persisted record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::DerivedCountdown;
use crate::model::{EventConfig, Participants, UnitLabels, instant};

// ─────────────────────────────────────────────────────────────────────────────
// Error codes outside the service taxonomy
// ─────────────────────────────────────────────────────────────────────────────

pub const ERR_NOT_FOUND: &str = "NOT_FOUND";
pub const ERR_METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";

// ─────────────────────────────────────────────────────────────────────────────
// Read views
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /api/config`: the record plus a fresh countdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullConfigView {
    #[serde(flatten)]
    pub config: EventConfig,
    pub countdown: DerivedCountdown,
}

/// `GET /api/config/date`: just enough to drive a countdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateOnlyView {
    #[serde(with = "instant")]
    pub target_instant: DateTime<Utc>,
    pub timezone: String,
    #[serde(flatten)]
    pub countdown: DerivedCountdown,
}

/// `GET /api/countdown`: flat summary for simple display clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSummary {
    #[serde(with = "instant")]
    pub target_instant: DateTime<Utc>,
    #[serde(flatten)]
    pub countdown: DerivedCountdown,
    pub title: String,
    pub location: String,
    pub participants: Participants,
    pub completed_message: String,
    pub unit_labels: UnitLabels,
}

// ─────────────────────────────────────────────────────────────────────────────
// Updates
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `PUT`/`PATCH /api/config/date` and `POST /api/countdown/update-date`.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl DateUpdateRequest {
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref().filter(|v| !v.is_empty())
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref().filter(|v| !v.is_empty())
    }
}

/// A record field an update applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangedField {
    TargetInstant,
    Timezone,
}

/// Successful update response.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
    pub previous: String,
    pub new: String,
    pub timezone: String,
    pub changed: Vec<ChangedField>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors and service endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub message: String,
}

/// `GET /`: endpoint index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}
