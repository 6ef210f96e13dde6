//! ConfigService — read and update operations over the event record.
//!
//! Each call loads the record fresh from the store; nothing is cached
//! across calls. Updates run `load → check lock → validate → apply → save`
//! under a write mutex, and the record is only touched after every supplied
//! field has passed validation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::countdown::compute_countdown;
use crate::error::{ServiceError, ValidationCode};
use crate::model::{EventConfig, canonical_instant, parse_instant_input, validate_timezone};
use crate::protocol::{
    ChangedField, CountdownSummary, DateOnlyView, DateUpdateRequest, FullConfigView,
    UpdateResponse,
};
use crate::store::ConfigStore;

/// Result of a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub previous_target: DateTime<Utc>,
    pub new_target: DateTime<Utc>,
    pub previous_timezone: String,
    pub new_timezone: String,
    pub changed: Vec<ChangedField>,
    pub last_updated: DateTime<Utc>,
}

impl UpdateOutcome {
    pub fn message(&self) -> String {
        let date = self.changed.contains(&ChangedField::TargetInstant);
        let timezone = self.changed.contains(&ChangedField::Timezone);
        let what = match (date, timezone) {
            (true, true) => "date and timezone",
            (false, true) => "timezone",
            _ => "date",
        };
        format!("Event {what} updated successfully")
    }
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message(),
            previous: canonical_instant(&outcome.previous_target),
            new: canonical_instant(&outcome.new_target),
            timezone: outcome.new_timezone,
            changed: outcome.changed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateMode {
    /// Date required, timezone optional.
    Full,
    /// At least one of date and timezone.
    Partial,
}

/// Orchestrates reads and updates of the single record.
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    /// Serializes updates so concurrent writers cannot interleave.
    write_lock: Mutex<()>,
}

impl ConfigService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// The raw record, no derived fields.
    pub fn get_config(&self) -> Result<EventConfig, ServiceError> {
        Ok(self.store.load()?)
    }

    pub fn get_full_config(&self) -> Result<FullConfigView, ServiceError> {
        self.get_full_config_at(Utc::now())
    }

    pub fn get_full_config_at(&self, now: DateTime<Utc>) -> Result<FullConfigView, ServiceError> {
        let config = self.store.load()?;
        let countdown = compute_countdown(config.event_details.target_instant, now);
        Ok(FullConfigView { config, countdown })
    }

    pub fn get_date_only(&self) -> Result<DateOnlyView, ServiceError> {
        self.get_date_only_at(Utc::now())
    }

    pub fn get_date_only_at(&self, now: DateTime<Utc>) -> Result<DateOnlyView, ServiceError> {
        let details = self.store.load()?.event_details;
        Ok(DateOnlyView {
            target_instant: details.target_instant,
            countdown: compute_countdown(details.target_instant, now),
            timezone: details.timezone,
        })
    }

    pub fn get_countdown_summary(&self) -> Result<CountdownSummary, ServiceError> {
        self.get_countdown_summary_at(Utc::now())
    }

    pub fn get_countdown_summary_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CountdownSummary, ServiceError> {
        let EventConfig {
            event_details,
            display,
            ..
        } = self.store.load()?;
        Ok(CountdownSummary {
            target_instant: event_details.target_instant,
            countdown: compute_countdown(event_details.target_instant, now),
            title: event_details.title,
            location: event_details.location,
            participants: event_details.participants,
            completed_message: display.completed_message,
            unit_labels: display.unit_labels,
        })
    }

    // ── Updates ──────────────────────────────────────────────────────────

    /// Replace the target instant, and the timezone when one is supplied.
    pub fn update_full(&self, request: &DateUpdateRequest) -> Result<UpdateOutcome, ServiceError> {
        self.update_full_at(request, Utc::now())
    }

    pub fn update_full_at(
        &self,
        request: &DateUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        self.apply_update(Ok(request), UpdateMode::Full, now)
    }

    /// [`Self::update_full`] for a request body that may have failed to
    /// decode. The lock is checked before the decode error is reported.
    pub fn update_full_from(
        &self,
        request: Result<DateUpdateRequest, ServiceError>,
    ) -> Result<UpdateOutcome, ServiceError> {
        match request {
            Ok(request) => self.update_full(&request),
            Err(e) => self.apply_update(Err(e), UpdateMode::Full, Utc::now()),
        }
    }

    /// Apply any non-empty subset of {date, timezone}. All supplied fields
    /// are validated before any is applied.
    pub fn update_partial(
        &self,
        request: &DateUpdateRequest,
    ) -> Result<UpdateOutcome, ServiceError> {
        self.update_partial_at(request, Utc::now())
    }

    pub fn update_partial_at(
        &self,
        request: &DateUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        self.apply_update(Ok(request), UpdateMode::Partial, now)
    }

    /// [`Self::update_partial`] for a request body that may have failed to
    /// decode.
    pub fn update_partial_from(
        &self,
        request: Result<DateUpdateRequest, ServiceError>,
    ) -> Result<UpdateOutcome, ServiceError> {
        match request {
            Ok(request) => self.update_partial(&request),
            Err(e) => self.apply_update(Err(e), UpdateMode::Partial, Utc::now()),
        }
    }

    /// Lock check first, then payload checks, then commit.
    fn apply_update(
        &self,
        request: Result<&DateUpdateRequest, ServiceError>,
        mode: UpdateMode,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        let _guard = self.lock_writes();
        let current = self.load_for_update()?;
        let request = request?;

        let (target, timezone) = match mode {
            UpdateMode::Full => {
                let Some(raw_date) = request.date() else {
                    return Err(ServiceError::validation(
                        ValidationCode::DateRequired,
                        "Date is required",
                    ));
                };
                let target = parse_date(raw_date)?;
                let timezone = request.timezone().map(parse_timezone).transpose()?;
                (Some(target), timezone)
            }
            UpdateMode::Partial => {
                if request.date().is_none() && request.timezone().is_none() {
                    return Err(ServiceError::validation(
                        ValidationCode::NoUpdateFields,
                        "At least one field (date or timezone) must be provided",
                    ));
                }
                let target = request.date().map(parse_date).transpose()?;
                let timezone = request.timezone().map(parse_timezone).transpose()?;
                (target, timezone)
            }
        };

        self.commit(current, target, timezone, now)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn load_for_update(&self) -> Result<EventConfig, ServiceError> {
        let config = self.store.load()?;
        if !config.settings.updates_allowed {
            tracing::warn!("update rejected: record is locked (updatesAllowed=false)");
            return Err(ServiceError::Forbidden);
        }
        Ok(config)
    }

    fn commit(
        &self,
        current: EventConfig,
        target: Option<DateTime<Utc>>,
        timezone: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        let mut next = current.clone();
        let mut changed = Vec::new();

        if let Some(target) = target {
            next.event_details.target_instant = target;
            changed.push(ChangedField::TargetInstant);
        }
        if let Some(timezone) = timezone {
            next.event_details.timezone = timezone;
            changed.push(ChangedField::Timezone);
        }
        next.settings.last_updated = next_last_updated(current.settings.last_updated, now);

        self.store.save(&next)?;

        tracing::info!(
            previous = %canonical_instant(&current.event_details.target_instant),
            new = %canonical_instant(&next.event_details.target_instant),
            timezone = %next.event_details.timezone,
            "event record updated"
        );

        Ok(UpdateOutcome {
            previous_target: current.event_details.target_instant,
            new_target: next.event_details.target_instant,
            previous_timezone: current.event_details.timezone,
            new_timezone: next.event_details.timezone,
            changed,
            last_updated: next.settings.last_updated,
        })
    }
}

/// `lastUpdated` for a write at `now`: millisecond precision and strictly
/// after `previous`, even if the wall clock stalled or stepped back.
pub fn next_last_updated(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    let floor = previous.trunc_subsecs(3) + Duration::milliseconds(1);
    if now >= floor { now } else { floor }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    parse_instant_input(raw).ok_or_else(|| ServiceError::InvalidDate {
        value: raw.to_string(),
    })
}

fn parse_timezone(raw: &str) -> Result<String, ServiceError> {
    validate_timezone(raw).map_err(|reason| {
        ServiceError::validation(
            ValidationCode::InvalidTimezone,
            format!("Timezone {reason}"),
        )
    })?;
    Ok(raw.trim().to_string())
}
