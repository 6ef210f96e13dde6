//! Error taxonomy for the event record service.
//!
//! Four closed kinds, each with a machine-readable code and an HTTP status.
//! The boundary layer matches on [`ErrorKind`] exhaustively; nothing else
//! decides how a failure is reported.

use std::path::PathBuf;

use thiserror::Error;

/// Error kind for response mapping and structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Store unreadable, unparsable, or schema-invalid.
    Configuration,
    /// Caller-supplied payload missing fields or structurally wrong.
    Validation,
    /// Update attempted while the record is locked.
    Forbidden,
    /// Date supplied but not a valid instant.
    InvalidDate,
}

impl ErrorKind {
    /// HTTP status the boundary layer reports for this kind.
    pub fn status(self) -> u16 {
        match self {
            Self::Configuration => 500,
            Self::Validation => 400,
            Self::Forbidden => 403,
            Self::InvalidDate => 422,
        }
    }
}

/// Which validation rule rejected an update payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    DateRequired,
    NoUpdateFields,
    InvalidTimezone,
    InvalidRequestBody,
}

impl ValidationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateRequired => "DATE_REQUIRED",
            Self::NoUpdateFields => "NO_UPDATE_FIELDS",
            Self::InvalidTimezone => "INVALID_TIMEZONE",
            Self::InvalidRequestBody => "INVALID_REQUEST_BODY",
        }
    }
}

/// Failures of the config store.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration record not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read configuration record at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration record: {source}")]
    Parse { source: serde_json::Error },

    #[error("configuration record violates schema: {reason}")]
    Schema { reason: String },

    #[error("failed to write configuration record at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize configuration record: {source}")]
    Serialize { source: serde_json::Error },
}

impl ConfigurationError {
    /// Stable message exposed to clients; details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Read { .. } => "Failed to load event configuration",
            Self::Parse { .. } | Self::Schema { .. } => "Invalid event configuration format",
            Self::Write { .. } | Self::Serialize { .. } => "Failed to save event configuration",
        }
    }
}

/// Failures surfaced by [`crate::service::ConfigService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{message}")]
    Validation {
        code: ValidationCode,
        message: String,
    },

    #[error("event updates are currently disabled")]
    Forbidden,

    #[error("invalid date format: {value:?}")]
    InvalidDate { value: String },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::InvalidDate { .. } => ErrorKind::InvalidDate,
        }
    }

    /// Machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::Validation { code, .. } => code.as_str(),
            Self::Forbidden => "UPDATES_DISABLED",
            Self::InvalidDate { .. } => "INVALID_DATE_FORMAT",
        }
    }

    /// Human message for the error body.
    pub fn public_message(&self) -> String {
        match self {
            Self::Configuration(e) => e.public_message().to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::Forbidden => "Event updates are currently disabled".to_string(),
            Self::InvalidDate { .. } => {
                "Invalid date format. Please provide a valid ISO datetime string.".to_string()
            }
        }
    }

    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ServiceError::Forbidden.kind().status(), 403);
        assert_eq!(
            ServiceError::InvalidDate {
                value: "x".to_string()
            }
            .kind()
            .status(),
            422
        );
        let no_fields = ServiceError::validation(ValidationCode::NoUpdateFields, "nothing to do");
        assert_eq!(no_fields.kind().status(), 400);
        assert_eq!(no_fields.code(), "NO_UPDATE_FIELDS");
    }

    #[test]
    fn configuration_errors_hide_details() {
        let err = ServiceError::from(ConfigurationError::NotFound {
            path: PathBuf::from("/srv/secret/event.json"),
        });
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(!err.public_message().contains("/srv/secret"));
        assert!(err.to_string().contains("/srv/secret"));
    }
}
