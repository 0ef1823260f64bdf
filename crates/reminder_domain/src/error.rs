use thiserror::Error;

use crate::{appointment::AppointmentId, draft::DraftError};

pub type Result<T, E = ReminderError> = std::result::Result<T, E>;

/// Errors from the mutation API. `DuplicateId` and `NotFound` are store
/// contract violations and are always surfaced, never swallowed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReminderError {
    #[error("appointment `{0}` already exists")]
    DuplicateId(AppointmentId),
    #[error("appointment `{0}` not found")]
    NotFound(AppointmentId),
    #[error("invalid appointment: {0}")]
    InvalidAppointment(String),
    #[error(transparent)]
    Draft(#[from] DraftError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed for key `{key}`")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value under `{key}` is not valid")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Transport or service level failure while extracting. Distinct from an
/// answer that merely could not be understood, which is `Ok(None)`.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction text must not be empty")]
    EmptyText,
    #[error("no extraction service is configured")]
    Unconfigured,
    #[error("extraction failed: {0}")]
    Failed(String),
}

impl ExtractionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether retrying later with the same text might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification permission is not granted")]
    NotPermitted,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}
