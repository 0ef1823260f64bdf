use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{appointment::Appointment, error::NotifyError};

/// Title shown on every reminder alert.
pub const REMINDER_TITLE: &str = "Appointment Reminder";

/// Host authorisation for showing alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Unset,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionState::Granted)
    }

    /// Only an unset permission may be asked for again; a denial is final.
    pub fn can_request(self) -> bool {
        matches!(self, PermissionState::Unset)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionState::Unset => "unset",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unset" | "default" | "" => Ok(PermissionState::Unset),
            "granted" => Ok(PermissionState::Granted),
            "denied" => Ok(PermissionState::Denied),
            other => Err(format!("unknown permission state `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
}

impl NotificationRequest {
    pub fn reminder_for(appointment: &Appointment) -> Self {
        Self {
            title: REMINDER_TITLE.to_string(),
            body: appointment.title.clone(),
        }
    }
}

/// Platform-specific notification adapters implement this trait.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Permission as currently reported by the host.
    fn permission(&self) -> PermissionState;

    /// User-initiated permission prompt. Host failures resolve to `Unset` or
    /// `Denied`; this never errors.
    async fn request_permission(&self) -> PermissionState;

    fn deliver(&self, notification: NotificationRequest) -> Result<(), NotifyError>;
}
