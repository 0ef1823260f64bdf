//! Terminal stand-in for a desktop notification host.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reminder_domain::{
    storage::KeyValueStore, NotificationRequest, NotificationSink, NotifyError, PermissionState,
};
use tracing::{info, warn};

pub const PERMISSION_KEY: &str = "notification_permission";

/// Prints reminders to stdout. The permission decision is kept in the same
/// storage as the appointments so it survives restarts.
pub struct ConsoleNotifier {
    storage: Arc<dyn KeyValueStore>,
    permission: RwLock<PermissionState>,
    grant_on_request: bool,
}

impl ConsoleNotifier {
    pub fn new(storage: Arc<dyn KeyValueStore>, grant_on_request: bool) -> Self {
        let permission = load_permission(storage.as_ref());
        Self {
            storage,
            permission: RwLock::new(permission),
            grant_on_request,
        }
    }

    fn store_permission(&self, state: PermissionState) {
        *self.permission.write() = state;
        let encoded = match serde_json::to_string(&state) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%err, "unable to encode notification permission");
                return;
            }
        };
        if let Err(err) = self.storage.set(PERMISSION_KEY, &encoded) {
            warn!(%err, "unable to persist notification permission");
        }
    }
}

fn load_permission(storage: &dyn KeyValueStore) -> PermissionState {
    match storage.get(PERMISSION_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(%err, "stored notification permission unreadable, treating as unset");
            PermissionState::Unset
        }),
        Ok(None) => PermissionState::Unset,
        Err(err) => {
            warn!(%err, "unable to read notification permission");
            PermissionState::Unset
        }
    }
}

#[async_trait]
impl NotificationSink for ConsoleNotifier {
    fn permission(&self) -> PermissionState {
        *self.permission.read()
    }

    async fn request_permission(&self) -> PermissionState {
        let current = self.permission();
        if !current.can_request() {
            return current;
        }
        let answer = if self.grant_on_request {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.store_permission(answer);
        info!(%answer, "console host answered permission prompt");
        answer
    }

    fn deliver(&self, notification: NotificationRequest) -> Result<(), NotifyError> {
        if !self.permission().is_granted() {
            return Err(NotifyError::NotPermitted);
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {}", notification.title, notification.body)
            .and_then(|()| out.flush())
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;
        info!(body = %notification.body, "reminder shown");
        Ok(())
    }
}
