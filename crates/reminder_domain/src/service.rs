use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::instrument;

use crate::{
    agenda::{self, AgendaView},
    appointment::{Appointment, AppointmentId, PartialAppointment},
    clock::{Clock, SystemClock},
    draft::{AppointmentDraft, DraftSubmission},
    error::{ExtractionError, NotifyError, Result},
    extraction::AppointmentExtractor,
    notifications::{NotificationRequest, NotificationSink, PermissionState},
    scheduler::{ReminderScheduler, ReminderStatus, TickReport},
    storage::{KeyValueStore, MemoryStore},
    store::{AppointmentStore, StoreChange},
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Store and dispatch record live behind one lock so a mutation and the
/// matching reminder invalidation are never observed apart.
struct ReminderState {
    store: AppointmentStore,
    scheduler: ReminderScheduler,
}

/// Process-wide reminders state. Built once at startup by the top-level
/// context and shared with the ticker.
pub struct ReminderService {
    state: Mutex<ReminderState>,
    permission: RwLock<PermissionState>,
    notification_sink: Arc<dyn NotificationSink>,
    extractor: Option<Arc<dyn AppointmentExtractor>>,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<StoreChange>,
}

pub struct ReminderServiceBuilder {
    storage: Option<Arc<dyn KeyValueStore>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    extractor: Option<Arc<dyn AppointmentExtractor>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ReminderServiceBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            notification_sink: None,
            extractor: None,
            clock: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn AppointmentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ReminderService {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let notification_sink = self
            .notification_sink
            .unwrap_or_else(|| Arc::new(SilentSink));
        let permission = notification_sink.permission();
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = AppointmentStore::load(storage);
        tracing::info!(appointments = store.len(), %permission, "reminder service ready");

        ReminderService {
            state: Mutex::new(ReminderState {
                store,
                scheduler: ReminderScheduler::new(),
            }),
            permission: RwLock::new(permission),
            notification_sink,
            extractor: self.extractor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            changes,
        }
    }
}

impl Default for ReminderServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderService {
    pub fn builder() -> ReminderServiceBuilder {
        ReminderServiceBuilder::new()
    }

    pub fn list(&self) -> Vec<Appointment> {
        self.state.lock().store.list().to_vec()
    }

    pub fn get(&self, id: &AppointmentId) -> Option<Appointment> {
        self.state.lock().store.get(id).cloned()
    }

    pub fn agenda(&self) -> AgendaView {
        let now = self.clock.now();
        agenda::build_agenda(self.state.lock().store.list(), now)
    }

    pub fn status(&self, id: &AppointmentId) -> Option<ReminderStatus> {
        let now = self.clock.now();
        let state = self.state.lock();
        let appointment = state.store.get(id)?;
        Some(state.scheduler.status(appointment, now))
    }

    /// Creates an appointment under a freshly generated id.
    #[instrument(skip(self))]
    pub fn add(&self, title: &str, date: &str, time: &str) -> Result<Appointment> {
        let appointment = Appointment::new(AppointmentId::generate(), title, date, time);
        self.insert(appointment.clone())?;
        Ok(appointment)
    }

    /// Inserts an appointment whose id the caller already chose.
    pub fn insert(&self, appointment: Appointment) -> Result<()> {
        self.mutate(|store| store.add(appointment))
    }

    #[instrument(skip(self))]
    pub fn update(
        &self,
        id: &AppointmentId,
        title: &str,
        date: &str,
        time: &str,
    ) -> Result<Appointment> {
        let appointment = Appointment::new(id.clone(), title, date, time);
        self.replace(appointment.clone())?;
        Ok(appointment)
    }

    pub fn replace(&self, appointment: Appointment) -> Result<()> {
        self.mutate(|store| store.update(appointment))
    }

    #[instrument(skip(self))]
    pub fn remove(&self, id: &AppointmentId) {
        let change = {
            let mut state = self.state.lock();
            let change = state.store.remove(id);
            // Clear unconditionally; an unknown id may still linger in the record.
            state.scheduler.observe(&StoreChange::Removed(id.clone()));
            change
        };
        if let Some(change) = change {
            self.publish(change);
        }
    }

    /// Saves a submitted form as either a new appointment or an edit.
    pub fn save_draft(&self, draft: &AppointmentDraft) -> Result<Appointment> {
        match draft.submit()? {
            DraftSubmission::Create(appointment) => {
                self.insert(appointment.clone())?;
                Ok(appointment)
            }
            DraftSubmission::Update(appointment) => {
                self.replace(appointment.clone())?;
                Ok(appointment)
            }
        }
    }

    pub fn permission_state(&self) -> PermissionState {
        *self.permission.read()
    }

    /// Asks the host for permission. A denial is final and not re-prompted.
    #[instrument(skip(self))]
    pub async fn request_permission(&self) -> PermissionState {
        let current = self.permission_state();
        if !current.can_request() {
            tracing::debug!(%current, "permission already settled, not prompting");
            return current;
        }
        let resolved = self.notification_sink.request_permission().await;
        *self.permission.write() = resolved;
        tracing::info!(from = %current, to = %resolved, "notification permission changed");
        resolved
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn extract(
        &self,
        text: &str,
    ) -> std::result::Result<Option<PartialAppointment>, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(ExtractionError::Unconfigured)?;
        let result = extractor.extract(text, self.clock.today()).await;
        match &result {
            Ok(Some(_)) => tracing::debug!("extraction produced a partial appointment"),
            Ok(None) => tracing::info!("extraction answer did not match the expected shape"),
            Err(err) => tracing::warn!(error = %err, "extraction failed"),
        }
        result
    }

    /// One scheduler pass over the current collection.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let permission = self.permission_state();
        let mut state = self.state.lock();
        let ReminderState { store, scheduler } = &mut *state;
        scheduler.tick(store.list(), now, permission, self.notification_sink.as_ref())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut AppointmentStore) -> Result<StoreChange>,
    ) -> Result<()> {
        let change = {
            let mut state = self.state.lock();
            let change = apply(&mut state.store)?;
            state.scheduler.observe(&change);
            change
        };
        tracing::debug!(?change, "appointments changed");
        self.publish(change);
        Ok(())
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

/// Used when no platform notifier is wired in: never granted, never shows.
struct SilentSink;

#[async_trait]
impl NotificationSink for SilentSink {
    fn permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    async fn request_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    fn deliver(&self, _notification: NotificationRequest) -> std::result::Result<(), NotifyError> {
        Err(NotifyError::NotPermitted)
    }
}
