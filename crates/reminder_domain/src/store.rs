use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    appointment::{Appointment, AppointmentId},
    error::{ReminderError, Result, StorageError},
    storage::KeyValueStore,
};

/// Storage key holding the JSON array of appointments.
pub const APPOINTMENTS_KEY: &str = "appointments";

/// One entry of the store's change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreChange {
    Added(AppointmentId),
    Updated(AppointmentId),
    Removed(AppointmentId),
}

impl StoreChange {
    pub fn id(&self) -> &AppointmentId {
        match self {
            StoreChange::Added(id) | StoreChange::Updated(id) | StoreChange::Removed(id) => id,
        }
    }

    /// Edits and removals re-arm the reminder for that id.
    pub fn invalidates_dispatch(&self) -> bool {
        !matches!(self, StoreChange::Added(_))
    }
}

/// Sole writer of the appointment collection. Every mutation is written
/// through to the backing [`KeyValueStore`]; write failures are logged and
/// the in-memory state stays authoritative.
pub struct AppointmentStore {
    appointments: Vec<Appointment>,
    storage: Arc<dyn KeyValueStore>,
}

impl AppointmentStore {
    /// Loads the persisted collection. Anything unreadable starts the store
    /// empty instead of failing.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let appointments = match read_appointments(storage.as_ref()) {
            Ok(Some(appointments)) => {
                let appointments = drop_duplicate_ids(appointments);
                tracing::debug!(count = appointments.len(), "loaded appointments");
                appointments
            }
            Ok(None) => {
                tracing::debug!("no stored appointments, starting empty");
                Vec::new()
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to read stored appointments, starting empty");
                Vec::new()
            }
        };
        Self {
            appointments,
            storage,
        }
    }

    pub fn list(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: &AppointmentId) -> Option<&Appointment> {
        self.appointments.iter().find(|appt| &appt.id == id)
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn add(&mut self, appointment: Appointment) -> Result<StoreChange> {
        validate(&appointment)?;
        if self.get(&appointment.id).is_some() {
            return Err(ReminderError::DuplicateId(appointment.id));
        }
        let id = appointment.id.clone();
        self.appointments.push(appointment);
        self.persist();
        Ok(StoreChange::Added(id))
    }

    pub fn update(&mut self, appointment: Appointment) -> Result<StoreChange> {
        validate(&appointment)?;
        let slot = self
            .appointments
            .iter_mut()
            .find(|existing| existing.id == appointment.id)
            .ok_or_else(|| ReminderError::NotFound(appointment.id.clone()))?;
        let id = appointment.id.clone();
        *slot = appointment;
        self.persist();
        Ok(StoreChange::Updated(id))
    }

    /// Removing an unknown id is not an error and leaves storage untouched.
    pub fn remove(&mut self, id: &AppointmentId) -> Option<StoreChange> {
        let before = self.appointments.len();
        self.appointments.retain(|appt| &appt.id != id);
        if self.appointments.len() == before {
            tracing::debug!(%id, "remove of unknown appointment ignored");
            return None;
        }
        self.persist();
        Some(StoreChange::Removed(id.clone()))
    }

    fn persist(&self) {
        if let Err(err) = write_appointments(self.storage.as_ref(), &self.appointments) {
            tracing::warn!(error = %err, count = self.appointments.len(), "failed to persist appointments");
        }
    }
}

/// Keeps the first record for each id; later twins are discarded.
fn drop_duplicate_ids(appointments: Vec<Appointment>) -> Vec<Appointment> {
    let mut seen = HashSet::with_capacity(appointments.len());
    appointments
        .into_iter()
        .filter(|appointment| {
            let first = seen.insert(appointment.id.clone());
            if !first {
                tracing::warn!(id = %appointment.id, title = %appointment.title, "dropping stored appointment with duplicate id");
            }
            first
        })
        .collect()
}

fn validate(appointment: &Appointment) -> Result<()> {
    if appointment.title.trim().is_empty() {
        return Err(ReminderError::InvalidAppointment(
            "title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn read_appointments(
    storage: &dyn KeyValueStore,
) -> std::result::Result<Option<Vec<Appointment>>, StorageError> {
    let Some(raw) = storage.get(APPOINTMENTS_KEY)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Decode {
            key: APPOINTMENTS_KEY.to_string(),
            source,
        })
}

fn write_appointments(
    storage: &dyn KeyValueStore,
    appointments: &[Appointment],
) -> std::result::Result<(), StorageError> {
    let raw = serde_json::to_string(appointments).map_err(|source| StorageError::Encode {
        key: APPOINTMENTS_KEY.to_string(),
        source,
    })?;
    storage.set(APPOINTMENTS_KEY, &raw)
}
