use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    appointment::{Appointment, AppointmentId},
    dispatch::DispatchRecord,
    notifications::{NotificationRequest, NotificationSink, PermissionState},
    store::StoreChange,
};

/// Default period between due-checks. Bounds reminder latency only.
pub const DEFAULT_TICK_SECS: u64 = 30;

/// Where an appointment sits in the reminder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderStatus {
    Pending,
    Due,
    Notified,
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub delivered: Vec<AppointmentId>,
    /// Due, but held back because permission is not granted.
    pub awaiting_permission: Vec<AppointmentId>,
    /// Due and permitted, but the sink refused; retried next pass.
    pub failed: Vec<AppointmentId>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.delivered.is_empty() && self.awaiting_permission.is_empty() && self.failed.is_empty()
    }
}

/// Decides which appointments get a reminder. Owns the [`DispatchRecord`];
/// reads appointments it is handed but never mutates them.
#[derive(Debug, Default)]
pub struct ReminderScheduler {
    dispatched: DispatchRecord,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch_record(&self) -> &DispatchRecord {
        &self.dispatched
    }

    pub fn status(&self, appointment: &Appointment, now: NaiveDateTime) -> ReminderStatus {
        if self.dispatched.contains(&appointment.id) {
            ReminderStatus::Notified
        } else if appointment.is_due(now) {
            ReminderStatus::Due
        } else {
            ReminderStatus::Pending
        }
    }

    /// Applies a store change. Must run in the same critical section as the
    /// mutation that produced it.
    pub fn observe(&mut self, change: &StoreChange) {
        if change.invalidates_dispatch() && self.dispatched.clear(change.id()) {
            tracing::debug!(id = %change.id(), "reminder re-armed");
        }
    }

    pub fn tick(
        &mut self,
        appointments: &[Appointment],
        now: NaiveDateTime,
        permission: PermissionState,
        sink: &dyn NotificationSink,
    ) -> TickReport {
        let mut report = TickReport::default();

        for appointment in appointments {
            if self.status(appointment, now) != ReminderStatus::Due {
                continue;
            }
            if !permission.is_granted() {
                report.awaiting_permission.push(appointment.id.clone());
                continue;
            }
            match sink.deliver(NotificationRequest::reminder_for(appointment)) {
                Ok(()) => {
                    tracing::info!(id = %appointment.id, title = %appointment.title, "reminder delivered");
                    self.dispatched.record(appointment.id.clone());
                    report.delivered.push(appointment.id.clone());
                }
                Err(err) => {
                    tracing::warn!(id = %appointment.id, error = %err, "reminder delivery failed");
                    report.failed.push(appointment.id.clone());
                }
            }
        }

        if !report.awaiting_permission.is_empty() {
            tracing::debug!(
                count = report.awaiting_permission.len(),
                %permission,
                "due reminders waiting for permission"
            );
        }
        report
    }
}
