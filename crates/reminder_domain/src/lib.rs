pub mod agenda;
pub mod appointment;
pub mod clock;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod extraction;
pub mod notifications;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod store;
pub mod ticker;

pub use crate::appointment::{Appointment, AppointmentId, PartialAppointment};
pub use crate::error::{ExtractionError, NotifyError, ReminderError, StorageError};
pub use crate::notifications::{NotificationRequest, NotificationSink, PermissionState};
pub use crate::service::{ReminderService, ReminderServiceBuilder};
