use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Opaque identifier of an appointment. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(String);

impl AppointmentId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Fresh random id for a newly created appointment.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppointmentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A timed reminder as persisted: `{id, title, date, time}`.
///
/// `date` and `time` are kept as the strings the user (or storage) supplied.
/// Anything that does not parse is carried along untouched and simply never
/// becomes due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub title: String,
    pub date: String,
    pub time: String,
}

impl Appointment {
    pub fn new(
        id: AppointmentId,
        title: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            date: date.into(),
            time: time.into(),
        }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    pub fn parsed_time(&self) -> Option<NaiveTime> {
        parse_time(&self.time)
    }

    /// Local wall-clock instant of the appointment, if both halves parse.
    pub fn occurs_at(&self) -> Option<NaiveDateTime> {
        Some(self.parsed_date()?.and_time(self.parsed_time()?))
    }

    /// `occurs_at < now`. Unknown times are never past.
    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        self.occurs_at().is_some_and(|at| at < now)
    }

    /// `occurs_at <= now`. Unknown times are never due.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.occurs_at().is_some_and(|at| at <= now)
    }
}

/// Result of free-text extraction. Every field may be missing on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAppointment {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl PartialAppointment {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.date.is_none() && self.time.is_none()
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Accepts `HH:MM`, and `HH:MM:SS` as some hosts emit from time inputs.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
