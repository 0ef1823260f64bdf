use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::appointment::{parse_date, parse_time, Appointment};

const NO_DATE: &str = "No date";
const NO_TIME: &str = "No time";
const INVALID_DATE: &str = "Invalid date";
const INVALID_TIME: &str = "Invalid time";

/// Display-ready appointment with its derived temporal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaEntry {
    pub appointment: Appointment,
    pub occurs_at: Option<NaiveDateTime>,
    pub is_past: bool,
    pub date_label: String,
    pub time_label: String,
}

impl AgendaEntry {
    pub fn new(appointment: Appointment, now: NaiveDateTime) -> Self {
        let occurs_at = appointment.occurs_at();
        let is_past = appointment.is_past(now);
        let (date_label, time_label) = labels(&appointment);
        Self {
            appointment,
            occurs_at,
            is_past,
            date_label,
            time_label,
        }
    }
}

/// Ordered view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "entries", rename_all = "lowercase")]
pub enum AgendaView {
    /// The service has not produced a view yet.
    Loading,
    /// Loaded, and there is nothing to show.
    Empty,
    Ready(Vec<AgendaEntry>),
}

impl AgendaView {
    pub fn entries(&self) -> &[AgendaEntry] {
        match self {
            AgendaView::Ready(entries) => entries,
            AgendaView::Loading | AgendaView::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AgendaView::Empty)
    }
}

/// Sort key: valid instants ascending, unparseable ones after all of them.
fn compare_occurrence(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts appointments by when they occur. Ties, including every malformed
/// entry, keep their collection order.
pub fn build_agenda(appointments: &[Appointment], now: NaiveDateTime) -> AgendaView {
    if appointments.is_empty() {
        return AgendaView::Empty;
    }

    let mut entries: Vec<AgendaEntry> = appointments
        .iter()
        .cloned()
        .map(|appt| AgendaEntry::new(appt, now))
        .collect();
    entries.sort_by(|a, b| compare_occurrence(a.occurs_at, b.occurs_at));
    AgendaView::Ready(entries)
}

fn labels(appointment: &Appointment) -> (String, String) {
    if appointment.date.trim().is_empty() || appointment.time.trim().is_empty() {
        return (NO_DATE.to_string(), NO_TIME.to_string());
    }
    match (parse_date(&appointment.date), parse_time(&appointment.time)) {
        (Some(date), Some(time)) => (
            date.format("%A, %B %-d, %Y").to_string(),
            time.format("%I:%M %p").to_string(),
        ),
        _ => (INVALID_DATE.to_string(), INVALID_TIME.to_string()),
    }
}
