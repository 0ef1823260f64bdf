//! The in-progress create/edit form and the rules for merging extraction
//! results into it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::appointment::{Appointment, AppointmentId, PartialAppointment};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("title, date, and time are required")]
    MissingFields,
    #[error("draft is closed")]
    Closed,
}

/// Handle for one outstanding extraction. Only the newest ticket of an open
/// draft may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionTicket {
    generation: u64,
}

/// What happened to an extraction result handed back to the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Applied,
    /// The service answered but nothing usable came back.
    NotUnderstood,
    /// A newer request was started or the draft was closed in the meantime.
    Discarded,
}

/// Ready-to-save result of a submitted draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftSubmission {
    Create(Appointment),
    Update(Appointment),
}

impl DraftSubmission {
    pub fn appointment(&self) -> &Appointment {
        match self {
            DraftSubmission::Create(appt) | DraftSubmission::Update(appt) => appt,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub title: String,
    pub date: String,
    pub time: String,
    editing: Option<AppointmentId>,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    closed: bool,
}

impl AppointmentDraft {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn edit(appointment: &Appointment) -> Self {
        Self {
            title: appointment.title.clone(),
            date: appointment.date.clone(),
            time: appointment.time.clone(),
            editing: Some(appointment.id.clone()),
            ..Self::default()
        }
    }

    pub fn editing(&self) -> Option<&AppointmentId> {
        self.editing.as_ref()
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Starts a new extraction, superseding any earlier one.
    pub fn begin_extraction(&mut self) -> Result<ExtractionTicket, DraftError> {
        if self.closed {
            return Err(DraftError::Closed);
        }
        self.generation += 1;
        Ok(ExtractionTicket {
            generation: self.generation,
        })
    }

    pub fn apply_extraction(
        &mut self,
        ticket: ExtractionTicket,
        result: Option<PartialAppointment>,
    ) -> ExtractionOutcome {
        if self.closed || ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                closed = self.closed,
                "discarding superseded extraction result"
            );
            return ExtractionOutcome::Discarded;
        }
        let Some(partial) = result else {
            return ExtractionOutcome::NotUnderstood;
        };
        self.merge(&partial);
        ExtractionOutcome::Applied
    }

    /// Copies every non-empty field of `partial` over the draft.
    pub fn merge(&mut self, partial: &PartialAppointment) {
        let fields = [
            (&mut self.title, &partial.title),
            (&mut self.date, &partial.date),
            (&mut self.time, &partial.time),
        ];
        for (slot, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                *slot = value.to_string();
            }
        }
    }

    /// Abandons the form. Outstanding extraction results will be discarded.
    pub fn close(&mut self) {
        self.closed = true;
        self.generation += 1;
    }

    pub fn submit(&self) -> Result<DraftSubmission, DraftError> {
        if self.closed {
            return Err(DraftError::Closed);
        }
        let title = self.title.trim();
        let date = self.date.trim();
        let time = self.time.trim();
        if title.is_empty() || date.is_empty() || time.is_empty() {
            return Err(DraftError::MissingFields);
        }
        Ok(match &self.editing {
            Some(id) => DraftSubmission::Update(Appointment::new(id.clone(), title, date, time)),
            None => DraftSubmission::Create(Appointment::new(
                AppointmentId::generate(),
                title,
                date,
                time,
            )),
        })
    }
}
