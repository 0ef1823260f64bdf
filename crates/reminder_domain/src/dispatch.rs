use std::collections::HashSet;

use crate::appointment::AppointmentId;

/// Ids that already produced a reminder in this process. Never persisted.
#[derive(Debug, Default, Clone)]
pub struct DispatchRecord {
    delivered: HashSet<AppointmentId>,
}

impl DispatchRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &AppointmentId) -> bool {
        self.delivered.contains(id)
    }

    /// Returns `false` if the id was already recorded.
    pub fn record(&mut self, id: AppointmentId) -> bool {
        self.delivered.insert(id)
    }

    /// Makes the id eligible for a fresh reminder.
    pub fn clear(&mut self, id: &AppointmentId) -> bool {
        self.delivered.remove(id)
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}
