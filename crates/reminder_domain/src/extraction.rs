use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{appointment::PartialAppointment, error::ExtractionError};

/// Turns free text into a partial appointment via some external service.
///
/// `Ok(None)` means the service answered but the answer did not have the
/// expected shape; `Err` means the service itself could not be reached or
/// misbehaved. Implementations must not retry on their own.
#[async_trait]
pub trait AppointmentExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<Option<PartialAppointment>, ExtractionError>;
}
