//! Enrollment DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Enrollment, EventId, SessionId};

/// Request body for `POST /enrollments`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEnrollmentRequest {
    /// Event to enroll in.
    pub event_id: EventId,
    /// Session of that event.
    pub session_id: SessionId,
}

/// Response body for enrollment cancel endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancelEnrollmentResponse {
    /// `false` when there was nothing to cancel.
    pub canceled: bool,
    /// The enrollment that was released.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<Enrollment>,
}

impl From<Option<Enrollment>> for CancelEnrollmentResponse {
    fn from(enrollment: Option<Enrollment>) -> Self {
        Self {
            canceled: enrollment.is_some(),
            enrollment,
        }
    }
}
