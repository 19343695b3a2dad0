//! Enrollment records: one user's claim on one session of one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EnrollmentId, EventId, SessionId, UserId};

/// Lifecycle status of an enrollment.
///
/// The engine only ever writes `Confirmed`; cancellation deletes the
/// record, which keeps the `(user, event)` key reusable. The other values
/// are accepted when reading records written by other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Holds a seat.
    Confirmed,
    /// Released; does not hold a seat.
    Canceled,
    /// Waiting for a seat; does not hold one.
    Waitlist,
}

impl EnrollmentStatus {
    /// Returns the lowercase storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Canceled => "canceled",
            Self::Waitlist => "waitlist",
        }
    }

    /// Parses a storage label, treating unknown labels as `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "confirmed" => Some(Self::Confirmed),
            "canceled" => Some(Self::Canceled),
            "waitlist" => Some(Self::Waitlist),
            _ => None,
        }
    }
}

/// A user's claim on one session of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    /// Deterministic key derived from `(user_id, event_id)`.
    pub id: EnrollmentId,
    /// Enrolled user.
    pub user_id: UserId,
    /// Event enrolled in.
    pub event_id: EventId,
    /// Session holding the seat.
    pub session_id: SessionId,
    /// Current status.
    pub status: EnrollmentStatus,
    /// When the seat was taken.
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    /// Builds a confirmed enrollment keyed by `(user_id, event_id)`.
    #[must_use]
    pub fn confirmed(
        user_id: UserId,
        event_id: EventId,
        session_id: SessionId,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::for_pair(&user_id, event_id),
            user_id,
            event_id,
            session_id,
            status: EnrollmentStatus::Confirmed,
            enrolled_at,
        }
    }

    /// Returns `true` if the enrollment holds a seat.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == EnrollmentStatus::Confirmed
    }
}
