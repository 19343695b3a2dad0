//! Domain events reflecting catalog and seat mutations.
//!
//! Every committed change emits a [`CatalogEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers so
//! clients can refresh seat counts without polling.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EnrollmentId, EventId, SessionId, UserId};

/// Domain event emitted after every committed mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CatalogEvent {
    /// A new event was created.
    EventCreated {
        /// Event identifier.
        event_id: EventId,
        /// Parent event, for child events.
        parent_id: Option<EventId>,
        /// Display name.
        name: String,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event was replaced by an administrator edit.
    EventUpdated {
        /// Event identifier.
        event_id: EventId,
        /// Number of sessions after the edit.
        session_count: usize,
        /// Edit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event and its children were deleted.
    EventDeleted {
        /// Event identifier that was requested.
        event_id: EventId,
        /// Child events removed along with it.
        removed_children: Vec<EventId>,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A session's seat count changed.
    SeatsChanged {
        /// Owning event.
        event_id: EventId,
        /// Session whose counter moved.
        session_id: SessionId,
        /// Seats now taken.
        filled: u32,
        /// Seat ceiling.
        capacity: u32,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A seat was taken.
    EnrollmentConfirmed {
        /// Enrollment key.
        enrollment_id: EnrollmentId,
        /// Enrolled user.
        user_id: UserId,
        /// Event enrolled in.
        event_id: EventId,
        /// Session holding the seat.
        session_id: SessionId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A seat was released.
    EnrollmentCanceled {
        /// Enrollment key.
        enrollment_id: EnrollmentId,
        /// User who held the seat.
        user_id: UserId,
        /// Event the enrollment belonged to.
        event_id: EventId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl CatalogEvent {
    /// Returns the event id this change concerns, used for subscription
    /// filtering.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::EventUpdated { event_id, .. }
            | Self::EventDeleted { event_id, .. }
            | Self::SeatsChanged { event_id, .. }
            | Self::EnrollmentConfirmed { event_id, .. }
            | Self::EnrollmentCanceled { event_id, .. } => *event_id,
        }
    }

    /// Returns the snake_case discriminator used on the wire.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event_created",
            Self::EventUpdated { .. } => "event_updated",
            Self::EventDeleted { .. } => "event_deleted",
            Self::SeatsChanged { .. } => "seats_changed",
            Self::EnrollmentConfirmed { .. } => "enrollment_confirmed",
            Self::EnrollmentCanceled { .. } => "enrollment_canceled",
        }
    }
}
