//! Database row models and their conversions into domain types.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::Versioned;
use crate::domain::{
    ClassId, CourseId, Enrollment, EnrollmentId, EnrollmentStatus, Event, EventId, Session,
    SessionId, User, UserId, UserRole, Visibility,
};
use crate::error::GatewayError;

/// A row of the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event id.
    pub id: Uuid,
    /// Parent event id, for child events.
    pub parent_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Location.
    pub location: String,
    /// Visibility label (`public`, `course`, `class`).
    pub visibility: String,
    /// Allowed course ids.
    pub allowed_courses: Vec<String>,
    /// Allowed class ids.
    pub allowed_classes: Vec<String>,
    /// Whole session list as JSONB.
    pub sessions: Json<Vec<Session>>,
    /// Creator id.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version.
    pub version: i64,
}

impl TryFrom<EventRow> for Versioned<Event> {
    type Error = GatewayError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let visibility = Visibility::parse(&row.visibility)
            .map_err(|e| GatewayError::StoreUnavailable(format!("corrupt event row: {e}")))?;
        Ok(Self {
            value: Event {
                id: EventId::from_uuid(row.id),
                parent_id: row.parent_id.map(EventId::from_uuid),
                name: row.name,
                description: row.description,
                location: row.location,
                visibility,
                allowed_courses: row.allowed_courses.into_iter().map(CourseId::from).collect(),
                allowed_classes: row.allowed_classes.into_iter().map(ClassId::from).collect(),
                sessions: row.sessions.0,
                created_by: UserId::from(row.created_by),
                created_at: row.created_at,
            },
            version: u64::try_from(row.version).unwrap_or(0),
        })
    }
}

/// A row of the `enrollments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EnrollmentRow {
    /// Deterministic `(user, event)` key.
    pub id: String,
    /// Enrolled user.
    pub user_id: String,
    /// Event enrolled in.
    pub event_id: Uuid,
    /// Session holding the seat.
    pub session_id: Uuid,
    /// Status label.
    pub status: String,
    /// Enrollment timestamp.
    pub enrolled_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = GatewayError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let status = EnrollmentStatus::from_label(&row.status).ok_or_else(|| {
            GatewayError::StoreUnavailable(format!("corrupt enrollment status: {}", row.status))
        })?;
        Ok(Self {
            id: EnrollmentId::from_raw(row.id),
            user_id: UserId::from(row.user_id),
            event_id: EventId::from_uuid(row.event_id),
            session_id: SessionId::from_uuid(row.session_id),
            status,
            enrolled_at: row.enrolled_at,
        })
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// Identity-provider id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Roll number.
    pub roll_number: Option<String>,
    /// Role label.
    pub role: String,
    /// Course membership.
    pub course_id: Option<String>,
    /// Class membership.
    pub class_id: Option<String>,
    /// Provisioning timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from(row.id),
            email: row.email,
            display_name: row.display_name,
            roll_number: row.roll_number,
            role: UserRole::from_label(&row.role),
            course_id: row.course_id.map(CourseId::from),
            class_id: row.class_id.map(ClassId::from),
            created_at: row.created_at,
        }
    }
}
