//! Events, their embedded sessions and visibility rules.
//!
//! An [`Event`] exclusively owns its ordered list of [`Session`]s; the list
//! is read and rewritten as a single unit so that a seat-count change can
//! never race independently of its siblings. Events form a two-level
//! hierarchy: parents have no `parent_id`, children reference a parent and
//! never have children of their own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::schedule::{self, TimeOfDay};
use super::{ClassId, CourseId, EventId, SessionId, User, UserId};
use crate::error::GatewayError;

/// Who may see (and therefore enroll in) an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Every member of the organization.
    Public,
    /// Members of one of the event's `allowed_courses`.
    Course,
    /// Members of one of the event's `allowed_classes`.
    Class,
}

impl Visibility {
    /// Returns the lowercase storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Course => "course",
            Self::Class => "class",
        }
    }

    /// Parses a storage label.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for unknown labels.
    pub fn parse(label: &str) -> Result<Self, GatewayError> {
        match label {
            "public" => Ok(Self::Public),
            "course" => Ok(Self::Course),
            "class" => Ok(Self::Class),
            other => Err(GatewayError::InvalidRequest(format!(
                "unknown visibility: {other}"
            ))),
        }
    }
}

/// One concrete date/time/capacity occurrence of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Session identifier, unique within the owning event. Generated when
    /// absent from a request body.
    #[serde(default)]
    pub id: SessionId,
    /// Calendar day of the session.
    pub date: NaiveDate,
    /// Start time (inclusive).
    pub start_time: TimeOfDay,
    /// End time (exclusive), same day as `start_time`.
    pub end_time: TimeOfDay,
    /// Seat ceiling.
    pub capacity: u32,
    /// Seats currently taken. Only the enrollment engine changes this.
    #[serde(default)]
    pub filled: u32,
}

impl Session {
    /// Creates an empty session with a fresh id.
    #[must_use]
    pub fn new(date: NaiveDate, start_time: TimeOfDay, end_time: TimeOfDay, capacity: u32) -> Self {
        Self {
            id: SessionId::new(),
            date,
            start_time,
            end_time,
            capacity,
            filled: 0,
        }
    }

    /// Checks the time window and the seat counters.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the session ends before
    /// it starts, has zero capacity, or is over-filled.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.start_time >= self.end_time {
            return Err(GatewayError::InvalidRequest(format!(
                "session {} must start before it ends ({})",
                self.id,
                self.time_range()
            )));
        }
        if self.capacity == 0 {
            return Err(GatewayError::InvalidRequest(format!(
                "session {} must have a positive capacity",
                self.id
            )));
        }
        if self.filled > self.capacity {
            return Err(GatewayError::InvalidRequest(format!(
                "session {} has {} seats filled but capacity {}",
                self.id, self.filled, self.capacity
            )));
        }
        Ok(())
    }

    /// Seats still available.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.filled)
    }

    /// Returns `true` when no seat is left.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns `true` if both sessions fall on the same day and their
    /// `[start, end)` windows intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.date == other.date
            && schedule::intervals_overlap(
                self.start_time,
                self.end_time,
                other.start_time,
                other.end_time,
            )
    }

    /// Display label of the time window, e.g. `09:00 - 10:30`.
    #[must_use]
    pub fn time_range(&self) -> String {
        schedule::format_time_range(self.start_time, self.end_time)
    }
}

/// An organized activity offered for enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Parent event, for child events.
    pub parent_id: Option<EventId>,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Where the sessions take place.
    pub location: String,
    /// Visibility scope.
    pub visibility: Visibility,
    /// Courses allowed to see the event (visibility `course`).
    pub allowed_courses: Vec<CourseId>,
    /// Classes allowed to see the event (visibility `class`).
    pub allowed_classes: Vec<ClassId>,
    /// Ordered session list.
    pub sessions: Vec<Session>,
    /// Administrator who created the event.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Returns the session with the given id.
    #[must_use]
    pub fn session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    /// Returns the session with the given id, mutably.
    pub fn session_mut(&mut self, session_id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    /// Returns `true` for top-level events.
    #[must_use]
    pub const fn is_parent(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Earliest and latest session dates, or `None` without sessions.
    #[must_use]
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.sessions.iter().map(|s| s.date).min()?;
        let last = self.sessions.iter().map(|s| s.date).max()?;
        Some((first, last))
    }

    /// Returns `true` if the user's course/class membership grants access.
    #[must_use]
    pub fn is_visible_to(&self, user: &User) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Course => user
                .course_id
                .as_ref()
                .is_some_and(|course| self.allowed_courses.contains(course)),
            Visibility::Class => user
                .class_id
                .as_ref()
                .is_some_and(|class| self.allowed_classes.contains(class)),
        }
    }

    /// Returns `true` if the lowercase needle occurs in the name or
    /// description, ignoring case.
    #[must_use]
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
    }
}

/// Administrator-supplied event content, used for both create and the
/// whole-document replace of update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDraft {
    /// Parent event, for child events.
    #[serde(default)]
    pub parent_id: Option<EventId>,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Where the sessions take place.
    #[serde(default)]
    pub location: String,
    /// Visibility scope.
    pub visibility: Visibility,
    /// Courses allowed to see the event.
    #[serde(default)]
    pub allowed_courses: Vec<CourseId>,
    /// Classes allowed to see the event.
    #[serde(default)]
    pub allowed_classes: Vec<ClassId>,
    /// Full session list. Seat counts supplied here are ignored.
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl EventDraft {
    /// Validates fields that do not depend on other stored events.
    ///
    /// Scope lists are deduplicated and cleared when they do not apply to
    /// the chosen visibility. Seat counts are reset to zero; the service
    /// carries stored counts over on edits.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an empty name, a scoped
    /// visibility without any allowed course/class, duplicate session ids,
    /// or an invalid session.
    pub fn normalize(&mut self) -> Result<(), GatewayError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "event name must not be empty".to_string(),
            ));
        }

        self.allowed_courses.sort();
        self.allowed_courses.dedup();
        self.allowed_classes.sort();
        self.allowed_classes.dedup();
        match self.visibility {
            Visibility::Public => {
                self.allowed_courses.clear();
                self.allowed_classes.clear();
            }
            Visibility::Course => {
                self.allowed_classes.clear();
                if self.allowed_courses.is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "course visibility requires at least one allowed course".to_string(),
                    ));
                }
            }
            Visibility::Class => {
                self.allowed_courses.clear();
                if self.allowed_classes.is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "class visibility requires at least one allowed class".to_string(),
                    ));
                }
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(self.sessions.len());
        for session in &mut self.sessions {
            if !seen.insert(session.id) {
                return Err(GatewayError::InvalidRequest(format!(
                    "duplicate session id {}",
                    session.id
                )));
            }
            session.filled = 0;
            session.validate()?;
        }
        Ok(())
    }
}

/// Checks that every session of a child event falls within the parent's
/// session date span. A parent without sessions imposes no bound.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidDateRange`] naming the first offending
/// session.
pub fn check_within_parent(parent: &Event, sessions: &[Session]) -> Result<(), GatewayError> {
    let Some((first, last)) = parent.date_span() else {
        return Ok(());
    };
    match sessions.iter().find(|s| s.date < first || s.date > last) {
        Some(outside) => Err(GatewayError::InvalidDateRange(format!(
            "session on {} is outside the parent event's range {} to {}",
            outside.date, first, last
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::UserRole;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("invalid test date");
        };
        date
    }

    pub(crate) fn time(s: &str) -> TimeOfDay {
        let Ok(time) = s.parse() else {
            panic!("invalid test time {s}");
        };
        time
    }

    pub(crate) fn session(d: NaiveDate, start: &str, end: &str, capacity: u32) -> Session {
        Session::new(d, time(start), time(end), capacity)
    }

    fn event_with(visibility: Visibility, sessions: Vec<Session>) -> Event {
        Event {
            id: EventId::new(),
            parent_id: None,
            name: "Robotics Club".to_string(),
            description: "Build and program small robots".to_string(),
            location: "Lab 2".to_string(),
            visibility,
            allowed_courses: vec![CourseId::new("eng")],
            allowed_classes: vec![ClassId::new("eng-a")],
            sessions,
            created_by: UserId::new("admin"),
            created_at: Utc::now(),
        }
    }

    fn user(course: Option<&str>, class: Option<&str>) -> User {
        User {
            id: UserId::new("u1"),
            email: "u1@example.org".to_string(),
            display_name: "U One".to_string(),
            roll_number: None,
            role: UserRole::Student,
            course_id: course.map(CourseId::new),
            class_id: class.map(ClassId::new),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn session_validation_rejects_inverted_window() {
        let s = session(date(2024, 5, 10), "11:00", "10:00", 5);
        assert!(s.validate().is_err());
        let s = session(date(2024, 5, 10), "10:00", "10:00", 5);
        assert!(s.validate().is_err());
    }

    #[test]
    fn session_validation_rejects_zero_capacity() {
        let s = session(date(2024, 5, 10), "10:00", "11:00", 0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn remaining_seats_drive_fullness() {
        let mut s = session(date(2024, 5, 10), "10:00", "11:00", 2);
        assert_eq!(s.remaining(), 2);
        s.filled = 1;
        assert_eq!(s.remaining(), 1);
        assert!(!s.is_full());
        s.filled = 2;
        assert_eq!(s.remaining(), 0);
        assert!(s.is_full());
        // Over-filled rows loaded from storage still read as full.
        s.filled = 3;
        assert_eq!(s.remaining(), 0);
        assert!(s.is_full());
    }

    #[test]
    fn overlap_requires_same_date() {
        let a = session(date(2024, 5, 10), "09:00", "10:30", 1);
        let b = session(date(2024, 5, 10), "10:00", "11:00", 1);
        let c = session(date(2024, 5, 11), "10:00", "11:00", 1);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn date_span_covers_all_sessions() {
        let event = event_with(
            Visibility::Public,
            vec![
                session(date(2024, 3, 10), "09:00", "10:00", 1),
                session(date(2024, 3, 2), "09:00", "10:00", 1),
                session(date(2024, 3, 20), "09:00", "10:00", 1),
            ],
        );
        assert_eq!(
            event.date_span(),
            Some((date(2024, 3, 2), date(2024, 3, 20)))
        );
        assert_eq!(event_with(Visibility::Public, vec![]).date_span(), None);
    }

    #[test]
    fn visibility_follows_membership() {
        let public = event_with(Visibility::Public, vec![]);
        let course = event_with(Visibility::Course, vec![]);
        let class = event_with(Visibility::Class, vec![]);

        let outsider = user(None, None);
        assert!(public.is_visible_to(&outsider));
        assert!(!course.is_visible_to(&outsider));
        assert!(!class.is_visible_to(&outsider));

        let member = user(Some("eng"), Some("eng-a"));
        assert!(course.is_visible_to(&member));
        assert!(class.is_visible_to(&member));

        let other = user(Some("bio"), Some("bio-b"));
        assert!(!course.is_visible_to(&other));
        assert!(!class.is_visible_to(&other));
    }

    #[test]
    fn child_sessions_must_fit_parent_span() {
        let parent = event_with(
            Visibility::Public,
            vec![
                session(date(2024, 3, 1), "09:00", "10:00", 1),
                session(date(2024, 3, 31), "09:00", "10:00", 1),
            ],
        );
        let inside = [session(date(2024, 3, 15), "09:00", "10:00", 1)];
        let outside = [session(date(2024, 4, 1), "09:00", "10:00", 1)];
        assert!(check_within_parent(&parent, &inside).is_ok());
        assert!(matches!(
            check_within_parent(&parent, &outside),
            Err(GatewayError::InvalidDateRange(_))
        ));

        let unbounded = event_with(Visibility::Public, vec![]);
        assert!(check_within_parent(&unbounded, &outside).is_ok());
    }

    #[test]
    fn draft_normalization_clears_irrelevant_scopes() {
        let mut draft = EventDraft {
            parent_id: None,
            name: "  Chess  ".to_string(),
            description: String::new(),
            location: String::new(),
            visibility: Visibility::Course,
            allowed_courses: vec![CourseId::new("b"), CourseId::new("a"), CourseId::new("b")],
            allowed_classes: vec![ClassId::new("x")],
            sessions: vec![],
        };
        assert!(draft.normalize().is_ok());
        assert_eq!(draft.name, "Chess");
        assert_eq!(
            draft.allowed_courses,
            vec![CourseId::new("a"), CourseId::new("b")]
        );
        assert!(draft.allowed_classes.is_empty());
    }

    #[test]
    fn draft_with_scoped_visibility_needs_scope() {
        let mut draft = EventDraft {
            parent_id: None,
            name: "Chess".to_string(),
            description: String::new(),
            location: String::new(),
            visibility: Visibility::Class,
            allowed_courses: vec![],
            allowed_classes: vec![],
            sessions: vec![],
        };
        assert!(draft.normalize().is_err());
    }
}
