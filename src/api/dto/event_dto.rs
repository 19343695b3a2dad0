//! Event DTOs: list filters and session generation.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{CourseId, EventId, RecurrenceRequest, Session, Visibility};
use crate::query::{EventFilter, search_term};

/// Filters for `GET /events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventListParams {
    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,
    /// Only events with this visibility.
    pub visibility: Option<Visibility>,
    /// Only events open to this course.
    pub course: Option<String>,
}

impl EventListParams {
    /// Converts the query parameters into a service filter.
    #[must_use]
    pub fn into_filter(self) -> EventFilter {
        EventFilter {
            search: search_term(self.search.as_deref()),
            visibility: self.visibility,
            course: self
                .course
                .filter(|c| !c.trim().is_empty())
                .map(CourseId::new),
        }
    }
}

/// Request body for `POST /events/sessions/generate`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateSessionsRequest {
    /// Date range, time window, capacity and weekdays to expand.
    #[serde(flatten)]
    pub recurrence: RecurrenceRequest,
    /// Parent whose session span bounds the range, for child events.
    #[serde(default)]
    pub parent_id: Option<EventId>,
    /// Sessions already staged in the editor; generated ones are appended.
    #[serde(default)]
    pub staged: Vec<Session>,
}

/// Response body for `POST /events/sessions/generate`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateSessionsResponse {
    /// Number of sessions the recurrence produced.
    pub added: usize,
    /// Staged sessions followed by the generated ones.
    pub sessions: Vec<Session>,
}
