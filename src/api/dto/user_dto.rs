//! User DTOs: list filters and provisioning.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ClassId, CourseId, UserRole};
use crate::query::{UserFilter, search_term};
use crate::service::UserProfile;

/// Filters for `GET /users`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListParams {
    /// Case-insensitive substring of email, display name or roll number.
    pub search: Option<String>,
    /// Only members of this course.
    pub course: Option<String>,
    /// Only members of this class.
    pub class: Option<String>,
}

impl UserListParams {
    /// Converts the query parameters into a service filter.
    #[must_use]
    pub fn into_filter(self) -> UserFilter {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        UserFilter {
            search: search_term(self.search.as_deref()),
            course: non_blank(self.course).map(CourseId::new),
            class: non_blank(self.class).map(ClassId::new),
        }
    }
}

/// Request body for `PUT /users/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpsertUserRequest {
    /// Login email.
    pub email: String,
    /// Name shown in listings.
    pub display_name: String,
    /// School roll number.
    #[serde(default)]
    pub roll_number: Option<String>,
    /// Organization role; `student` when absent.
    #[serde(default)]
    pub role: UserRole,
    /// Course membership.
    #[serde(default)]
    pub course_id: Option<CourseId>,
    /// Class membership.
    #[serde(default)]
    pub class_id: Option<ClassId>,
}

impl From<UpsertUserRequest> for UserProfile {
    fn from(req: UpsertUserRequest) -> Self {
        Self {
            email: req.email,
            display_name: req.display_name,
            roll_number: req.roll_number,
            role: req.role,
            course_id: req.course_id,
            class_id: req.class_id,
        }
    }
}
