//! Organization members as seen by the enrollment engine.
//!
//! Users are provisioned by the external identity system; the engine only
//! reads their course/class membership to scope event visibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ClassId, CourseId, UserId};

/// Role of a user within the organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Enrolls in sessions.
    #[default]
    Student,
    /// Runs sessions.
    Teacher,
    /// Manages events.
    Admin,
}

impl UserRole {
    /// Returns the lowercase storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    /// Parses a storage label, falling back to `Student`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "teacher" => Self::Teacher,
            "admin" => Self::Admin,
            _ => Self::Student,
        }
    }
}

/// A member of the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Identity issued by the identity provider.
    pub id: UserId,
    /// Login email; list ordering key.
    pub email: String,
    /// Name shown in listings.
    pub display_name: String,
    /// School roll number, when assigned.
    pub roll_number: Option<String>,
    /// Organization role.
    pub role: UserRole,
    /// Course membership.
    pub course_id: Option<CourseId>,
    /// Class membership (a class belongs to one course).
    pub class_id: Option<ClassId>,
    /// When the profile was provisioned.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns `true` if the lowercase needle occurs in the email, display
    /// name or roll number, ignoring case.
    #[must_use]
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.email.to_lowercase().contains(needle_lower)
            || self.display_name.to_lowercase().contains(needle_lower)
            || self
                .roll_number
                .as_deref()
                .is_some_and(|roll| roll.to_lowercase().contains(needle_lower))
    }
}
