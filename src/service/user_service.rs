//! User service: profile lookup, provisioning and the admin user list.

use std::sync::Arc;

use crate::domain::{ClassId, Clock, CourseId, User, UserId, UserRole};
use crate::error::GatewayError;
use crate::persistence::DocumentStore;
use crate::query::{Page, PageRequest, UserCursorKey, UserFilter, UserQuery, paginate};
use crate::service::event_service::DEFAULT_MAX_PAGE_SIZE;

/// Profile fields supplied when provisioning a user.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// Login email.
    pub email: String,
    /// Name shown in listings.
    pub display_name: String,
    /// School roll number.
    pub roll_number: Option<String>,
    /// Organization role.
    pub role: UserRole,
    /// Course membership.
    pub course_id: Option<CourseId>,
    /// Class membership.
    pub class_id: Option<ClassId>,
}

/// Orchestration layer for user profiles.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    max_page_size: usize,
}

impl UserService {
    /// Creates a new `UserService`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Replaces the page size ceiling.
    #[must_use]
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Loads a profile.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserNotFound`] if no profile exists, or a
    /// store error.
    pub async fn get_user(&self, id: &UserId) -> Result<User, GatewayError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| GatewayError::UserNotFound(id.clone()))
    }

    /// Creates or replaces the profile of `id`. The creation time of an
    /// existing profile is kept.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed email or an
    /// empty display name, or a store error.
    pub async fn upsert_user(&self, id: UserId, profile: UserProfile) -> Result<User, GatewayError> {
        let email = profile.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid email address: {:?}",
                profile.email
            )));
        }
        let display_name = profile.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "display name must not be empty".to_string(),
            ));
        }

        let created_at = match self.store.get_user(&id).await? {
            Some(existing) => existing.created_at,
            None => self.clock.now(),
        };
        let user = User {
            id,
            email,
            display_name,
            roll_number: profile
                .roll_number
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            role: profile.role,
            course_id: profile.course_id,
            class_id: profile.class_id,
            created_at,
        };
        self.store.upsert_user(&user).await?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "user provisioned");
        Ok(user)
    }

    /// Lists users by email, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed cursor, or a
    /// store error.
    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, GatewayError> {
        let page = page.clamped(self.max_page_size);
        let after = page
            .cursor
            .as_ref()
            .map(|c| c.decode::<UserCursorKey>())
            .transpose()?;
        let query = UserQuery {
            course: filter.course.clone(),
            class: filter.class.clone(),
            after,
            limit: Some(page.limit.saturating_add(1)),
        };
        let rows = self.store.find_users(&query).await?;
        paginate(rows, page.limit, UserCursorKey::of, |user| {
            filter
                .search
                .as_deref()
                .is_none_or(|needle| user.matches_text(needle))
        })
    }
}
