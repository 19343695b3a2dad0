//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::EventId;
use crate::query::{Cursor, PageRequest};

/// Cursor pagination query parameters for list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Items per page; the server default applies when absent.
    pub limit: Option<usize>,
    /// Token from the previous page's `next_cursor`.
    pub cursor: Option<String>,
}

impl PaginationParams {
    /// Builds a page request, falling back to `default_limit`. The service
    /// clamps the limit to its ceiling.
    #[must_use]
    pub fn page_request(&self, default_limit: usize) -> PageRequest {
        let limit = self.limit.unwrap_or(default_limit);
        match self.cursor.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(token) => PageRequest::after(limit, Cursor::from_token(token)),
            None => PageRequest::first(limit),
        }
    }
}

/// Body of a successful delete that may cascade.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// Ids that were removed; empty when nothing existed.
    pub removed: Vec<EventId>,
}
