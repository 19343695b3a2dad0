//! REST endpoint handlers organized by resource.

pub mod enrollments;
pub mod events;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(enrollments::routes())
        .merge(users::routes())
}
