//! User handlers: admin list and provisioning.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PaginationParams, UpsertUserRequest, UserListParams};
use crate::app_state::AppState;
use crate::domain::{User, UserId};
use crate::error::{ErrorResponse, GatewayError};
use crate::query::Page;

/// `GET /users` — List users by email.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed cursor.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    summary = "List users",
    description = "Cursor-paginated user list ordered by email. Course and class filters apply before the page limit; the text search applies to the fetched page.",
    params(PaginationParams, UserListParams),
    responses(
        (status = 200, description = "One page of users", body = Page<User>),
        (status = 400, description = "Malformed cursor", body = ErrorResponse),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let page = state
        .user_service
        .list_users(&params.into_filter(), page.page_request(state.default_page_size))
        .await?;
    Ok(Json(page))
}

/// `GET /users/{id}` — A user profile.
///
/// # Errors
///
/// Returns [`GatewayError::UserNotFound`] if no profile exists.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    summary = "Get a user",
    params(("id" = String, Path, description = "Identity-provider user id")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.user_service.get_user(&UserId::new(id)).await?))
}

/// `PUT /users/{id}` — Provision or update a profile.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an invalid profile.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    summary = "Provision a user",
    description = "Creates or replaces the profile for an identity-provider id. Called by the provisioning flow after first sign-in.",
    params(("id" = String, Path, description = "Identity-provider user id")),
    request_body = UpsertUserRequest,
    responses(
        (status = 200, description = "Stored profile", body = User),
        (status = 400, description = "Invalid profile", body = ErrorResponse),
    )
)]
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user = state
        .user_service
        .upsert_user(UserId::new(id), req.into())
        .await?;
    Ok(Json(user))
}

/// User routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).put(upsert_user))
}
