//! Enrollment handlers: enroll, cancel and the caller's own schedule.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{CancelEnrollmentResponse, CreateEnrollmentRequest};
use crate::api::extract::CallerId;
use crate::app_state::AppState;
use crate::domain::{Enrollment, EnrollmentId, EventId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{EventTree, split_hierarchy};

/// `POST /enrollments` — Take a seat for the caller.
///
/// # Errors
///
/// Returns a 404 for an unknown event or session and a 409 for duplicate,
/// overlapping or full enrollments.
#[utoipa::path(
    post,
    path = "/api/v1/enrollments",
    tag = "Enrollments",
    summary = "Enroll in a session",
    description = "Atomically takes a seat for the caller. Rejects a second seat in the same event, a session overlapping another confirmed session of the caller, and full sessions.",
    request_body = CreateEnrollmentRequest,
    responses(
        (status = 201, description = "Enrollment confirmed", body = Enrollment),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Event or session not found", body = ErrorResponse),
        (status = 409, description = "Duplicate, schedule conflict or session full", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(req): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let enrollment = state
        .enrollment_service
        .create_enrollment(&caller, req.event_id, req.session_id)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// `DELETE /enrollments/{id}` — Cancel any enrollment by key.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    delete,
    path = "/api/v1/enrollments/{id}",
    tag = "Enrollments",
    summary = "Cancel an enrollment",
    description = "Releases the seat and deletes the record. Canceling a missing enrollment succeeds with `canceled: false`.",
    params(("id" = String, Path, description = "Enrollment key `{user_id}_{event_id}`")),
    responses(
        (status = 200, description = "Cancel outcome", body = CancelEnrollmentResponse),
    )
)]
pub async fn cancel_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let canceled = state
        .enrollment_service
        .cancel_enrollment(&EnrollmentId::from_raw(id))
        .await?;
    Ok(Json(CancelEnrollmentResponse::from(canceled)))
}

/// `GET /me/enrollments` — The caller's confirmed enrollments.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/me/enrollments",
    tag = "Me",
    summary = "List my enrollments",
    responses(
        (status = 200, description = "Confirmed enrollments, oldest first", body = Vec<Enrollment>),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn my_enrollments(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.enrollment_service.user_enrollments(&caller).await?))
}

/// `DELETE /me/enrollments/{event_id}` — Cancel the caller's seat in an
/// event.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    delete,
    path = "/api/v1/me/enrollments/{event_id}",
    tag = "Me",
    summary = "Cancel my enrollment",
    params(("event_id" = EventId, Path, description = "Event identifier")),
    responses(
        (status = 200, description = "Cancel outcome", body = CancelEnrollmentResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn cancel_my_enrollment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    let canceled = state
        .enrollment_service
        .cancel_enrollment(&EnrollmentId::for_pair(&caller, event_id))
        .await?;
    Ok(Json(CancelEnrollmentResponse::from(canceled)))
}

/// `GET /me/available-events` — Events the caller may enroll in.
///
/// # Errors
///
/// Returns [`GatewayError::UserNotFound`] if the caller has no profile.
#[utoipa::path(
    get,
    path = "/api/v1/me/available-events",
    tag = "Me",
    summary = "List my available events",
    description = "Public events plus those scoped to the caller's course or class, each annotated with the caller's enrollment, split into parent cards and children.",
    responses(
        (status = 200, description = "Visible events", body = EventTree),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Caller has no profile", body = ErrorResponse),
    )
)]
pub async fn my_available_events(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, GatewayError> {
    let user = state.user_service.get_user(&caller).await?;
    let events = state.availability.annotated_for_user(&user).await?;
    Ok(Json(split_hierarchy(events)))
}

/// Enrollment routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/enrollments", post(create_enrollment))
        .route("/enrollments/{id}", delete(cancel_enrollment))
        .route("/me/enrollments", get(my_enrollments))
        .route("/me/enrollments/{event_id}", delete(cancel_my_enrollment))
        .route("/me/available-events", get(my_available_events))
}
