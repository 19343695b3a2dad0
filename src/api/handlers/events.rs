//! Event handlers: CRUD, listing, children and session generation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    DeleteResponse, EventListParams, GenerateSessionsRequest, GenerateSessionsResponse,
    PaginationParams,
};
use crate::api::extract::CallerId;
use crate::app_state::AppState;
use crate::domain::{Enrollment, Event, EventDraft, EventId};
use crate::error::{ErrorResponse, GatewayError};
use crate::query::Page;

/// `GET /events` — List events newest first.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed cursor.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    description = "Cursor-paginated event list, newest first. Visibility and course filters apply before the page limit; the text search applies to the fetched page, so a page may be short while `next_cursor` is still present.",
    params(PaginationParams, EventListParams),
    responses(
        (status = 200, description = "One page of events", body = Page<Event>),
        (status = 400, description = "Malformed cursor", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
    Query(params): Query<EventListParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let page = state
        .event_service
        .list_events(&params.into_filter(), page.page_request(state.default_page_size))
        .await?;
    Ok(Json(page))
}

/// `POST /events` — Create an event.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid draft or hierarchy.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates a top-level or child event with its full session list. Seat counts in the body are ignored.",
    request_body = EventDraft,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    let event = state.event_service.create_event(&caller, draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /events/public` — All public events.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/events/public",
    tag = "Events",
    summary = "List public events",
    responses(
        (status = 200, description = "Public events, newest first", body = Vec<Event>),
    )
)]
pub async fn public_events(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.event_service.public_events().await?))
}

/// `GET /events/{id}` — Event details.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(("id" = EventId, Path, description = "Event identifier")),
    responses(
        (status = 200, description = "Event with its sessions", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    let event = state
        .event_service
        .get_event(id)
        .await?
        .ok_or(GatewayError::EventNotFound(id))?;
    Ok(Json(event))
}

/// `PUT /events/{id}` — Replace an event.
///
/// # Errors
///
/// Returns [`GatewayError`] if the event is missing or the draft invalid.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Replace an event",
    description = "Whole-document replace. Sessions that keep their id keep their seat count; capacity cannot drop below it.",
    params(("id" = EventId, Path, description = "Event identifier")),
    request_body = EventDraft,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
    Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.event_service.update_event(id, draft).await?))
}

/// `DELETE /events/{id}` — Delete an event and its children.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete an event",
    description = "Deletes the event and all of its children. Deleting a missing event succeeds with an empty list. Enrollments are not canceled.",
    params(("id" = EventId, Path, description = "Event identifier")),
    responses(
        (status = 200, description = "Removed event ids", body = DeleteResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    let removed = state.event_service.delete_event(id).await?;
    Ok(Json(DeleteResponse { removed }))
}

/// `GET /events/{id}/children` — Children of a parent event.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/children",
    tag = "Events",
    summary = "List child events",
    params(("id" = EventId, Path, description = "Parent event identifier")),
    responses(
        (status = 200, description = "Child events", body = Vec<Event>),
    )
)]
pub async fn children(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.event_service.children_of(id).await?))
}

/// `GET /events/{id}/enrollments` — Enrollments referencing an event.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/enrollments",
    tag = "Events",
    summary = "List an event's enrollments",
    params(("id" = EventId, Path, description = "Event identifier")),
    responses(
        (status = 200, description = "Enrollments, oldest first", body = Vec<Enrollment>),
    )
)]
pub async fn event_enrollments(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.enrollment_service.event_enrollments(id).await?))
}

/// `POST /events/sessions/generate` — Expand a recurrence into sessions.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid recurrence or an empty result.
#[utoipa::path(
    post,
    path = "/api/v1/events/sessions/generate",
    tag = "Events",
    summary = "Generate recurring sessions",
    description = "Expands a date range and weekday set (0 = Sunday) into sessions appended to the staged list. Nothing is persisted.",
    request_body = GenerateSessionsRequest,
    responses(
        (status = 200, description = "Staged plus generated sessions", body = GenerateSessionsResponse),
        (status = 400, description = "Invalid recurrence or no matching day", body = ErrorResponse),
    )
)]
pub async fn generate_sessions(
    State(state): State<AppState>,
    Json(req): Json<GenerateSessionsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let staged = req.staged.len();
    let sessions = state
        .event_service
        .generate_sessions(&req.recurrence, req.parent_id, req.staged)
        .await?;
    Ok(Json(GenerateSessionsResponse {
        added: sessions.len().saturating_sub(staged),
        sessions,
    }))
}

/// Event routes, relative to `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/public", get(public_events))
        .route("/events/sessions/generate", post(generate_sessions))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/{id}/children", get(children))
        .route("/events/{id}/enrollments", get(event_enrollments))
}
