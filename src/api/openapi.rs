//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::api::dto::{
    CancelEnrollmentResponse, CreateEnrollmentRequest, DeleteResponse, GenerateSessionsRequest,
    GenerateSessionsResponse, UpsertUserRequest,
};
use crate::api::handlers::{enrollments, events, system, users};
use crate::domain::{
    ClassId, CourseId, Enrollment, EnrollmentId, EnrollmentStatus, Event, EventDraft, EventId,
    RecurrenceRequest, Session, SessionId, TimeOfDay, User, UserId, UserRole, Visibility,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::query::Cursor;
use crate::service::{AvailableEvent, EventTree};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "enrollment-gateway",
        description = "Events, sessions and conflict-checked enrollment."
    ),
    paths(
        system::health_handler,
        events::list_events,
        events::create_event,
        events::public_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::children,
        events::event_enrollments,
        events::generate_sessions,
        enrollments::create_enrollment,
        enrollments::cancel_enrollment,
        enrollments::my_enrollments,
        enrollments::cancel_my_enrollment,
        enrollments::my_available_events,
        users::list_users,
        users::get_user,
        users::upsert_user,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        Cursor,
        Event,
        EventDraft,
        EventId,
        Session,
        SessionId,
        TimeOfDay,
        Visibility,
        CourseId,
        ClassId,
        Enrollment,
        EnrollmentId,
        EnrollmentStatus,
        User,
        UserId,
        UserRole,
        RecurrenceRequest,
        AvailableEvent,
        EventTree,
        CreateEnrollmentRequest,
        CancelEnrollmentResponse,
        DeleteResponse,
        GenerateSessionsRequest,
        GenerateSessionsResponse,
        UpsertUserRequest,
    )),
    tags(
        (name = "Events", description = "Event catalog administration"),
        (name = "Enrollments", description = "Seat allocation"),
        (name = "Me", description = "Caller-scoped views"),
        (name = "Users", description = "Profiles"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;
