//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the enrollment engine and
//! its HTTP surface. Each variant maps to a numeric error code and an HTTP
//! status, and renders as a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EventId, SessionId, UserId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4002,
///     "message": "schedule conflict with \"Algebra I\" (09:00 - 10:30)",
///     "details": "Algebra I|09:00 - 10:30"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                  |
/// |-----------|-----------------------|------------------------------|
/// | 1000–1999 | Validation / identity | 400 Bad Request / 401        |
/// | 2000–2999 | Not Found             | 404 Not Found                |
/// | 3000–3999 | Server / store        | 500 / 503                    |
/// | 4000–4999 | Enrollment rules      | 409 Conflict                 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A date range is reversed or falls outside the allowed bounds.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// The recurrence rule matched no calendar day.
    #[error("no sessions generated for the selected days")]
    NoSessionsGenerated,

    /// The request did not carry a caller identity.
    #[error("missing caller identity")]
    Unauthenticated,

    /// Event with the given id was not found.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Session id is not among the event's sessions.
    #[error("session {session_id} not found in event {event_id}")]
    SessionNotFound {
        /// Event that was searched.
        event_id: EventId,
        /// Session that was requested.
        session_id: SessionId,
    },

    /// User with the given id was not found.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The user already holds a confirmed enrollment for this event.
    #[error("already enrolled in this event")]
    DuplicateEnrollment,

    /// The target session overlaps one of the user's confirmed sessions.
    #[error("schedule conflict with \"{event_name}\" ({time_range})")]
    ScheduleConflict {
        /// Name of the event holding the overlapping enrollment.
        event_name: String,
        /// Time range of the overlapping session, e.g. `09:00 - 10:30`.
        time_range: String,
    },

    /// The target session has no seats left.
    #[error("session is full")]
    SessionFull,

    /// A versioned write lost a race against a concurrent commit.
    ///
    /// Transient: callers retry the whole read-validate-commit cycle.
    #[error("concurrent modification detected")]
    TransactionConflict,

    /// The backing store failed or is unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidDateRange(_) => 1002,
            Self::NoSessionsGenerated => 1003,
            Self::Unauthenticated => 1004,
            Self::EventNotFound(_) => 2001,
            Self::SessionNotFound { .. } => 2002,
            Self::UserNotFound(_) => 2003,
            Self::Internal(_) => 3000,
            Self::StoreUnavailable(_) => 3001,
            Self::TransactionConflict => 3002,
            Self::DuplicateEnrollment => 4001,
            Self::ScheduleConflict { .. } => 4002,
            Self::SessionFull => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidDateRange(_) | Self::NoSessionsGenerated => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::EventNotFound(_) | Self::SessionNotFound { .. } | Self::UserNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::DuplicateEnrollment | Self::ScheduleConflict { .. } | Self::SessionFull => {
                StatusCode::CONFLICT
            }
            Self::TransactionConflict | Self::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if the failure is transient contention that a fresh
    /// read-validate-commit attempt may resolve.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict)
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::ScheduleConflict {
                event_name,
                time_range,
            } => Some(format!("{event_name}|{time_range}")),
            Self::SessionNotFound { event_id, .. } => Some(event_id.to_string()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && matches!(db.code().as_deref(), Some("40001" | "40P01"))
        {
            return Self::TransactionConflict;
        }
        Self::StoreUnavailable(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_rule_errors_are_conflicts() {
        assert_eq!(
            GatewayError::SessionFull.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::DuplicateEnrollment.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(GatewayError::SessionFull.error_code(), 4003);
    }

    #[test]
    fn schedule_conflict_carries_details() {
        let err = GatewayError::ScheduleConflict {
            event_name: "Algebra I".to_string(),
            time_range: "09:00 - 10:30".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "schedule conflict with \"Algebra I\" (09:00 - 10:30)"
        );
        assert_eq!(err.details().as_deref(), Some("Algebra I|09:00 - 10:30"));
    }

    #[test]
    fn only_transaction_conflicts_are_retryable() {
        assert!(GatewayError::TransactionConflict.is_retryable());
        assert!(!GatewayError::SessionFull.is_retryable());
        assert!(!GatewayError::StoreUnavailable("down".to_string()).is_retryable());
    }
}
