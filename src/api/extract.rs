//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::GatewayError;

/// Header carrying the caller identity established by the upstream
/// identity provider.
pub const CALLER_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from the [`CALLER_HEADER`] header.
///
/// Rejects with [`GatewayError::Unauthenticated`] when the header is
/// missing, blank or not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(UserId::new(v)))
            .ok_or(GatewayError::Unauthenticated)
    }
}
