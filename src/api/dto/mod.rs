//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain types that already carry `Serialize`/`ToSchema` (events,
//! sessions, enrollments, users, pages) are returned as-is; this module
//! only holds request shapes and the few response envelopes around them.

pub mod common_dto;
pub mod enrollment_dto;
pub mod event_dto;
pub mod user_dto;

pub use common_dto::*;
pub use enrollment_dto::*;
pub use event_dto::*;
pub use user_dto::*;
