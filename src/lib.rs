//! # enrollment-gateway
//!
//! Seat-capacity, conflict-checked session enrollment engine with a REST
//! and WebSocket gateway.
//!
//! Members enroll in scheduled sessions of events (courses, workshops,
//! school activities) under three rules: a session never holds more
//! confirmed seats than its capacity, a user holds at most one seat per
//! event, and a user's confirmed sessions never overlap in time.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── EventService / EnrollmentService (service/)
//!     ├── AvailabilityResolver / UserService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Cursor pagination (query)
//!     │
//!     └── DocumentStore (persistence/): memory or PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod query;
pub mod service;
pub mod ws;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete application router (REST, health, WebSocket) over
/// the given state. Middleware layers are added by the caller.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .with_state(state)
}
