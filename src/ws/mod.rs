//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::CatalogEvent`]s
//! (seat counts, enrollments, catalog edits) to clients, filtered by the
//! event ids each connection subscribed to.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
