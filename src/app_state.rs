//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{Clock, EventBus};
use crate::persistence::DocumentStore;
use crate::service::{AvailabilityResolver, EnrollmentService, EventService, UserService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event CRUD and listing.
    pub event_service: Arc<EventService>,
    /// Seat allocation engine.
    pub enrollment_service: Arc<EnrollmentService>,
    /// Per-user visibility.
    pub availability: Arc<AvailabilityResolver>,
    /// Profiles.
    pub user_service: Arc<UserService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Page size when a list request names none.
    pub default_page_size: usize,
}

impl AppState {
    /// Wires every service over one store, clock and event bus.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: &GatewayConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let retry = config.retry_policy();

        let event_service = EventService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            event_bus.clone(),
        )
        .with_retry(retry)
        .with_max_page_size(config.max_page_size);
        let enrollment_service =
            EnrollmentService::new(Arc::clone(&store), Arc::clone(&clock), event_bus.clone())
                .with_retry(retry);
        let availability = AvailabilityResolver::new(Arc::clone(&store));
        let user_service =
            UserService::new(store, clock).with_max_page_size(config.max_page_size);

        Self {
            event_service: Arc::new(event_service),
            enrollment_service: Arc::new(enrollment_service),
            availability: Arc::new(availability),
            user_service: Arc::new(user_service),
            event_bus,
            default_page_size: config.default_page_size,
        }
    }
}
