//! Service layer: business logic orchestration.
//!
//! [`EventService`] owns event CRUD and the hierarchy rules,
//! [`EnrollmentService`] runs the seat allocation engine,
//! [`AvailabilityResolver`] answers "what can this user see", and
//! [`UserService`] manages profiles. Writes emit
//! [`crate::domain::CatalogEvent`]s through the [`crate::domain::EventBus`].

pub mod availability;
pub mod enrollment_service;
pub mod event_service;
pub mod retry;
pub mod user_service;

pub use availability::{AvailabilityResolver, AvailableEvent, EventTree, split_hierarchy};
pub use enrollment_service::EnrollmentService;
pub use event_service::EventService;
pub use retry::RetryPolicy;
pub use user_service::{UserProfile, UserService};
