//! Domain layer: identifiers, events and sessions, enrollments, users,
//! recurrence rules, the clock and the event bus.
//!
//! Everything here is storage-agnostic; the services in [`crate::service`]
//! combine these types with a [`crate::persistence::DocumentStore`].

pub mod catalog_event;
pub mod clock;
pub mod enrollment;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod recurrence;
pub mod schedule;
pub mod user;

pub use catalog_event::CatalogEvent;
pub use clock::{Clock, FixedClock, SystemClock};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use event::{Event, EventDraft, Session, Visibility};
pub use event_bus::EventBus;
pub use ids::{ClassId, CourseId, EnrollmentId, EventId, SessionId, UserId};
pub use recurrence::RecurrenceRequest;
pub use schedule::TimeOfDay;
pub use user::{User, UserRole};
