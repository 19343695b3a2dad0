//! Type-safe identifiers for events, sessions, users and enrollments.
//!
//! Event and session ids are server-generated UUID v4 values. User, course
//! and class ids come from external collaborators (identity provider,
//! course catalog) and are carried as opaque strings. Enrollment ids are
//! derived deterministically from the `(user, event)` pair so that the
//! store's own key uniqueness enforces "one enrollment per user per event".

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Creates a new random `EventId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates an `EventId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for EventId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EventId> for uuid::Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Identifier of a session within its owning event.
///
/// Sessions are not addressable outside their event; the id is only
/// unique together with the [`EventId`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `SessionId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declares an opaque string identifier supplied by an external system.
macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

external_id!(
    /// Identity of a user, as issued by the external identity provider.
    UserId
);

external_id!(
    /// Identifier of a course in the external catalog.
    CourseId
);

external_id!(
    /// Identifier of a class group (belongs to one course) in the external catalog.
    ClassId
);

/// Identifier of an enrollment record.
///
/// Always derived from the `(user, event)` pair via [`EnrollmentId::for_pair`];
/// two enrollment attempts by the same user for the same event contend on
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct EnrollmentId(String);

impl EnrollmentId {
    /// Derives the enrollment key for a user and an event.
    #[must_use]
    pub fn for_pair(user_id: &UserId, event_id: EventId) -> Self {
        Self(format!("{user_id}_{event_id}"))
    }

    /// Wraps an enrollment id received from a client.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn enrollment_id_is_deterministic() {
        let user = UserId::new("u-42");
        let event = EventId::new();
        assert_eq!(
            EnrollmentId::for_pair(&user, event),
            EnrollmentId::for_pair(&user, event)
        );
        assert_eq!(
            EnrollmentId::for_pair(&user, event).as_str(),
            format!("u-42_{event}")
        );
    }

    #[test]
    fn enrollment_id_differs_per_event() {
        let user = UserId::new("u-42");
        assert_ne!(
            EnrollmentId::for_pair(&user, EventId::new()),
            EnrollmentId::for_pair(&user, EventId::new())
        );
    }

    #[test]
    fn external_ids_serialize_as_plain_strings() {
        let Ok(json) = serde_json::to_string(&CourseId::new("cs-101")) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"cs-101\"");
    }
}
