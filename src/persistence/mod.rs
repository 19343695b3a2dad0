//! Persistence layer: the transactional document store behind the engine.
//!
//! [`DocumentStore`] is the seam between the services and a concrete
//! backend. Two implementations are provided:
//!
//! - [`MemoryStore`]: maps behind one `tokio::sync::RwLock`, used for tests
//!   and single-node deployments.
//! - [`PostgresStore`]: `sqlx::PgPool` with one transaction per commit.
//!
//! Every seat mutation goes through [`DocumentStore::commit_seat`], which
//! applies a [`SeatCommit`] all-or-nothing and rejects it with
//! [`GatewayError::TransactionConflict`] when any of its preconditions no
//! longer hold.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{Enrollment, EnrollmentId, Event, EventId, Session, User, UserId};
use crate::error::GatewayError;
use crate::query::{EventQuery, UserQuery};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A stored document together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The document.
    pub value: T,
    /// Version observed at read time; bumped on every write.
    pub version: u64,
}

/// A user's confirmed enrollments read together with the schedule version.
///
/// The version moves on every enroll or cancel of that user, so a commit
/// conditioned on it proves the overlap check ran against the latest
/// schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSchedule {
    /// Schedule version at read time (0 for a user who never enrolled).
    pub version: u64,
    /// Confirmed enrollments of the user.
    pub enrollments: Vec<Enrollment>,
}

/// Conditional rewrite of one event's session list.
#[derive(Debug, Clone)]
pub struct SessionsUpdate {
    /// Event whose sessions are rewritten.
    pub event_id: EventId,
    /// Version the event must still be at.
    pub expected_version: u64,
    /// Complete replacement session list.
    pub sessions: Vec<Session>,
}

/// Precondition on the parent of a child event write.
///
/// The store re-checks, atomically with the write, that the parent still
/// exists, is still top-level and is still at `expected_version`, then bumps
/// the parent's version. Concurrent edits of the parent therefore conflict
/// with the child write instead of racing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentGuard {
    /// Parent the child attaches to.
    pub parent_id: EventId,
    /// Version the parent must still be at.
    pub expected_version: u64,
}

impl ParentGuard {
    /// Builds a guard from the parent as it was read.
    #[must_use]
    pub fn observed(parent: &Versioned<Event>) -> Self {
        Self {
            parent_id: parent.value.id,
            expected_version: parent.version,
        }
    }
}

/// Conditional write of the enrollment record.
#[derive(Debug, Clone)]
pub enum EnrollmentWrite {
    /// Insert; the key must not hold a confirmed enrollment.
    Insert(Enrollment),
    /// Delete; the key must still exist.
    Delete(EnrollmentId),
}

/// Atomic unit of an enroll or cancel.
#[derive(Debug, Clone)]
pub struct SeatCommit {
    /// Seat counter change, absent when the event or session is gone.
    pub sessions: Option<SessionsUpdate>,
    /// User whose schedule changes.
    pub user_id: UserId,
    /// Schedule version the user must still be at.
    pub expected_schedule_version: u64,
    /// Enrollment record change.
    pub enrollment: EnrollmentWrite,
}

/// Durable, transactional storage for events, enrollments and users.
///
/// Implementations must apply [`DocumentStore::commit_seat`],
/// [`DocumentStore::insert_event`] and [`DocumentStore::replace_event`]
/// atomically: concurrent callers either
/// observe the whole write or none of it.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Inserts a new event at version 1, checking `parent` in the same
    /// atomic step when the event is a child.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRequest`] if the id is taken,
    /// [`GatewayError::TransactionConflict`] if the parent guard fails, or
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn insert_event(
        &self,
        event: &Event,
        parent: Option<ParentGuard>,
    ) -> Result<(), GatewayError>;

    /// Loads an event with its version.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn get_event(&self, id: EventId) -> Result<Option<Versioned<Event>>, GatewayError>;

    /// Replaces an event if it is still at `expected_version` and `parent`
    /// still holds; returns the new version.
    ///
    /// # Errors
    ///
    /// [`GatewayError::EventNotFound`] if absent,
    /// [`GatewayError::TransactionConflict`] on a version mismatch or a
    /// failed parent guard, or
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn replace_event(
        &self,
        event: &Event,
        expected_version: u64,
        parent: Option<ParentGuard>,
    ) -> Result<u64, GatewayError>;

    /// Deletes an event together with its children; returns the ids that
    /// were removed (empty if the event did not exist).
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn delete_event_tree(&self, id: EventId) -> Result<Vec<EventId>, GatewayError>;

    /// Lists events in `(created_at DESC, id DESC)` order.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>, GatewayError>;

    /// Loads one enrollment record.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, GatewayError>;

    /// Loads a user's confirmed enrollments and schedule version.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn user_schedule(&self, user_id: &UserId) -> Result<UserSchedule, GatewayError>;

    /// Lists every enrollment referencing an event, oldest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn enrollments_for_event(&self, event_id: EventId)
    -> Result<Vec<Enrollment>, GatewayError>;

    /// Applies an enroll or cancel atomically.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TransactionConflict`] if the event version, the
    /// schedule version or the enrollment key precondition fails, or
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn commit_seat(&self, commit: &SeatCommit) -> Result<(), GatewayError>;

    /// Inserts or replaces a user profile.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError>;

    /// Loads a user profile.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, GatewayError>;

    /// Lists users in `(email ASC, id ASC)` order.
    ///
    /// # Errors
    ///
    /// [`GatewayError::StoreUnavailable`] on backend failure.
    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>, GatewayError>;
}
