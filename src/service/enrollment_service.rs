//! Enrollment service: capacity-checked, conflict-checked seat allocation.
//!
//! An enrollment runs in two phases:
//!
//! 1. **Pre-check**: a read-only pass over the user's confirmed
//!    enrollments that rejects duplicates and time overlaps early with a
//!    descriptive error. It is advisory only.
//! 2. **Atomic phase**: re-reads the event (with its version), the
//!    enrollment key and the user's schedule (with its version), repeats
//!    every check, then submits one [`SeatCommit`]. A lost race surfaces
//!    as [`GatewayError::TransactionConflict`] and the whole phase is
//!    retried under the [`RetryPolicy`].
//!
//! The commit is conditioned on both the event version and the schedule
//! version, so seat counts never exceed capacity and a user's confirmed
//! sessions never overlap, whatever the interleaving.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    CatalogEvent, Clock, Enrollment, EnrollmentId, Event, EventBus, EventId, Session, SessionId,
    UserId,
};
use crate::error::GatewayError;
use crate::persistence::{
    DocumentStore, EnrollmentWrite, SeatCommit, SessionsUpdate, UserSchedule, Versioned,
};
use crate::service::retry::RetryPolicy;

/// Seat counters of a session after a commit.
#[derive(Debug, Clone, Copy)]
struct Seats {
    session_id: SessionId,
    filled: u32,
    capacity: u32,
}

/// Orchestration layer for enrolling and canceling.
#[derive(Debug, Clone)]
pub struct EnrollmentService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    retry: RetryPolicy,
}

impl EnrollmentService {
    /// Creates a new `EnrollmentService`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            store,
            clock,
            event_bus,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy used for contended commits.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Takes a seat in `session_id` of `event_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::EventNotFound`] / [`GatewayError::SessionNotFound`]
    ///   if the target does not exist.
    /// - [`GatewayError::DuplicateEnrollment`] if the user already holds a
    ///   seat in this event.
    /// - [`GatewayError::ScheduleConflict`] if the session overlaps another
    ///   confirmed session of the user.
    /// - [`GatewayError::SessionFull`] if no seat is left.
    /// - [`GatewayError::StoreUnavailable`] if the store fails or every
    ///   retry lost its race.
    pub async fn create_enrollment(
        &self,
        user_id: &UserId,
        event_id: EventId,
        session_id: SessionId,
    ) -> Result<Enrollment, GatewayError> {
        self.pre_check(user_id, event_id, session_id).await?;

        let (enrollment, seats) = self
            .retry
            .run("create_enrollment", || {
                self.try_enroll(user_id, event_id, session_id)
            })
            .await?;

        let _ = self.event_bus.publish(CatalogEvent::SeatsChanged {
            event_id,
            session_id: seats.session_id,
            filled: seats.filled,
            capacity: seats.capacity,
            timestamp: enrollment.enrolled_at,
        });
        let _ = self.event_bus.publish(CatalogEvent::EnrollmentConfirmed {
            enrollment_id: enrollment.id.clone(),
            user_id: enrollment.user_id.clone(),
            event_id,
            session_id,
            timestamp: enrollment.enrolled_at,
        });
        tracing::info!(
            enrollment_id = %enrollment.id,
            %event_id,
            %session_id,
            filled = seats.filled,
            capacity = seats.capacity,
            "enrollment confirmed"
        );
        Ok(enrollment)
    }

    /// Releases an enrollment and its seat. Canceling an enrollment that
    /// does not exist succeeds and returns `None`.
    ///
    /// If the event or session was deleted in the meantime only the
    /// enrollment record is removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreUnavailable`] if the store fails or
    /// every retry lost its race.
    pub async fn cancel_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<Enrollment>, GatewayError> {
        let outcome = self
            .retry
            .run("cancel_enrollment", || self.try_cancel(enrollment_id))
            .await
            .inspect_err(|err| {
                tracing::warn!(%enrollment_id, error = %err, "enrollment cancel failed");
            })?;

        let Some((enrollment, seats)) = outcome else {
            tracing::debug!(%enrollment_id, "cancel of missing enrollment ignored");
            return Ok(None);
        };

        let now = self.clock.now();
        if let Some(seats) = seats {
            let _ = self.event_bus.publish(CatalogEvent::SeatsChanged {
                event_id: enrollment.event_id,
                session_id: seats.session_id,
                filled: seats.filled,
                capacity: seats.capacity,
                timestamp: now,
            });
        }
        let _ = self.event_bus.publish(CatalogEvent::EnrollmentCanceled {
            enrollment_id: enrollment.id.clone(),
            user_id: enrollment.user_id.clone(),
            event_id: enrollment.event_id,
            timestamp: now,
        });
        tracing::info!(%enrollment_id, event_id = %enrollment.event_id, "enrollment canceled");
        Ok(Some(enrollment))
    }

    /// Confirmed enrollments of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn user_enrollments(&self, user_id: &UserId) -> Result<Vec<Enrollment>, GatewayError> {
        Ok(self.store.user_schedule(user_id).await?.enrollments)
    }

    /// Every enrollment referencing an event, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn event_enrollments(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Enrollment>, GatewayError> {
        self.store.enrollments_for_event(event_id).await
    }

    async fn pre_check(
        &self,
        user_id: &UserId,
        event_id: EventId,
        session_id: SessionId,
    ) -> Result<(), GatewayError> {
        let schedule = self.store.user_schedule(user_id).await?;
        let Some(target) = self.store.get_event(event_id).await? else {
            return Err(GatewayError::EventNotFound(event_id));
        };
        let session = target
            .value
            .session(session_id)
            .ok_or(GatewayError::SessionNotFound {
                event_id,
                session_id,
            })?;
        self.check_schedule(&schedule, &target.value, session)
            .await
            .inspect_err(|err| tracing::debug!(%user_id, %event_id, error = %err, "pre-check rejected enrollment"))
    }

    async fn try_enroll(
        &self,
        user_id: &UserId,
        event_id: EventId,
        session_id: SessionId,
    ) -> Result<(Enrollment, Seats), GatewayError> {
        let Some(Versioned {
            value: mut event,
            version,
        }) = self.store.get_event(event_id).await?
        else {
            return Err(GatewayError::EventNotFound(event_id));
        };

        let key = EnrollmentId::for_pair(user_id, event_id);
        // A canceled or waitlisted record under the key is overwritten.
        if self
            .store
            .get_enrollment(&key)
            .await?
            .is_some_and(|e| e.is_confirmed())
        {
            return Err(GatewayError::DuplicateEnrollment);
        }

        let schedule = self.store.user_schedule(user_id).await?;
        let session = event.session(session_id).ok_or(GatewayError::SessionNotFound {
            event_id,
            session_id,
        })?;
        self.check_schedule(&schedule, &event, session).await?;
        if session.is_full() {
            return Err(GatewayError::SessionFull);
        }

        let Some(session) = event.session_mut(session_id) else {
            return Err(GatewayError::SessionNotFound {
                event_id,
                session_id,
            });
        };
        session.filled = session.filled.saturating_add(1);
        let seats = Seats {
            session_id,
            filled: session.filled,
            capacity: session.capacity,
        };

        let enrollment =
            Enrollment::confirmed(user_id.clone(), event_id, session_id, self.clock.now());
        self.store
            .commit_seat(&SeatCommit {
                sessions: Some(SessionsUpdate {
                    event_id,
                    expected_version: version,
                    sessions: event.sessions,
                }),
                user_id: user_id.clone(),
                expected_schedule_version: schedule.version,
                enrollment: EnrollmentWrite::Insert(enrollment.clone()),
            })
            .await?;
        Ok((enrollment, seats))
    }

    async fn try_cancel(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<(Enrollment, Option<Seats>)>, GatewayError> {
        let Some(enrollment) = self.store.get_enrollment(enrollment_id).await? else {
            return Ok(None);
        };
        let schedule = self.store.user_schedule(&enrollment.user_id).await?;

        let mut seats = None;
        let mut sessions = None;
        let event = if enrollment.is_confirmed() {
            self.store.get_event(enrollment.event_id).await?
        } else {
            tracing::debug!(%enrollment_id, status = enrollment.status.as_str(), "removing record that holds no seat");
            None
        };
        match event {
            Some(Versioned {
                value: mut event,
                version,
            }) => match event.session_mut(enrollment.session_id) {
                Some(session) => {
                    session.filled = session.filled.saturating_sub(1);
                    seats = Some(Seats {
                        session_id: session.id,
                        filled: session.filled,
                        capacity: session.capacity,
                    });
                    sessions = Some(SessionsUpdate {
                        event_id: event.id,
                        expected_version: version,
                        sessions: event.sessions,
                    });
                }
                None => {
                    tracing::warn!(%enrollment_id, session_id = %enrollment.session_id, "canceling enrollment of a removed session");
                }
            },
            None if enrollment.is_confirmed() => {
                tracing::warn!(%enrollment_id, event_id = %enrollment.event_id, "canceling enrollment of a removed event");
            }
            None => {}
        }

        self.store
            .commit_seat(&SeatCommit {
                sessions,
                user_id: enrollment.user_id.clone(),
                expected_schedule_version: schedule.version,
                enrollment: EnrollmentWrite::Delete(enrollment_id.clone()),
            })
            .await?;
        Ok(Some((enrollment, seats)))
    }

    /// Rejects `target` if the user already holds a seat in its event or
    /// one of their confirmed sessions overlaps it. Enrollments whose event
    /// or session is gone are skipped.
    async fn check_schedule(
        &self,
        schedule: &UserSchedule,
        event: &Event,
        target: &Session,
    ) -> Result<(), GatewayError> {
        let mut events: HashMap<EventId, Option<Event>> = HashMap::new();
        for enrollment in schedule.enrollments.iter().filter(|e| e.is_confirmed()) {
            if enrollment.event_id == event.id {
                return Err(GatewayError::DuplicateEnrollment);
            }
            if !events.contains_key(&enrollment.event_id) {
                let loaded = self.store.get_event(enrollment.event_id).await?;
                events.insert(enrollment.event_id, loaded.map(|v| v.value));
            }
            let Some(Some(other)) = events.get(&enrollment.event_id) else {
                tracing::debug!(enrollment_id = %enrollment.id, "skipping enrollment of a removed event");
                continue;
            };
            let Some(other_session) = other.session(enrollment.session_id) else {
                tracing::debug!(enrollment_id = %enrollment.id, "skipping enrollment of a removed session");
                continue;
            };
            if other_session.overlaps(target) {
                return Err(GatewayError::ScheduleConflict {
                    event_name: other.name.clone(),
                    time_range: other_session.time_range(),
                });
            }
        }
        Ok(())
    }
}
