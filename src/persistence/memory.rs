//! In-memory document store.
//!
//! All maps live behind a single [`tokio::sync::RwLock`]. Reads share the
//! lock; every write, including a whole [`SeatCommit`], runs under the
//! exclusive lock, which makes multi-document commits trivially atomic.
//! Preconditions are still checked so that the read-validate-commit cycle
//! of the services behaves exactly as it does against PostgreSQL.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, EnrollmentWrite, ParentGuard, SeatCommit, UserSchedule, Versioned};
use crate::domain::{Enrollment, EnrollmentId, Event, EventId, User, UserId};
use crate::error::GatewayError;
use crate::query::{EventQuery, UserQuery};

#[derive(Debug, Default)]
struct MemoryState {
    events: HashMap<EventId, Versioned<Event>>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    schedule_versions: HashMap<UserId, u64>,
    users: HashMap<UserId, User>,
}

impl MemoryState {
    fn check_parent(&self, guard: Option<ParentGuard>) -> Result<(), GatewayError> {
        let Some(guard) = guard else {
            return Ok(());
        };
        match self.events.get(&guard.parent_id) {
            Some(parent)
                if parent.value.parent_id.is_none() && parent.version == guard.expected_version =>
            {
                Ok(())
            }
            _ => Err(GatewayError::TransactionConflict),
        }
    }

    fn bump_parent(&mut self, guard: Option<ParentGuard>) {
        if let Some(parent) = guard.and_then(|g| self.events.get_mut(&g.parent_id)) {
            parent.version = parent.version.saturating_add(1);
        }
    }
}

/// Process-local [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_event(
        &self,
        event: &Event,
        parent: Option<ParentGuard>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.id) {
            return Err(GatewayError::InvalidRequest(format!(
                "event {} already exists",
                event.id
            )));
        }
        state.check_parent(parent)?;
        state.bump_parent(parent);
        state.events.insert(
            event.id,
            Versioned {
                value: event.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Versioned<Event>>, GatewayError> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn replace_event(
        &self,
        event: &Event,
        expected_version: u64,
        parent: Option<ParentGuard>,
    ) -> Result<u64, GatewayError> {
        let mut state = self.state.write().await;
        let current = state
            .events
            .get(&event.id)
            .map(|e| e.version)
            .ok_or(GatewayError::EventNotFound(event.id))?;
        if current != expected_version {
            return Err(GatewayError::TransactionConflict);
        }
        state.check_parent(parent)?;
        state.bump_parent(parent);
        let stored = state
            .events
            .get_mut(&event.id)
            .ok_or(GatewayError::EventNotFound(event.id))?;
        stored.value = event.clone();
        stored.version = stored.version.saturating_add(1);
        Ok(stored.version)
    }

    async fn delete_event_tree(&self, id: EventId) -> Result<Vec<EventId>, GatewayError> {
        let mut state = self.state.write().await;
        if state.events.remove(&id).is_none() {
            return Ok(Vec::new());
        }
        let children: Vec<EventId> = state
            .events
            .values()
            .filter(|e| e.value.parent_id == Some(id))
            .map(|e| e.value.id)
            .collect();
        for child in &children {
            state.events.remove(child);
        }
        let mut removed = Vec::with_capacity(children.len() + 1);
        removed.push(id);
        removed.extend(children);
        Ok(removed)
    }

    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>, GatewayError> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| query.matches(&e.value))
            .map(|e| e.value.clone())
            .collect();
        events.sort_by_key(|e| Reverse((e.created_at, e.id)));
        if let Some(limit) = query.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, GatewayError> {
        Ok(self.state.read().await.enrollments.get(id).cloned())
    }

    async fn user_schedule(&self, user_id: &UserId) -> Result<UserSchedule, GatewayError> {
        let state = self.state.read().await;
        let mut enrollments: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|e| &e.user_id == user_id && e.is_confirmed())
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| e.enrolled_at);
        Ok(UserSchedule {
            version: state.schedule_versions.get(user_id).copied().unwrap_or(0),
            enrollments,
        })
    }

    async fn enrollments_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Enrollment>, GatewayError> {
        let state = self.state.read().await;
        let mut enrollments: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|e| e.event_id == event_id)
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| e.enrolled_at);
        Ok(enrollments)
    }

    async fn commit_seat(&self, commit: &SeatCommit) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;

        let schedule_version = state
            .schedule_versions
            .get(&commit.user_id)
            .copied()
            .unwrap_or(0);
        if schedule_version != commit.expected_schedule_version {
            return Err(GatewayError::TransactionConflict);
        }

        if let Some(update) = &commit.sessions {
            let current = state
                .events
                .get(&update.event_id)
                .map(|e| e.version)
                .ok_or(GatewayError::TransactionConflict)?;
            if current != update.expected_version {
                return Err(GatewayError::TransactionConflict);
            }
        }

        let key_exists = |id: &EnrollmentId| state.enrollments.contains_key(id);
        let key_confirmed = |id: &EnrollmentId| {
            state
                .enrollments
                .get(id)
                .is_some_and(Enrollment::is_confirmed)
        };
        match &commit.enrollment {
            EnrollmentWrite::Insert(enrollment) if key_confirmed(&enrollment.id) => {
                return Err(GatewayError::TransactionConflict);
            }
            EnrollmentWrite::Delete(id) if !key_exists(id) => {
                return Err(GatewayError::TransactionConflict);
            }
            EnrollmentWrite::Insert(_) | EnrollmentWrite::Delete(_) => {}
        }

        // All preconditions hold; apply every write.
        if let Some(update) = &commit.sessions
            && let Some(stored) = state.events.get_mut(&update.event_id)
        {
            stored.value.sessions.clone_from(&update.sessions);
            stored.version = stored.version.saturating_add(1);
        }
        match &commit.enrollment {
            EnrollmentWrite::Insert(enrollment) => {
                state
                    .enrollments
                    .insert(enrollment.id.clone(), enrollment.clone());
            }
            EnrollmentWrite::Delete(id) => {
                state.enrollments.remove(id);
            }
        }
        state
            .schedule_versions
            .insert(commit.user_id.clone(), schedule_version.saturating_add(1));
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError> {
        self.state
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, GatewayError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>, GatewayError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| (a.email.as_str(), &a.id).cmp(&(b.email.as_str(), &b.id)));
        if let Some(limit) = query.limit {
            users.truncate(limit);
        }
        Ok(users)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::tests::{date, session};
    use crate::domain::{EnrollmentStatus, SessionId, Visibility};
    use crate::persistence::SessionsUpdate;
    use chrono::{Duration, Utc};

    fn event(parent_id: Option<EventId>, minutes_ago: i64) -> Event {
        Event {
            id: EventId::new(),
            parent_id,
            name: "Drama".to_string(),
            description: String::new(),
            location: String::new(),
            visibility: Visibility::Public,
            allowed_courses: vec![],
            allowed_classes: vec![],
            sessions: vec![session(date(2024, 5, 10), "10:00", "11:00", 2)],
            created_by: UserId::new("admin"),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn insert_commit(event: &Versioned<Event>, user: &str, schedule: u64) -> SeatCommit {
        let session_id = event
            .value
            .sessions
            .first()
            .map_or_else(SessionId::new, |s| s.id);
        SeatCommit {
            sessions: Some(SessionsUpdate {
                event_id: event.value.id,
                expected_version: event.version,
                sessions: event.value.sessions.clone(),
            }),
            user_id: UserId::new(user),
            expected_schedule_version: schedule,
            enrollment: EnrollmentWrite::Insert(Enrollment::confirmed(
                UserId::new(user),
                event.value.id,
                session_id,
                Utc::now(),
            )),
        }
    }

    #[tokio::test]
    async fn replace_checks_version() {
        let store = MemoryStore::new();
        let e = event(None, 0);
        let Ok(()) = store.insert_event(&e, None).await else {
            panic!("insert failed");
        };
        assert_eq!(store.replace_event(&e, 1, None).await.ok(), Some(2));
        assert!(matches!(
            store.replace_event(&e, 1, None).await,
            Err(GatewayError::TransactionConflict)
        ));
    }

    #[tokio::test]
    async fn delete_tree_removes_children() {
        let store = MemoryStore::new();
        let parent = event(None, 10);
        let child_a = event(Some(parent.id), 5);
        let child_b = event(Some(parent.id), 4);
        let other = event(None, 1);
        for e in [&parent, &child_a, &child_b, &other] {
            let Ok(()) = store.insert_event(e, None).await else {
                panic!("insert failed");
            };
        }
        let Ok(removed) = store.delete_event_tree(parent.id).await else {
            panic!("delete failed");
        };
        assert_eq!(removed.len(), 3);
        let Ok(left) = store.find_events(&EventQuery::default()).await else {
            panic!("find failed");
        };
        assert_eq!(left.len(), 1);
        assert_eq!(left.first().map(|e| e.id), Some(other.id));

        let Ok(again) = store.delete_event_tree(parent.id).await else {
            panic!("delete failed");
        };
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn find_events_orders_newest_first() {
        let store = MemoryStore::new();
        let old = event(None, 30);
        let new = event(None, 1);
        for e in [&old, &new] {
            let Ok(()) = store.insert_event(e, None).await else {
                panic!("insert failed");
            };
        }
        let Ok(found) = store.find_events(&EventQuery::default()).await else {
            panic!("find failed");
        };
        let ids: Vec<EventId> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn commit_rejects_stale_versions_and_existing_keys() {
        let store = MemoryStore::new();
        let e = event(None, 0);
        let Ok(()) = store.insert_event(&e, None).await else {
            panic!("insert failed");
        };
        let Ok(Some(stored)) = store.get_event(e.id).await else {
            panic!("event missing");
        };

        let commit = insert_commit(&stored, "u1", 0);
        assert!(store.commit_seat(&commit).await.is_ok());

        // Same commit again: event version and schedule version are stale,
        // and the enrollment key exists.
        assert!(matches!(
            store.commit_seat(&commit).await,
            Err(GatewayError::TransactionConflict)
        ));

        let Ok(schedule) = store.user_schedule(&UserId::new("u1")).await else {
            panic!("schedule read failed");
        };
        assert_eq!(schedule.version, 1);
        assert_eq!(schedule.enrollments.len(), 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let store = MemoryStore::new();
        let e = event(None, 0);
        let Ok(()) = store.insert_event(&e, None).await else {
            panic!("insert failed");
        };
        let Ok(Some(stored)) = store.get_event(e.id).await else {
            panic!("event missing");
        };
        // Wrong schedule version: nothing may be written.
        let commit = insert_commit(&stored, "u1", 7);
        assert!(store.commit_seat(&commit).await.is_err());

        let Ok(Some(after)) = store.get_event(e.id).await else {
            panic!("event missing");
        };
        assert_eq!(after.version, stored.version);
        let Ok(enrollments) = store.enrollments_for_event(e.id).await else {
            panic!("read failed");
        };
        assert!(enrollments.is_empty());
    }

    #[tokio::test]
    async fn child_write_checks_and_bumps_parent() {
        let store = MemoryStore::new();
        let parent = event(None, 10);
        let Ok(()) = store.insert_event(&parent, None).await else {
            panic!("insert failed");
        };
        let guard = ParentGuard {
            parent_id: parent.id,
            expected_version: 1,
        };

        let child = event(Some(parent.id), 5);
        let Ok(()) = store.insert_event(&child, Some(guard)).await else {
            panic!("guarded insert failed");
        };
        let Ok(Some(stored)) = store.get_event(parent.id).await else {
            panic!("parent missing");
        };
        assert_eq!(stored.version, 2);

        // The guard was consumed by the first child; a second write with
        // the same observation must conflict and leave nothing behind.
        let late = event(Some(parent.id), 4);
        assert!(matches!(
            store.insert_event(&late, Some(guard)).await,
            Err(GatewayError::TransactionConflict)
        ));
        assert!(matches!(store.get_event(late.id).await, Ok(None)));
        assert!(matches!(
            store.replace_event(&child, 1, Some(guard)).await,
            Err(GatewayError::TransactionConflict)
        ));
        let Ok(Some(unchanged)) = store.get_event(child.id).await else {
            panic!("child missing");
        };
        assert_eq!(unchanged.version, 1);
    }

    #[tokio::test]
    async fn child_write_rejects_missing_or_nested_parent() {
        let store = MemoryStore::new();
        let top = event(None, 10);
        let middle = event(Some(top.id), 5);
        for e in [&top, &middle] {
            let Ok(()) = store.insert_event(e, None).await else {
                panic!("insert failed");
            };
        }

        let missing = ParentGuard {
            parent_id: EventId::new(),
            expected_version: 1,
        };
        let nested = ParentGuard {
            parent_id: middle.id,
            expected_version: 1,
        };
        for guard in [missing, nested] {
            let child = event(Some(guard.parent_id), 1);
            assert!(matches!(
                store.insert_event(&child, Some(guard)).await,
                Err(GatewayError::TransactionConflict)
            ));
        }
        let Ok(all) = store.find_events(&EventQuery::default()).await else {
            panic!("find failed");
        };
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn insert_overwrites_a_canceled_record() {
        let store = MemoryStore::new();
        let e = event(None, 0);
        let Ok(()) = store.insert_event(&e, None).await else {
            panic!("insert failed");
        };
        let Ok(Some(stored)) = store.get_event(e.id).await else {
            panic!("event missing");
        };
        let mut commit = insert_commit(&stored, "u1", 0);
        commit.sessions = None;
        if let EnrollmentWrite::Insert(enrollment) = &mut commit.enrollment {
            enrollment.status = EnrollmentStatus::Canceled;
        }
        assert!(store.commit_seat(&commit).await.is_ok());

        let confirm = insert_commit(&stored, "u1", 1);
        assert!(store.commit_seat(&confirm).await.is_ok());
        let Ok(schedule) = store.user_schedule(&UserId::new("u1")).await else {
            panic!("schedule read failed");
        };
        assert_eq!(schedule.enrollments.len(), 1);
    }
}
