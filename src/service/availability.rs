//! Availability resolver: which events a user may see and enroll in.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Enrollment, Event, EventId, User, Visibility};
use crate::error::GatewayError;
use crate::persistence::DocumentStore;
use crate::query::EventQuery;

/// An event as seen by one user, with their seat in it if any.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailableEvent {
    /// The event.
    pub event: Event,
    /// The user's confirmed enrollment in this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<Enrollment>,
}

/// Events split into top-level cards and children grouped by parent.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct EventTree {
    /// Top-level events, plus children whose parent is not in the input.
    pub parents: Vec<AvailableEvent>,
    /// Children keyed by parent id, in input order.
    pub children: BTreeMap<EventId, Vec<AvailableEvent>>,
}

/// Read-only resolver over the event catalog.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    store: Arc<dyn DocumentStore>,
}

impl AvailabilityResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Events visible to `user`: every public event, course events listing
    /// the user's course and class events listing the user's class.
    /// Deduplicated and ordered newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn available_events_for_user(&self, user: &User) -> Result<Vec<Event>, GatewayError> {
        let mut queries = vec![EventQuery {
            visibility: Some(Visibility::Public),
            ..EventQuery::default()
        }];
        if let Some(course) = &user.course_id {
            queries.push(EventQuery {
                visibility: Some(Visibility::Course),
                course: Some(course.clone()),
                ..EventQuery::default()
            });
        }
        if let Some(class) = &user.class_id {
            queries.push(EventQuery {
                visibility: Some(Visibility::Class),
                class: Some(class.clone()),
                ..EventQuery::default()
            });
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for query in &queries {
            for event in self.store.find_events(query).await? {
                if seen.insert(event.id) {
                    events.push(event);
                }
            }
        }
        events.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        tracing::debug!(user_id = %user.id, count = events.len(), "resolved available events");
        Ok(events)
    }

    /// [`Self::available_events_for_user`] with each event annotated with
    /// the user's confirmed enrollment in it.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn annotated_for_user(&self, user: &User) -> Result<Vec<AvailableEvent>, GatewayError> {
        let events = self.available_events_for_user(user).await?;
        let schedule = self.store.user_schedule(&user.id).await?;
        let mut by_event: HashMap<EventId, Enrollment> = schedule
            .enrollments
            .into_iter()
            .filter(Enrollment::is_confirmed)
            .map(|e| (e.event_id, e))
            .collect();

        Ok(events
            .into_iter()
            .map(|event| AvailableEvent {
                enrollment: by_event.remove(&event.id),
                event,
            })
            .collect())
    }
}

/// Splits events into top-level cards and their children.
#[must_use]
pub fn split_hierarchy(events: Vec<AvailableEvent>) -> EventTree {
    let present: HashSet<EventId> = events.iter().map(|e| e.event.id).collect();
    let mut tree = EventTree::default();
    for item in events {
        match item.event.parent_id {
            Some(parent) if present.contains(&parent) => {
                tree.children.entry(parent).or_default().push(item);
            }
            _ => tree.parents.push(item),
        }
    }
    tree
}
