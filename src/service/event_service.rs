//! Event service: event CRUD, hierarchy rules, listing and session
//! generation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::event::check_within_parent;
use crate::domain::recurrence::append_recurring;
use crate::domain::{
    CatalogEvent, Clock, Event, EventBus, EventDraft, EventId, RecurrenceRequest, Session, UserId,
    Visibility,
};
use crate::error::GatewayError;
use crate::persistence::{DocumentStore, ParentGuard, Versioned};
use crate::query::{EventCursorKey, EventFilter, EventQuery, Page, PageRequest, ParentFilter, paginate};
use crate::service::retry::RetryPolicy;

/// Default ceiling for a requested page size.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Orchestration layer for events and their sessions.
///
/// Every write validates the draft, enforces the two-level hierarchy, then
/// persists and emits a [`CatalogEvent`]. Seat counters are never taken
/// from a draft: new sessions start empty and edited sessions keep the
/// stored count.
#[derive(Debug, Clone)]
pub struct EventService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    retry: RetryPolicy,
    max_page_size: usize,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            store,
            clock,
            event_bus,
            retry: RetryPolicy::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Replaces the retry policy used for contended edits.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the page size ceiling.
    #[must_use]
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Creates an event owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an invalid draft or
    /// hierarchy, [`GatewayError::InvalidDateRange`] if a child session
    /// falls outside its parent's span, or a store error.
    pub async fn create_event(
        &self,
        caller: &UserId,
        mut draft: EventDraft,
    ) -> Result<Event, GatewayError> {
        draft.normalize()?;

        let event = Event {
            id: EventId::new(),
            parent_id: draft.parent_id,
            name: draft.name,
            description: draft.description,
            location: draft.location,
            visibility: draft.visibility,
            allowed_courses: draft.allowed_courses,
            allowed_classes: draft.allowed_classes,
            sessions: draft.sessions,
            created_by: caller.clone(),
            created_at: self.clock.now(),
        };
        self.retry
            .run("create_event", || self.try_create(&event))
            .await?;

        let _ = self.event_bus.publish(CatalogEvent::EventCreated {
            event_id: event.id,
            parent_id: event.parent_id,
            name: event.name.clone(),
            timestamp: event.created_at,
        });
        tracing::info!(event_id = %event.id, parent_id = ?event.parent_id, sessions = event.sessions.len(), "event created");
        Ok(event)
    }

    async fn try_create(&self, event: &Event) -> Result<(), GatewayError> {
        let guard = match event.parent_id {
            Some(parent_id) => {
                let parent = self.load_parent(parent_id).await?;
                check_within_parent(&parent.value, &event.sessions)?;
                Some(ParentGuard::observed(&parent))
            }
            None => None,
        };
        self.store.insert_event(event, guard).await
    }

    /// Replaces an event's content with `draft`.
    ///
    /// The draft carries the full session list. Sessions keeping a stored
    /// id keep their seat count; lowering capacity below it is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] if the event does not exist,
    /// [`GatewayError::InvalidRequest`] / [`GatewayError::InvalidDateRange`]
    /// for invalid content or hierarchy, or a store error.
    pub async fn update_event(
        &self,
        id: EventId,
        mut draft: EventDraft,
    ) -> Result<Event, GatewayError> {
        draft.normalize()?;
        if draft.parent_id == Some(id) {
            return Err(GatewayError::InvalidRequest(
                "an event cannot be its own parent".to_string(),
            ));
        }

        let event = self
            .retry
            .run("update_event", || self.try_update(id, &draft))
            .await?;

        let _ = self.event_bus.publish(CatalogEvent::EventUpdated {
            event_id: event.id,
            session_count: event.sessions.len(),
            timestamp: self.clock.now(),
        });
        tracing::info!(event_id = %event.id, sessions = event.sessions.len(), "event updated");
        Ok(event)
    }

    async fn try_update(
        &self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<Event, GatewayError> {
        let guard = match draft.parent_id {
            Some(parent_id) => {
                let parent = self.load_parent(parent_id).await?;
                check_within_parent(&parent.value, &draft.sessions)?;
                Some(ParentGuard::observed(&parent))
            }
            None => None,
        };

        let Some(Versioned {
            value: current,
            version,
        }) = self.store.get_event(id).await?
        else {
            return Err(GatewayError::EventNotFound(id));
        };

        let children = self.children_of(id).await?;
        if guard.is_some() && !children.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "an event with children cannot become a child".to_string(),
            ));
        }

        let stored: HashMap<_, _> = current.sessions.iter().map(|s| (s.id, s.filled)).collect();
        let mut sessions = draft.sessions.clone();
        for session in &mut sessions {
            if let Some(&filled) = stored.get(&session.id) {
                if session.capacity < filled {
                    return Err(GatewayError::InvalidRequest(format!(
                        "session {} already has {filled} seats taken; capacity {} is too low",
                        session.id, session.capacity
                    )));
                }
                session.filled = filled;
            }
        }
        for (removed, filled) in &stored {
            if *filled > 0 && !sessions.iter().any(|s| s.id == *removed) {
                tracing::warn!(event_id = %id, session_id = %removed, filled, "session with enrollments removed");
            }
        }

        let updated = Event {
            id,
            parent_id: draft.parent_id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            visibility: draft.visibility,
            allowed_courses: draft.allowed_courses.clone(),
            allowed_classes: draft.allowed_classes.clone(),
            sessions,
            created_by: current.created_by,
            created_at: current.created_at,
        };
        for child in &children {
            check_within_parent(&updated, &child.sessions)?;
        }

        self.store.replace_event(&updated, version, guard).await?;
        Ok(updated)
    }

    /// Deletes an event and all of its children; returns the removed ids.
    /// Deleting a missing event succeeds with an empty list.
    ///
    /// Enrollments referencing the removed events are left in place.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn delete_event(&self, id: EventId) -> Result<Vec<EventId>, GatewayError> {
        let removed = self.store.delete_event_tree(id).await?;
        if removed.is_empty() {
            tracing::debug!(event_id = %id, "delete of missing event ignored");
            return Ok(removed);
        }

        let removed_children: Vec<EventId> =
            removed.iter().copied().filter(|e| *e != id).collect();
        let _ = self.event_bus.publish(CatalogEvent::EventDeleted {
            event_id: id,
            removed_children: removed_children.clone(),
            timestamp: self.clock.now(),
        });
        tracing::info!(event_id = %id, children = removed_children.len(), "event deleted");
        Ok(removed)
    }

    /// Looks up an event.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
        Ok(self.store.get_event(id).await?.map(|v| v.value))
    }

    /// Lists events newest first, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed cursor, or a
    /// store error.
    pub async fn list_events(
        &self,
        filter: &EventFilter,
        page: PageRequest,
    ) -> Result<Page<Event>, GatewayError> {
        let page = page.clamped(self.max_page_size);
        let after = page
            .cursor
            .as_ref()
            .map(|c| c.decode::<EventCursorKey>())
            .transpose()?;
        let query = EventQuery {
            visibility: filter.visibility,
            course: filter.course.clone(),
            after,
            limit: Some(page.limit.saturating_add(1)),
            ..EventQuery::default()
        };
        let rows = self.store.find_events(&query).await?;
        paginate(rows, page.limit, EventCursorKey::of, |event| {
            filter
                .search
                .as_deref()
                .is_none_or(|needle| event.matches_text(needle))
        })
    }

    /// All public events, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn public_events(&self) -> Result<Vec<Event>, GatewayError> {
        self.store
            .find_events(&EventQuery {
                visibility: Some(Visibility::Public),
                ..EventQuery::default()
            })
            .await
    }

    /// Children of a parent event, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn children_of(&self, parent_id: EventId) -> Result<Vec<Event>, GatewayError> {
        self.store
            .find_events(&EventQuery {
                parent: ParentFilter::ChildOf(parent_id),
                ..EventQuery::default()
            })
            .await
    }

    /// Expands a recurrence into sessions and appends them to `staged`.
    ///
    /// When `parent_id` is given the generated range must fit inside that
    /// parent's session span.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown parent, the
    /// generator's validation errors, or
    /// [`GatewayError::NoSessionsGenerated`] when no day matched.
    pub async fn generate_sessions(
        &self,
        request: &RecurrenceRequest,
        parent_id: Option<EventId>,
        mut staged: Vec<Session>,
    ) -> Result<Vec<Session>, GatewayError> {
        let parent_span = match parent_id {
            Some(id) => self
                .store
                .get_event(id)
                .await?
                .ok_or(GatewayError::EventNotFound(id))?
                .value
                .date_span(),
            None => None,
        };
        let today = self.clock.now().date_naive();
        let added = append_recurring(&mut staged, request, parent_span, today)?;
        tracing::debug!(added, total = staged.len(), "recurring sessions generated");
        Ok(staged)
    }

    async fn load_parent(&self, parent_id: EventId) -> Result<Versioned<Event>, GatewayError> {
        let Some(parent) = self.store.get_event(parent_id).await? else {
            return Err(GatewayError::InvalidRequest(format!(
                "parent event {parent_id} does not exist"
            )));
        };
        if !parent.value.is_parent() {
            return Err(GatewayError::InvalidRequest(
                "a child event cannot have children".to_string(),
            ));
        }
        Ok(parent)
    }
}
