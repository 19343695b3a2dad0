//! Per-connection subscription manager.
//!
//! Tracks which event ids a WebSocket client follows and filters the
//! catalog stream server-side.

use std::collections::HashSet;

use crate::domain::EventId;

/// Manages the set of event subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed event ids. Ignored while `subscribe_all` is set.
    event_ids: HashSet<EventId>,
    /// Whether the client follows every event (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds event ids to the subscription set; `wildcard` follows everything.
    pub fn subscribe(&mut self, ids: &[EventId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.event_ids.extend(ids.iter().copied());
    }

    /// Removes event ids; `wildcard` drops the follow-everything flag.
    pub fn unsubscribe(&mut self, ids: &[EventId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.event_ids.remove(id);
        }
    }

    /// Returns `true` if changes to the given event should be forwarded.
    #[must_use]
    pub fn matches(&self, event_id: EventId) -> bool {
        self.subscribe_all || self.event_ids.contains(&event_id)
    }

    /// Returns the number of explicitly subscribed event ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.event_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

/// Splits raw id strings into parsed event ids and a wildcard flag.
/// Unparseable ids are returned separately so the client can be told.
#[must_use]
pub fn parse_event_ids(raw: &[String]) -> (Vec<EventId>, bool, Vec<String>) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    let mut invalid = Vec::new();
    for value in raw {
        let value = value.trim();
        if value == "*" {
            wildcard = true;
        } else if let Ok(uuid) = value.parse::<uuid::Uuid>() {
            ids.push(EventId::from_uuid(uuid));
        } else {
            invalid.push(value.to_string());
        }
    }
    (ids, wildcard, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(EventId::new()));
    }

    #[test]
    fn explicit_subscription_filters_by_event() {
        let mut mgr = SubscriptionManager::new();
        let id = EventId::new();
        mgr.subscribe(&[id], false);
        assert!(mgr.matches(id));
        assert!(!mgr.matches(EventId::new()));

        mgr.unsubscribe(&[id], false);
        assert!(!mgr.matches(id));
        assert_eq!(mgr.count(), 0);
    }

    #[test]
    fn wildcard_can_be_turned_off() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(EventId::new()));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.is_subscribed_all());
        assert!(!mgr.matches(EventId::new()));
    }

    #[test]
    fn parse_separates_wildcard_and_garbage() {
        let id = EventId::new();
        let raw = vec![id.to_string(), "*".to_string(), "nope".to_string()];
        let (ids, wildcard, invalid) = parse_event_ids(&raw);
        assert_eq!(ids, vec![id]);
        assert!(wildcard);
        assert_eq!(invalid, vec!["nope".to_string()]);
    }
}
