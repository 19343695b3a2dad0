//! Fan-out of committed catalog changes.
//!
//! Services publish a [`CatalogEvent`] after each successful commit; every
//! WebSocket connection holds its own receiver and filters by event id.
//! Nothing is published for rejected or retried attempts.

use tokio::sync::broadcast;

use super::CatalogEvent;

/// Broadcast bus for [`CatalogEvent`]s.
///
/// A bounded ring buffer: receivers that fall more than `capacity` events
/// behind lose the oldest ones and observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Creates a bus buffering at most `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a change and returns how many receivers got it. With no
    /// receivers the change is dropped.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        let kind = event.event_type_str();
        let event_id = event.event_id();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(kind, %event_id, delivered, "catalog event published");
        delivered
    }

    /// Opens a receiver for changes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    /// Live receivers, reported by the health endpoint.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventId;
    use chrono::Utc;

    fn created(event_id: EventId) -> CatalogEvent {
        CatalogEvent::EventCreated {
            event_id,
            parent_id: None,
            name: "Choir".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(created(EventId::new())), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = EventId::new();
        assert_eq!(bus.publish(created(id)), 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.event_id(), id);
        assert_eq!(e2.event_id(), id);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
