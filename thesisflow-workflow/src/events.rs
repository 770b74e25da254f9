//! Domain event broadcasting.
//!
//! Uses a tokio broadcast channel for event distribution. Publishing is
//! fire-and-forget: when no notifier is subscribed (or a subscriber lags),
//! the event is dropped - a failed notification must never roll back the
//! state change that produced it.

use thesisflow_core::WorkflowEvent;
use tokio::sync::broadcast;

/// Broadcast hub the engines publish [`WorkflowEvent`]s on.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster whose channel buffers `capacity` events per
    /// subscriber before the slowest subscriber starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn broadcast(&self, event: WorkflowEvent) {
        // Err here only means there are no subscribers right now.
        if let Err(err) = self.tx.send(event) {
            tracing::trace!(kind = err.0.kind(), "event dropped, no subscribers");
        }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use thesisflow_core::new_entity_id;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe();

        let event = WorkflowEvent::ChainCompleted {
            chain_id: new_entity_id(),
            subject_id: new_entity_id(),
        };
        events.broadcast(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_silent() {
        let events = EventBroadcaster::new(16);
        // Must not panic or error.
        events.broadcast(WorkflowEvent::ChainCompleted {
            chain_id: new_entity_id(),
            subject_id: new_entity_id(),
        });
        assert_eq!(events.receiver_count(), 0);
    }
}
