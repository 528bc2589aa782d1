//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PipelineEvent`]s emitted
//! by the admission handler, the completion routine, and the stuck sweep.
//! It is shared via `Arc<EventBus>` across the application. Publishing is
//! fire-and-forget: a generation transition never fails because nobody is
//! listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use lumen_core::types::DbId;

/// A generation lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, e.g. `"generation.completed"`.
    pub event_type: String,

    /// The generation this event concerns.
    pub generation_id: DbId,

    /// The owning user, when known.
    pub user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Create a new event for a generation.
    pub fn new(event_type: impl Into<String>, generation_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            generation_id,
            user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the owning user to the event.
    pub fn with_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PipelineEvent::new("generation.completed", 42)
                .with_user(7)
                .with_payload(serde_json::json!({ "output_count": 2 })),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "generation.completed");
        assert_eq!(event.generation_id, 42);
        assert_eq!(event.user_id, Some(7));
        assert_eq!(event.payload["output_count"], 2);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(PipelineEvent::new("generation.failed", 1));
    }
}
