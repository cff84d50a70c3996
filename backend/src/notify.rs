//! Realtime notifier
//!
//! Room-keyed fan-out of session events to WebSocket subscribers. Delivery
//! is fire-and-forget: events are serialized once and pushed into each
//! subscriber's bounded buffer; a full buffer drops the event. The push
//! channel is a latency optimization over polling, never the source of
//! truth.

use parking_lot::Mutex;
use shared::protocol::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Outgoing buffer size per subscriber. A subscriber that falls this far
/// behind starts losing events and must converge via polling.
const SUBSCRIBER_BUFFER: usize = 32;

/// One push-channel connection. Belongs to at most one room at a time.
pub struct Subscriber {
    pub id: String,
    room: Mutex<Option<String>>,
    tx: mpsc::Sender<Arc<String>>,
}

impl Subscriber {
    pub fn new(id: String) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        (
            Arc::new(Self {
                id,
                room: Mutex::new(None),
                tx,
            }),
            rx,
        )
    }

    /// Bind to a room, leaving any previous one
    pub fn join_room(&self, session_id: &str) {
        *self.room.lock() = Some(session_id.to_string());
    }

    pub fn room(&self) -> Option<String> {
        self.room.lock().clone()
    }

    /// Queue a pre-serialized event. Returns false when the buffer is full.
    fn send(&self, payload: Arc<String>) -> bool {
        self.tx.try_send(payload).is_ok()
    }
}

/// Broadcast groups for all connected push clients
pub struct Notifier {
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection. It receives nothing until it joins a room.
    pub async fn add(&self, subscriber: Arc<Subscriber>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(subscriber.id.clone(), subscriber);
    }

    /// Drop a connection on disconnect. Missing ids are tolerated: an
    /// ungraceful network loss may race the cleanup.
    pub async fn remove(&self, subscriber_id: &str) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(subscriber_id);
    }

    /// Move a connection into the broadcast group for `session_id`
    pub async fn subscribe(&self, subscriber_id: &str, session_id: &str) {
        let subscribers = self.subscribers.read().await;
        if let Some(subscriber) = subscribers.get(subscriber_id) {
            subscriber.join_room(session_id);
            debug!(subscriber_id, session_id, "subscriber joined room");
        }
    }

    /// Deliver `event` to every connection in the session's room.
    /// Best-effort: no acknowledgment, no retry.
    pub async fn publish(&self, session_id: &str, event: &ServerEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(session_id, error = %e, "failed to serialize event");
                return;
            }
        };

        let subscribers = self.subscribers.read().await;
        let mut recipients = 0u32;
        for subscriber in subscribers.values() {
            if subscriber.room().as_deref() == Some(session_id) {
                recipients += 1;
                if !subscriber.send(Arc::clone(&payload)) {
                    warn!(
                        subscriber_id = %subscriber.id,
                        session_id,
                        "dropping event for slow subscriber"
                    );
                }
            }
        }
        debug!(session_id, recipients, "published event");
    }

    /// Number of connections currently in a session's room
    pub async fn room_size(&self, session_id: &str) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers
            .values()
            .filter(|s| s.room().as_deref() == Some(session_id))
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::ServerEvent;

    fn players_event(count: u8) -> ServerEvent {
        ServerEvent::PlayersUpdated {
            players_connected: count,
        }
    }

    #[tokio::test]
    async fn publish_reaches_room_members_only() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        let (s2, mut rx2) = Subscriber::new("c2".to_string());
        notifier.add(s1).await;
        notifier.add(s2).await;
        notifier.subscribe("c1", "g1").await;
        notifier.subscribe("c2", "g2").await;

        notifier.publish("g1", &players_event(2)).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribed_connection_receives_nothing() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        notifier.add(s1).await;

        notifier.publish("g1", &players_event(1)).await;
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn resubscribe_switches_room() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        notifier.add(s1).await;
        notifier.subscribe("c1", "g1").await;
        notifier.subscribe("c1", "g2").await;

        notifier.publish("g1", &players_event(2)).await;
        assert!(rx1.try_recv().is_err());

        notifier.publish("g2", &players_event(2)).await;
        assert!(rx1.try_recv().is_ok());

        assert_eq!(notifier.room_size("g1").await, 0);
        assert_eq!(notifier.room_size("g2").await, 1);
    }

    #[tokio::test]
    async fn remove_stops_delivery() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        notifier.add(s1).await;
        notifier.subscribe("c1", "g1").await;
        notifier.remove("c1").await;

        notifier.publish("g1", &players_event(2)).await;
        assert!(rx1.try_recv().is_err());
        assert_eq!(notifier.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_harmless() {
        let notifier = Notifier::new();
        notifier.remove("ghost").await;
        assert_eq!(notifier.connection_count().await, 0);
    }

    #[tokio::test]
    async fn publish_to_empty_room_does_not_panic() {
        let notifier = Notifier::new();
        notifier.publish("nobody-home", &players_event(1)).await;
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_blocking() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        notifier.add(s1).await;
        notifier.subscribe("c1", "g1").await;

        for _ in 0..(SUBSCRIBER_BUFFER + 10) {
            notifier.publish("g1", &players_event(2)).await;
        }

        // Buffered events are still there; the overflow was dropped and
        // the subscriber stays registered.
        let mut received = 0;
        while rx1.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);
        assert_eq!(notifier.connection_count().await, 1);
    }

    #[tokio::test]
    async fn payload_is_serialized_once_and_shared() {
        let notifier = Notifier::new();
        let (s1, mut rx1) = Subscriber::new("c1".to_string());
        let (s2, mut rx2) = Subscriber::new("c2".to_string());
        notifier.add(s1).await;
        notifier.add(s2).await;
        notifier.subscribe("c1", "g1").await;
        notifier.subscribe("c2", "g1").await;

        notifier.publish("g1", &players_event(2)).await;

        let p1 = rx1.recv().await.expect("c1 receives");
        let p2 = rx2.recv().await.expect("c2 receives");
        assert!(Arc::ptr_eq(&p1, &p2));

        let event: ServerEvent = serde_json::from_str(&p1).expect("payload is valid JSON");
        assert_eq!(event, players_event(2));
    }
}
