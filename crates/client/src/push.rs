//! Push channel subscription.
//!
//! Connects to the relay's WebSocket endpoint, joins a session's room and
//! forwards decoded events to the caller. Delivery is best-effort:
//! consumers must still poll to converge after missed events or a dropped
//! connection.

use crate::{ClientError, ClientResult};
use futures::{SinkExt, StreamExt};
use shared::protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use websocket::{ClientBuilder, Message};

/// Events buffered ahead of the consumer before the reader drops them
const EVENT_BUFFER: usize = 32;

/// A live subscription to one session's broadcast group
pub struct PushSubscription {
    events: mpsc::Receiver<ServerEvent>,
}

impl PushSubscription {
    /// Connect to `push_url` (a `ws://.../ws` endpoint) and subscribe to
    /// `session_id`. The connection is read by a background task that
    /// exits when the socket closes or the subscription is dropped.
    pub async fn connect(push_url: &str, session_id: &str) -> ClientResult<Self> {
        let (mut ws, _) = ClientBuilder::new()
            .uri(push_url)
            .map_err(|e| ClientError::Push(e.to_string()))?
            .connect()
            .await
            .map_err(|e| ClientError::Push(e.to_string()))?;

        let subscribe = ClientEvent::Subscribe {
            session_id: session_id.to_string(),
        };
        let payload = serde_json::to_string(&subscribe)
            .map_err(|e| ClientError::Push(e.to_string()))?;
        ws.send(Message::text(payload))
            .await
            .map_err(|e| ClientError::Push(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session = session_id.to_string();
        tokio::spawn(async move {
            while let Some(frame) = ws.next().await {
                let message = match frame {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(session_id = %session, error = %e, "push channel read failed");
                        break;
                    }
                };
                let Some(text) = message.as_text() else {
                    continue;
                };
                match serde_json::from_str::<ServerEvent>(text) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break; // subscriber dropped
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session, error = %e, "ignoring malformed push event");
                    }
                }
            }
            debug!(session_id = %session, "push channel reader finished");
        });

        Ok(Self { events: rx })
    }

    /// Next pushed event, or `None` once the channel is gone
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }
}
