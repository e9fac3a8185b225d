//! Pub/sub fan-out to live subscribers (§4.J): a single `"events"` topic,
//! fire-and-forget publish, per-subscriber session that opens with a
//! `connected` event and then forwards every subsequent publish as
//! `new_event`, polling with a 1-second timeout so a closed or lagged
//! receiver ends the session promptly. No replay, no per-subscriber
//! history, no guaranteed delivery beyond the session's lifetime.
use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event as SseEvent;
use chrono::Utc;
use futures::Stream;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::EventMessage;

const CHANNEL_CAPACITY: usize = 256;
const DISCONNECT_POLL: Duration = Duration::from_secs(1);

/// Single-topic broadcaster. Cheap to clone; every clone shares the same
/// underlying channel (§5: "single writer per event; multiple concurrent
/// subscribers").
#[derive(Clone)]
pub(crate) struct EventBroadcaster {
    sender: broadcast::Sender<EventMessage>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub(crate) fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Fire-and-forget: publishing with zero subscribers is not an error
    /// (§4.J, "Publishers are fire-and-forget").
    pub(crate) fn publish(&self, message: EventMessage) {
        if self.sender.send(message).is_err() {
            debug!("published event had no subscribers");
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<EventMessage> {
        self.sender.subscribe()
    }

    /// One subscriber session: `connected`, then `new_event` per message
    /// published after this call, then `error`+end on lag or close (§4.J).
    pub(crate) fn subscribe_stream(
        &self,
    ) -> impl Stream<Item = Result<SseEvent, Infallible>> + Send + 'static {
        futures::stream::unfold(SessionState::Connecting(self.subscribe()), next_frame)
    }
}

enum SessionState {
    Connecting(broadcast::Receiver<EventMessage>),
    Subscribed(broadcast::Receiver<EventMessage>),
    Done,
}

async fn next_frame(state: SessionState) -> Option<(Result<SseEvent, Infallible>, SessionState)> {
    match state {
        SessionState::Connecting(receiver) => {
            let payload = json!({ "message": "connected", "timestamp": Utc::now().to_rfc3339() });
            let event = SseEvent::default().event("connected").data(payload.to_string());
            Some((Ok(event), SessionState::Subscribed(receiver)))
        }

        SessionState::Subscribed(mut receiver) => loop {
            match timeout(DISCONNECT_POLL, receiver.recv()).await {
                Ok(Ok(message)) => {
                    let payload = serde_json::to_string(&message).unwrap_or_default();
                    let event = SseEvent::default().event("new_event").data(payload);
                    return Some((Ok(event), SessionState::Subscribed(receiver)));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "subscriber fell behind, ending session");
                    let payload = json!({ "error": format!("lagged, skipped {skipped} messages") });
                    let event = SseEvent::default().event("error").data(payload.to_string());
                    return Some((Ok(event), SessionState::Done));
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_elapsed) => continue,
            }
        },

        SessionState::Done => None,
    }
}
