//! WebSocket handler for the client feed.
//!
//! Clients connect to `GET /ws`, manage their subscriptions with
//! `subscribe`/`unsubscribe`/`ping` frames and receive update messages for
//! their topics. Malformed frames produce an error message; the connection
//! stays open either way. The server pings on the heartbeat interval and
//! closes connections whose ping goes unanswered past the timeout; the
//! broker can also drop a connection for falling behind.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use scorewire_types::{ClientMessage, ConnectionId, ErrorCode, ServerMessage};

use crate::state::AppState;

/// Upgrade an HTTP request to the client feed connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_feed(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (id, mut outbox) = state.broker.register();
    debug!(connection = %id, "feed client connected");

    let mut heartbeat = tokio::time::interval(state.heartbeat.interval);
    // The first tick fires immediately; skip it.
    heartbeat.tick().await;
    let mut liveness = Liveness::new(state.heartbeat.timeout);

    loop {
        tokio::select! {
            // A routed update or reply for this connection.
            outgoing = outbox.recv() => {
                let Some(message) = outgoing else {
                    // The broker dropped this connection (slow or swept).
                    debug!(connection = %id, "outbox closed, disconnecting client");
                    break;
                };
                if send_json(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            // A frame from the client.
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        liveness.touch();
                        let reply = handle_frame(&state, id, text.as_str());
                        if send_json(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        liveness.touch();
                        state.broker.touch(id);
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        liveness.touch();
                        state.broker.touch(id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection = %id, "feed client disconnected");
                        break;
                    }
                    Some(Err(error)) => {
                        debug!(connection = %id, %error, "socket error");
                        break;
                    }
                    _ => {
                        // Binary frames are ignored.
                    }
                }
            }
            // Server-initiated heartbeat.
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                liveness.ping_sent();
            }
            // The last ping went unanswered past the timeout.
            () = liveness_expired(liveness.deadline()) => {
                debug!(connection = %id, "heartbeat missed, disconnecting client");
                break;
            }
        }
    }

    state.broker.disconnect(id);
}

/// Liveness state for one connection around server-initiated pings.
///
/// Sending a ping arms the cut-off deadline at `timeout` from that ping;
/// any inbound frame disarms it. The deadline is anchored to the first
/// unanswered ping, not to a later heartbeat tick, so a silent client is
/// cut as soon as the timeout elapses.
#[derive(Debug)]
struct Liveness {
    timeout: Duration,
    awaiting_since: Option<Instant>,
}

impl Liveness {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            awaiting_since: None,
        }
    }

    /// Any inbound frame counts as life.
    fn touch(&mut self) {
        self.awaiting_since = None;
    }

    /// Arm the deadline unless a previous ping is already outstanding.
    fn ping_sent(&mut self) {
        if self.awaiting_since.is_none() {
            self.awaiting_since = Some(Instant::now());
        }
    }

    /// When the connection is cut if the client stays silent.
    fn deadline(&self) -> Option<Instant> {
        self.awaiting_since.map(|since| since + self.timeout)
    }
}

/// Resolves once `deadline` passes; pends forever while no ping is
/// outstanding.
async fn liveness_expired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Decode and apply one text frame, producing the direct reply.
fn handle_frame(state: &AppState, id: ConnectionId, text: &str) -> ServerMessage {
    // Decode in two steps so a known-JSON frame with an unknown action is
    // distinguishable from a frame that is not a protocol message at all.
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            return ServerMessage::error(ErrorCode::BadMessage, "frame is not valid JSON");
        }
    };
    let message: ClientMessage = match serde_json::from_value(value.clone()) {
        Ok(message) => message,
        Err(_) if value.get("action").is_some() => {
            return ServerMessage::error(ErrorCode::UnknownAction, "unknown action");
        }
        Err(_) => {
            return ServerMessage::error(ErrorCode::BadMessage, "malformed protocol message");
        }
    };

    state.broker.touch(id);
    match message {
        ClientMessage::Subscribe { topics } => ServerMessage::Subscribed {
            topics: state.broker.subscribe(id, &topics),
        },
        ClientMessage::Unsubscribe { topics } => ServerMessage::Unsubscribed {
            topics: state.broker.unsubscribe(id, &topics),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(error) => {
            debug!(%error, "reply serialization failed");
            return Ok(());
        }
    };
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::broker::SubscriptionBroker;
    use crate::state::AppState;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(SubscriptionBroker::new(
            16,
            Duration::from_secs(60),
        ))))
    }

    #[test]
    fn subscribe_frame_acknowledged() {
        let state = state();
        let (id, _rx) = state.broker.register();
        let reply = handle_frame(
            &state,
            id,
            r#"{"action":"subscribe","topics":["match.m1","bogus topic"]}"#,
        );
        assert_eq!(
            reply,
            ServerMessage::Subscribed {
                topics: vec!["match.m1".to_owned()],
            }
        );
    }

    #[test]
    fn ping_frame_answered_with_pong() {
        let state = state();
        let (id, _rx) = state.broker.register();
        assert_eq!(
            handle_frame(&state, id, r#"{"action":"ping"}"#),
            ServerMessage::Pong
        );
    }

    #[test]
    fn unknown_action_keeps_connection_and_names_code() {
        let state = state();
        let (id, _rx) = state.broker.register();
        let reply = handle_frame(&state, id, r#"{"action":"shout","topics":[]}"#);
        assert!(matches!(
            reply,
            ServerMessage::Error {
                code: ErrorCode::UnknownAction,
                ..
            }
        ));
    }

    #[test]
    fn non_json_frame_is_bad_message() {
        let state = state();
        let (id, _rx) = state.broker.register();
        let reply = handle_frame(&state, id, "not json at all");
        assert!(matches!(
            reply,
            ServerMessage::Error {
                code: ErrorCode::BadMessage,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_is_cut_one_timeout_after_the_ping() {
        let mut liveness = Liveness::new(Duration::from_secs(10));
        liveness.ping_sent();
        let deadline = liveness.deadline().unwrap();
        assert_eq!(deadline, Instant::now() + Duration::from_secs(10));

        liveness_expired(liveness.deadline()).await;
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn answered_ping_disarms_the_cutoff() {
        let mut liveness = Liveness::new(Duration::from_secs(10));
        liveness.ping_sent();
        liveness.touch();
        assert!(liveness.deadline().is_none());

        // With no ping outstanding the expiry never fires.
        let expired = tokio::time::timeout(
            Duration::from_secs(300),
            liveness_expired(liveness.deadline()),
        )
        .await;
        assert!(expired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn later_ticks_do_not_extend_the_deadline() {
        let mut liveness = Liveness::new(Duration::from_secs(10));
        liveness.ping_sent();
        let first = liveness.deadline().unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        liveness.ping_sent();
        assert_eq!(liveness.deadline().unwrap(), first);
    }
}
