//! Broker-to-client bridge.
//!
//! One background task holds the gateway's broker connection, subscribes
//! to the three topic wildcards and relays every envelope to the
//! in-process [`SubscriptionBroker`](crate::broker::SubscriptionBroker).
//! Client WebSocket handlers never talk to the broker directly.
//!
//! A lost connection is retried forever with exponential backoff and
//! jitter. While disconnected, clients stay connected and simply receive
//! nothing; cycles missed during the gap are not replayed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use scorewire_types::{topic, BrokerEnvelope, ServerMessage};

use crate::broker::SubscriptionBroker;

/// Starting delay between reconnect attempts.
const BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// Ceiling for the reconnect delay.
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Shared view of the bridge's health, served by the status endpoint.
#[derive(Debug, Default)]
pub struct BridgeState {
    connected: AtomicBool,
    relayed: AtomicU64,
    undecodable: AtomicU64,
}

impl BridgeState {
    /// Fresh disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A point-in-time copy for the status endpoint.
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            connected: self.connected.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`BridgeState`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BridgeSnapshot {
    /// Whether the broker connection is currently up.
    pub connected: bool,
    /// Envelopes relayed to the subscription fabric.
    pub relayed: u64,
    /// Broker messages that were not valid envelopes.
    pub undecodable: u64,
}

/// Run the bridge until `shutdown` flips to `true`.
pub async fn run_bridge(
    nats_url: String,
    broker: Arc<SubscriptionBroker>,
    state: Arc<BridgeState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = BACKOFF_INITIAL;
    loop {
        if *shutdown.borrow() {
            return;
        }

        match relay_session(&nats_url, &broker, &state, &mut shutdown).await {
            SessionEnd::Shutdown => return,
            SessionEnd::ConnectFailed(error) => {
                warn!(%error, delay = ?backoff, "broker connection failed, retrying");
            }
            SessionEnd::StreamEnded => {
                warn!(delay = ?backoff, "broker connection lost, retrying");
            }
        }
        state.connected.store(false, Ordering::Relaxed);

        let jitter = Duration::from_millis(rand::rng().random_range(0..=250));
        tokio::select! {
            () = tokio::time::sleep(backoff.saturating_add(jitter)) => {}
            _ = shutdown.changed() => return,
        }
        backoff = next_backoff(backoff);
    }
}

/// Doubles up to the ceiling.
fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(BACKOFF_MAX)
}

enum SessionEnd {
    Shutdown,
    ConnectFailed(String),
    StreamEnded,
}

async fn relay_session(
    nats_url: &str,
    broker: &SubscriptionBroker,
    state: &BridgeState,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let client = match async_nats::connect(nats_url).await {
        Ok(client) => client,
        Err(error) => return SessionEnd::ConnectFailed(error.to_string()),
    };

    let mut subscribers = Vec::with_capacity(3);
    for wildcard in [topic::MATCH_WILDCARD, topic::TEAM_WILDCARD, topic::LIVE_WILDCARD] {
        match client.subscribe(wildcard.to_owned()).await {
            Ok(subscriber) => subscribers.push(subscriber),
            Err(error) => return SessionEnd::ConnectFailed(error.to_string()),
        }
    }
    let mut stream = futures::stream::select_all(subscribers);

    state.connected.store(true, Ordering::Relaxed);
    info!(url = nats_url, "bridge connected to broker");

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else {
                    return SessionEnd::StreamEnded;
                };
                relay_message(broker, state, &message.subject, &message.payload);
            }
            _ = shutdown.changed() => {
                return SessionEnd::Shutdown;
            }
        }
    }
}

fn relay_message(broker: &SubscriptionBroker, state: &BridgeState, subject: &str, payload: &[u8]) {
    let envelope: BrokerEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(subject, %error, "undecodable broker message dropped");
            state.undecodable.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    let delivered = broker.broadcast(subject, &ServerMessage::from_envelope(envelope));
    state.relayed.fetch_add(1, Ordering::Relaxed);
    debug!(subject, delivered, "envelope relayed");
}
