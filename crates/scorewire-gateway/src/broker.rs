//! In-process subscription fabric.
//!
//! The broker keeps a dual index: topic to subscribed connections, and
//! connection to its subscribed topics plus a bounded outbox. Broadcasting
//! a message walks the exact topic's subscriber set only; connections
//! subscribed to other topics are never touched.
//!
//! Delivery uses `try_send` into the per-connection outbox under the
//! index's read lock; only structural changes (subscribe, disconnect,
//! reaping a dead connection) take the write lock. A full or closed
//! outbox marks the connection dead and removes it on the spot, so one
//! slow consumer cannot stall the rest. Liveness is tracked by a
//! last-seen timestamp refreshed on every inbound client frame; a periodic
//! sweep drops connections that have gone silent.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use scorewire_types::{topic, ConnectionId, ServerMessage};

/// Upper bound on distinct topics one connection may hold.
pub const MAX_TOPICS_PER_CONNECTION: usize = 128;

struct ConnectionEntry {
    outbox: mpsc::Sender<ServerMessage>,
    topics: HashSet<String>,
    last_seen: Instant,
}

#[derive(Default)]
struct Index {
    by_topic: HashMap<String, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl Index {
    fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let Some(entry) = self.connections.remove(&id) else {
            return false;
        };
        for topic_key in &entry.topics {
            if let Some(subscribers) = self.by_topic.get_mut(topic_key) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    self.by_topic.remove(topic_key);
                }
            }
        }
        true
    }
}

/// Routes server messages to the connections subscribed to their topic.
pub struct SubscriptionBroker {
    index: RwLock<Index>,
    outbox_capacity: usize,
    idle_timeout: Duration,
}

impl SubscriptionBroker {
    /// Create a broker.
    ///
    /// `outbox_capacity` bounds each connection's pending messages;
    /// `idle_timeout` is how long a connection may stay silent before the
    /// sweep drops it.
    pub fn new(outbox_capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            outbox_capacity,
            idle_timeout,
        }
    }

    /// Register a new connection and hand back its outbox receiver.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.outbox_capacity);
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.connections.insert(
            id,
            ConnectionEntry {
                outbox: tx,
                topics: HashSet::new(),
                last_seen: Instant::now(),
            },
        );
        debug!(connection = %id, "connection registered");
        (id, rx)
    }

    /// Subscribe a connection to topics. Returns the topics actually
    /// added; malformed keys and anything beyond the per-connection cap
    /// are dropped silently.
    pub fn subscribe(&self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = index.connections.get_mut(&id) else {
            return Vec::new();
        };
        let mut added = Vec::new();
        for topic_key in topics {
            if !is_subscribable(topic_key) || entry.topics.len() >= MAX_TOPICS_PER_CONNECTION {
                continue;
            }
            if entry.topics.insert(topic_key.clone()) {
                added.push(topic_key.clone());
            }
        }
        for topic_key in &added {
            index
                .by_topic
                .entry(topic_key.clone())
                .or_default()
                .insert(id);
        }
        added
    }

    /// Unsubscribe a connection from topics. Returns the topics removed.
    pub fn unsubscribe(&self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = index.connections.get_mut(&id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        for topic_key in topics {
            if entry.topics.remove(topic_key) {
                removed.push(topic_key.clone());
            }
        }
        for topic_key in &removed {
            if let Some(subscribers) = index.by_topic.get_mut(topic_key) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    index.by_topic.remove(topic_key);
                }
            }
        }
        removed
    }

    /// Refresh a connection's liveness timestamp.
    pub fn touch(&self, id: ConnectionId) {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = index.connections.get_mut(&id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Deliver a message to every connection subscribed to `topic_key`.
    ///
    /// Returns how many outboxes accepted the message. Connections whose
    /// outbox is full or closed are removed.
    ///
    /// Delivery runs under the shared read lock, so broadcasts on
    /// different topics proceed in parallel; the write lock is taken only
    /// when a dead connection has to come out of the index.
    pub fn broadcast(&self, topic_key: &str, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            let Some(subscribers) = index.by_topic.get(topic_key) else {
                return 0;
            };
            for &id in subscribers {
                let Some(entry) = index.connections.get(&id) else {
                    dead.push(id);
                    continue;
                };
                match entry.outbox.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(
                        mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_),
                    ) => dead.push(id),
                }
            }
        }
        if !dead.is_empty() {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            for id in dead {
                if index.remove_connection(id) {
                    info!(connection = %id, "slow or closed consumer dropped");
                }
            }
        }
        delivered
    }

    /// Remove a connection and all its subscriptions.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if index.remove_connection(id) {
            debug!(connection = %id, "connection removed");
        }
    }

    /// Drop connections that have been silent past the idle timeout.
    /// Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now()
            .checked_sub(self.idle_timeout)
            .unwrap_or_else(Instant::now);
        let stale: Vec<ConnectionId> = index
            .connections
            .iter()
            .filter(|(_, entry)| entry.last_seen < deadline)
            .map(|(&id, _)| id)
            .collect();
        let count = stale.len();
        for id in stale {
            index.remove_connection(id);
            info!(connection = %id, "idle connection swept");
        }
        count
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .len()
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_topic
            .len()
    }
}

/// Whether a client-supplied key names a topic this service publishes.
fn is_subscribable(topic_key: &str) -> bool {
    if topic_key == topic::LIVE_ALL {
        return true;
    }
    topic_key
        .strip_prefix("match.")
        .or_else(|| topic_key.strip_prefix("team."))
        .is_some_and(topic::is_valid_token)
}
