//! Topic routing and broker fan-out for change notifications.
//!
//! Every notification goes to the match topic. Score and event changes are
//! additionally mirrored to both team topics, and to the live firehose
//! while the match is in first or second half. Status changes always reach
//! the firehose so subscribers see kickoffs and final whistles.
//!
//! Publishes are awaited one at a time, which keeps per-topic order equal
//! to detection order. A failed publish is logged, counted and dropped;
//! the next poll cycle supersedes it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use scorewire_types::{topic, BrokerEnvelope, ChangeNotification, ChangePayload, Match};

use crate::error::PublishError;
use crate::metrics::PublishCounters;

/// Topics one notification is routed to.
pub fn route(record: &Match, notification: &ChangeNotification) -> Vec<String> {
    let mut topics = vec![topic::match_topic(notification.entity_key())];
    match notification.payload {
        ChangePayload::Score { .. } | ChangePayload::Event { .. } => {
            topics.push(topic::team_topic(&record.home));
            topics.push(topic::team_topic(&record.away));
            if record.status.is_live() {
                topics.push(topic::LIVE_ALL.to_owned());
            }
        }
        ChangePayload::Status { .. } => {
            topics.push(topic::LIVE_ALL.to_owned());
        }
    }
    topics
}

/// Sink for detected changes. The pipeline is generic over this so tests
/// can capture notifications without a broker.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    /// Fan one cycle's notifications out to their topics, in order.
    async fn publish_changes(&self, record: &Match, changes: &[ChangeNotification]);
}

/// The NATS-backed publisher.
pub struct NatsPublisher {
    client: async_nats::Client,
    counters: Arc<PublishCounters>,
}

impl NatsPublisher {
    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Connect`] when the initial connection fails.
    pub async fn connect(url: &str, counters: Arc<PublishCounters>) -> Result<Self, PublishError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;
        Ok(Self { client, counters })
    }

    /// Wrap an already-connected client.
    pub fn with_client(client: async_nats::Client, counters: Arc<PublishCounters>) -> Self {
        Self { client, counters }
    }

    async fn publish_one(&self, notification: &ChangeNotification, subject: String) {
        let envelope = match BrokerEnvelope::for_topic(notification, &subject) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%subject, %error, "envelope serialization failed, dropped");
                self.counters.record_dropped();
                return;
            }
        };
        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => body,
            Err(error) => {
                warn!(%subject, %error, "envelope serialization failed, dropped");
                self.counters.record_dropped();
                return;
            }
        };
        match self.client.publish(subject.clone(), body.into()).await {
            Ok(()) => {
                self.counters.record_published();
                debug!(%subject, kind = ?envelope.kind, "change published");
            }
            Err(error) => {
                warn!(%subject, %error, "publish failed, dropped");
                self.counters.record_dropped();
            }
        }
    }
}

#[async_trait]
impl ChangePublisher for NatsPublisher {
    async fn publish_changes(&self, record: &Match, changes: &[ChangeNotification]) {
        for notification in changes {
            for subject in route(record, notification) {
                self.publish_one(notification, subject).await;
            }
        }
    }
}
