//! Shared application state for the gateway server.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::BridgeState;
use crate::broker::SubscriptionBroker;

/// Server-initiated heartbeat parameters for client connections.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// How often the server pings each client.
    pub interval: Duration,
    /// How long after a ping the client has to show life before the
    /// connection is closed.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Holds
/// the in-process subscription fabric and the bridge health view.
#[derive(Clone)]
pub struct AppState {
    /// The subscription fabric shared with the bridge task.
    pub broker: Arc<SubscriptionBroker>,
    /// Bridge health, served by the status endpoint.
    pub bridge: Arc<BridgeState>,
    /// Heartbeat parameters applied to every connection.
    pub heartbeat: HeartbeatConfig,
}

impl AppState {
    /// Create state around an existing broker with a fresh bridge view
    /// and default heartbeat parameters.
    pub fn new(broker: Arc<SubscriptionBroker>) -> Self {
        Self {
            broker,
            bridge: Arc::new(BridgeState::new()),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Override the heartbeat parameters.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}
