//! Client-facing gateway for the scorewire live-score service.
//!
//! Serves the WebSocket feed clients subscribe on, and runs the bridge
//! task that relays broker envelopes into the in-process subscription
//! fabric. The gateway is stateless apart from live connections: it can
//! be restarted at any time and clients simply resubscribe.
//!
//! # Modules
//!
//! - [`broker`] -- the in-process subscription fabric
//! - [`ws`] -- the client feed WebSocket handler
//! - [`bridge`] -- the broker-to-client relay task
//! - [`router`] -- route assembly
//! - [`handlers`] -- health and status endpoints
//! - [`server`] -- bind-and-serve lifecycle
//! - [`state`] -- shared Axum state

pub mod bridge;
pub mod broker;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use bridge::{run_bridge, BridgeState};
pub use broker::SubscriptionBroker;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::{AppState, HeartbeatConfig};
