//! REST handlers for health and status.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::bridge::BridgeSnapshot;
use crate::state::AppState;

/// Status document served by `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Connected WebSocket clients.
    pub connections: usize,
    /// Topics with at least one subscriber.
    pub topics: usize,
    /// Bridge health.
    pub bridge: BridgeSnapshot,
}

/// Liveness probe.
///
/// # Route
///
/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

/// Gateway status snapshot.
///
/// # Route
///
/// `GET /api/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connections: state.broker.connection_count(),
        topics: state.broker.topic_count(),
        bridge: state.bridge.snapshot(),
    })
}
