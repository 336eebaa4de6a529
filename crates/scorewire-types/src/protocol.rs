//! Client-facing real-time protocol messages.
//!
//! Exchanged as JSON text frames over the gateway's persistent WebSocket
//! connection. Client messages are tagged by `action`, server messages by
//! `type`. Unknown actions produce an [`ErrorCode::UnknownAction`] error
//! message; the connection stays open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ChangeKind;
use crate::structs::BrokerEnvelope;

/// A message sent by a client over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Subscribe the connection to the listed topics.
    Subscribe {
        /// Topic keys to add.
        topics: Vec<String>,
    },
    /// Unsubscribe the connection from the listed topics.
    Unsubscribe {
        /// Topic keys to remove.
        topics: Vec<String>,
    },
    /// Application-level liveness probe; answered with `pong`.
    Ping,
}

/// A message sent by the server over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Acknowledges a subscribe request.
    Subscribed {
        /// Topics that were added.
        topics: Vec<String>,
    },
    /// Acknowledges an unsubscribe request.
    Unsubscribed {
        /// Topics that were removed.
        topics: Vec<String>,
    },
    /// Reply to a client `ping`.
    Pong,
    /// A score change on a subscribed topic.
    #[serde(rename_all = "camelCase")]
    EntityUpdate {
        /// Topic the change was published to.
        topic: String,
        /// When the change was detected.
        emitted_at: DateTime<Utc>,
        /// Kind-specific payload.
        payload: serde_json::Value,
    },
    /// A status transition on a subscribed topic.
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        /// Topic the change was published to.
        topic: String,
        /// When the change was detected.
        emitted_at: DateTime<Utc>,
        /// Kind-specific payload.
        payload: serde_json::Value,
    },
    /// A new timeline event on a subscribed topic.
    #[serde(rename_all = "camelCase")]
    EventAdded {
        /// Topic the change was published to.
        topic: String,
        /// When the change was detected.
        emitted_at: DateTime<Utc>,
        /// Kind-specific payload.
        payload: serde_json::Value,
    },
    /// A protocol-level error. Does not close the connection.
    Error {
        /// Machine-readable error code.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Translate a broker envelope into the corresponding update message.
    pub fn from_envelope(envelope: BrokerEnvelope) -> Self {
        match envelope.kind {
            ChangeKind::ScoreChanged => Self::EntityUpdate {
                topic: envelope.topic,
                emitted_at: envelope.emitted_at,
                payload: envelope.payload,
            },
            ChangeKind::StatusChanged => Self::StatusUpdate {
                topic: envelope.topic,
                emitted_at: envelope.emitted_at,
                payload: envelope.payload,
            },
            ChangeKind::EventAdded => Self::EventAdded {
                topic: envelope.topic,
                emitted_at: envelope.emitted_at,
                payload: envelope.payload,
            },
        }
    }

    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

/// Machine-readable error codes for [`ServerMessage::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorCode {
    /// The `action` field did not name a known action.
    UnknownAction,
    /// The frame was not a valid protocol message.
    BadMessage,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::structs::{ChangeNotification, ChangePayload, Score};

    #[test]
    fn client_subscribe_wire_shape() {
        let json = r#"{"action":"subscribe","topics":["match.m1","live.all"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                topics: vec!["match.m1".to_owned(), "live.all".to_owned()],
            }
        );
    }

    #[test]
    fn client_ping_wire_shape() {
        let msg: ClientMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn unknown_action_fails_decode() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"action":"shout","topics":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_error_wire_shape() {
        let msg = ServerMessage::error(ErrorCode::UnknownAction, "no such action");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "UNKNOWN_ACTION");
    }

    #[test]
    fn envelope_maps_to_update_variants() {
        let notification = ChangeNotification::new(ChangePayload::Score {
            entity_key: "m1".to_owned(),
            score_pair: Score::new(1, 0),
        });
        let envelope = BrokerEnvelope::for_topic(&notification, "match.m1").unwrap();
        let msg = ServerMessage::from_envelope(envelope);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "entity_update");
        assert_eq!(value["topic"], "match.m1");
        assert!(value.get("emittedAt").is_some());
    }
}
