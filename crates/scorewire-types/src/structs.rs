//! Core entity structs: matches, timeline events, change notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ChangeKind, MatchEventKind, MatchStatus, TeamSide};
use crate::ids::{MatchId, TeamRef};

/// Maximum value a single score can take. Anything above this is treated
/// as feed corruption at the validation boundary.
pub const MAX_SCORE: u8 = 99;

/// A score pair. Both values are bounded to `0..=MAX_SCORE` by the
/// validator before they ever reach this type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Score {
    /// Goals for the home side.
    pub home: u8,
    /// Goals for the away side.
    pub away: u8,
}

impl Score {
    /// Construct a score pair.
    pub const fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }
}

impl core::fmt::Display for Score {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// One immutable timeline entry within a match.
///
/// Events are never mutated or deleted once merged; re-delivered copies are
/// recognized by their [`signature`](MatchEvent::signature) and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MatchEvent {
    /// What happened.
    pub kind: MatchEventKind,
    /// Match minute (progress marker), including stoppage/extra time.
    pub minute: u16,
    /// Which side the event belongs to.
    pub side: TeamSide,
    /// Primary actor (scorer, carded player, player coming off).
    pub player: String,
    /// Secondary actor (assist, player coming on), when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assist: Option<String>,
    /// Free-text note from the source, length-capped by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MatchEvent {
    /// The dedup signature: two events with the same signature are the
    /// same real-world occurrence regardless of how often the source
    /// re-sends them.
    pub fn signature(&self) -> EventSignature {
        EventSignature {
            kind: self.kind,
            minute: self.minute,
            side: self.side,
            player: self.player.clone(),
        }
    }
}

/// The tuple used to recognize a previously-seen timeline event despite
/// re-delivery across poll cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature {
    /// Event kind.
    pub kind: MatchEventKind,
    /// Progress marker.
    pub minute: u16,
    /// Participant side.
    pub side: TeamSide,
    /// Primary actor.
    pub player: String,
}

/// The canonical record for one tracked match.
///
/// Created on the first successful upsert for an unseen external key (or
/// merged into an existing record when duplicate detection matches by
/// participants and kickoff). Mutated only by the merge/upsert path and
/// never deleted by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Match {
    /// Internal identifier.
    pub id: MatchId,
    /// Stable identifier assigned by the upstream source. Immutable.
    pub external_key: String,
    /// Home participant.
    pub home: TeamRef,
    /// Away participant.
    pub away: TeamRef,
    /// Scheduled start time (temporal anchor for duplicate detection).
    pub kickoff: DateTime<Utc>,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Elapsed match minute; monotonically non-decreasing while live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u16>,
    /// Current score.
    pub score: Score,
    /// Score recorded the first time the match was observed at half-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halftime_score: Option<Score>,
    /// Score recorded when the match finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulltime_score: Option<Score>,
    /// Timeline, ordered by minute then insertion order.
    pub events: Vec<MatchEvent>,
    /// Timestamp of the last successful merge.
    pub last_observed_at: DateTime<Utc>,
}

impl Match {
    /// Whether the timeline already contains an event with this signature.
    pub fn has_event(&self, signature: &EventSignature) -> bool {
        self.events.iter().any(|e| e.signature() == *signature)
    }
}

/// A discrete change produced by diffing previous against merged state.
///
/// Ephemeral: notifications are routed to broker topics and forgotten,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeNotification {
    /// Typed payload; its shape determines the [`ChangeKind`].
    pub payload: ChangePayload,
    /// When the change was detected.
    pub emitted_at: DateTime<Utc>,
}

impl ChangeNotification {
    /// Create a notification stamped with the current time.
    pub fn new(payload: ChangePayload) -> Self {
        Self {
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// The notification kind implied by the payload shape.
    pub const fn kind(&self) -> ChangeKind {
        match self.payload {
            ChangePayload::Score { .. } => ChangeKind::ScoreChanged,
            ChangePayload::Status { .. } => ChangeKind::StatusChanged,
            ChangePayload::Event { .. } => ChangeKind::EventAdded,
        }
    }

    /// The external key of the match this change belongs to.
    pub fn entity_key(&self) -> &str {
        match &self.payload {
            ChangePayload::Score { entity_key, .. }
            | ChangePayload::Status { entity_key, .. }
            | ChangePayload::Event { entity_key, .. } => entity_key,
        }
    }
}

/// Wire payload of a change notification.
///
/// Serialized untagged: the `kind` discriminator travels separately in the
/// [`BrokerEnvelope`], matching the broker wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum ChangePayload {
    /// The score pair changed.
    #[serde(rename_all = "camelCase")]
    Score {
        /// External key of the match.
        entity_key: String,
        /// The new score pair.
        score_pair: Score,
    },
    /// The lifecycle status changed.
    #[serde(rename_all = "camelCase")]
    Status {
        /// External key of the match.
        entity_key: String,
        /// The status before the change; `None` on cold start.
        previous_status: Option<MatchStatus>,
        /// The status after the change.
        status: MatchStatus,
    },
    /// A new timeline event appeared.
    #[serde(rename_all = "camelCase")]
    Event {
        /// External key of the match.
        entity_key: String,
        /// The newly merged event.
        event: MatchEvent,
    },
}

/// The message body published to the broker for every routed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BrokerEnvelope {
    /// Notification kind.
    pub kind: ChangeKind,
    /// The topic this copy was published to.
    pub topic: String,
    /// When the change was detected.
    pub emitted_at: DateTime<Utc>,
    /// Kind-specific payload, see [`ChangePayload`].
    pub payload: serde_json::Value,
}

impl BrokerEnvelope {
    /// Build the envelope for one (notification, topic) pair.
    pub fn for_topic(
        notification: &ChangeNotification,
        topic: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: notification.kind(),
            topic: topic.to_owned(),
            emitted_at: notification.emitted_at,
            payload: serde_json::to_value(&notification.payload)?,
        })
    }
}
