//! Shared type definitions for the scorewire live-score service.
//!
//! This crate is the single source of truth for all types used across the
//! scorewire workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the live dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers and the opaque team reference
//! - [`enums`] -- Status vocabulary (with its state machine), event kinds,
//!   sides, change kinds
//! - [`structs`] -- Core entity structs (match, timeline event, change
//!   notification, broker envelope)
//! - [`protocol`] -- Client-facing WebSocket protocol messages
//! - [`topic`] -- Topic key construction and the wildcard space

pub mod enums;
pub mod ids;
pub mod protocol;
pub mod structs;
pub mod topic;

// Re-export all public types at crate root for convenience.
pub use enums::{ChangeKind, MatchEventKind, MatchStatus, TeamSide};
pub use ids::{ConnectionId, MatchId, TeamRef};
pub use protocol::{ClientMessage, ErrorCode, ServerMessage};
pub use structs::{
    BrokerEnvelope, ChangeNotification, ChangePayload, EventSignature, Match, MatchEvent, Score,
    MAX_SCORE,
};
