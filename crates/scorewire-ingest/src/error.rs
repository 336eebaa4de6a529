//! Error types for the ingestion side.
//!
//! The taxonomy mirrors the blast radius of each failure:
//!
//! - [`ValidationError`] -- one snapshot is skipped; the next poll cycle
//!   supplies a fresh one, so there is nothing to retry.
//! - [`PipelineError`] -- one entity's cycle is aborted (store failure);
//!   the scheduler retries on a later cycle with backoff.
//! - [`PublishError`] -- broker connection setup failed. Individual publish
//!   failures are *not* errors: they are counted and dropped, because a
//!   stale live-score delta is worse re-sent late than superseded by the
//!   next cycle.
//! - [`FetchError`] -- an upstream fetch failed; handled exactly like a
//!   validation failure (log, skip, next cycle).
//!
//! Nothing here is ever process-fatal.

use scorewire_store::StoreError;

/// A structural violation in a raw snapshot.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The external key is not a valid topic token.
    #[error("invalid external key: {0:?}")]
    InvalidKey(String),

    /// A team name produced no usable topic token.
    #[error("invalid team name: {0:?}")]
    InvalidTeam(String),

    /// A score value fell outside `0..=99`.
    #[error("{field} out of range: {value}")]
    ScoreOutOfRange {
        /// Which score field.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// The status string is outside the known vocabulary.
    #[error("unknown status: {0:?}")]
    UnknownStatus(String),

    /// The match minute fell outside `0..=200`.
    #[error("minute out of range: {0}")]
    MinuteOutOfRange(i64),

    /// A timeline event was missing a required field.
    #[error("event {index}: missing field {field}")]
    EventMissingField {
        /// Index of the event in the raw snapshot.
        index: usize,
        /// Which field.
        field: &'static str,
    },

    /// A timeline event carried an unknown kind.
    #[error("event {index}: unknown kind {kind:?}")]
    UnknownEventKind {
        /// Index of the event in the raw snapshot.
        index: usize,
        /// The offending kind string.
        kind: String,
    },

    /// A timeline event carried an unknown side.
    #[error("event {index}: unknown side {side:?}")]
    UnknownEventSide {
        /// Index of the event in the raw snapshot.
        index: usize,
        /// The offending side string.
        side: String,
    },

    /// A timeline event's minute fell outside `0..=200`.
    #[error("event {index}: minute out of range: {minute}")]
    EventMinuteOutOfRange {
        /// Index of the event in the raw snapshot.
        index: usize,
        /// The offending minute.
        minute: i64,
    },

    /// A timeline event had an empty actor after trimming.
    #[error("event {index}: empty player")]
    EmptyPlayer {
        /// Index of the event in the raw snapshot.
        index: usize,
    },
}

/// A failure that aborts the current entity's pipeline cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The backing store was unavailable mid-cycle.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A failure establishing the broker connection.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Connecting to the broker failed.
    #[error("broker connection failed: {0}")]
    Connect(String),
}

/// A failure fetching a raw snapshot from the upstream source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request failed or the body was not a snapshot.
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("upstream returned HTTP {0}")]
    Status(u16),
}
