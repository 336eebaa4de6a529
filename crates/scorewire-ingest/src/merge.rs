//! Merging a validated snapshot into the stored record.
//!
//! The merge is a pure function from `(previous record, snapshot)` to a new
//! record plus the facts the diff needs: which timeline events are genuinely
//! new, and which parts of the snapshot were refused. Refusals are anomalies,
//! not errors; the rest of the snapshot still lands.
//!
//! Rules:
//!
//! - the external key and internal id never change once assigned;
//! - timeline events are append-only, deduplicated by signature, including
//!   duplicates within a single snapshot;
//! - a status transition the lifecycle machine forbids is dropped and the
//!   stored status retained;
//! - the minute never regresses while the match is in play;
//! - the half-time score is captured the first time the match is observed
//!   at intermission, the full-time score when it finishes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use scorewire_types::{Match, MatchEvent, MatchId, MatchStatus};

use crate::validate::ValidatedSnapshot;

/// A part of an otherwise-accepted snapshot that the merge refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAnomaly {
    /// The snapshot reported a status the lifecycle machine forbids from
    /// the stored status. The stored status is retained.
    InvalidTransition {
        /// Stored status.
        from: MatchStatus,
        /// Refused status.
        to: MatchStatus,
    },
    /// The snapshot reported an earlier minute than already stored while
    /// the match is in play. The stored minute is retained.
    MinuteRegression {
        /// Stored minute.
        previous: u16,
        /// Refused minute.
        observed: u16,
    },
}

/// Result of merging one snapshot.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The record after the merge, ready to upsert.
    pub record: Match,
    /// Timeline events that were not present before this merge, in the
    /// order they were appended.
    pub new_events: Vec<MatchEvent>,
    /// Parts of the snapshot the merge refused.
    pub anomalies: Vec<MergeAnomaly>,
}

/// Merge a validated snapshot into the previous record, or mint a new
/// record when no previous one exists.
pub fn merge_snapshot(
    previous: Option<&Match>,
    snapshot: &ValidatedSnapshot,
    observed_at: DateTime<Utc>,
) -> MergeOutcome {
    match previous {
        None => first_observation(snapshot, observed_at),
        Some(prev) => merge_into(prev, snapshot, observed_at),
    }
}

fn first_observation(snapshot: &ValidatedSnapshot, observed_at: DateTime<Utc>) -> MergeOutcome {
    let events = dedup_events(snapshot.events.iter().cloned(), &mut HashSet::new());
    let status = snapshot.status;
    let record = Match {
        id: MatchId::new(),
        external_key: snapshot.external_key.clone(),
        home: snapshot.home.clone(),
        away: snapshot.away.clone(),
        kickoff: snapshot.kickoff,
        status,
        minute: snapshot.minute,
        score: snapshot.score,
        halftime_score: (status == MatchStatus::Intermission).then_some(snapshot.score),
        fulltime_score: (status == MatchStatus::Finished).then_some(snapshot.score),
        events: events.clone(),
        last_observed_at: observed_at,
    };
    MergeOutcome {
        record,
        new_events: events,
        anomalies: Vec::new(),
    }
}

fn merge_into(
    prev: &Match,
    snapshot: &ValidatedSnapshot,
    observed_at: DateTime<Utc>,
) -> MergeOutcome {
    let mut anomalies = Vec::new();

    let status = if prev.status.can_transition_to(snapshot.status) {
        snapshot.status
    } else {
        warn!(
            external_key = prev.external_key,
            from = %prev.status,
            to = %snapshot.status,
            "invalid status transition dropped"
        );
        anomalies.push(MergeAnomaly::InvalidTransition {
            from: prev.status,
            to: snapshot.status,
        });
        prev.status
    };

    let minute = merged_minute(prev, snapshot, status, &mut anomalies);

    let mut seen: HashSet<_> = prev.events.iter().map(MatchEvent::signature).collect();
    let new_events = dedup_events(snapshot.events.iter().cloned(), &mut seen);

    let mut events = prev.events.clone();
    events.extend(new_events.iter().cloned());
    // Stable: prior events keep their order, newcomers slot in by minute.
    events.sort_by_key(|e| e.minute);

    let record = Match {
        id: prev.id,
        external_key: prev.external_key.clone(),
        home: prev.home.clone(),
        away: prev.away.clone(),
        kickoff: prev.kickoff,
        status,
        minute,
        score: snapshot.score,
        halftime_score: prev
            .halftime_score
            .or((status == MatchStatus::Intermission).then_some(snapshot.score)),
        fulltime_score: prev
            .fulltime_score
            .or((status == MatchStatus::Finished).then_some(snapshot.score)),
        events,
        last_observed_at: observed_at,
    };

    MergeOutcome {
        record,
        new_events,
        anomalies,
    }
}

/// The minute after the merge. Regressions while in play are refused;
/// outside play the reported minute is taken as-is (or cleared).
fn merged_minute(
    prev: &Match,
    snapshot: &ValidatedSnapshot,
    status: MatchStatus,
    anomalies: &mut Vec<MergeAnomaly>,
) -> Option<u16> {
    match (prev.minute, snapshot.minute) {
        (Some(previous), Some(observed)) if status.is_in_play() && observed < previous => {
            warn!(
                external_key = prev.external_key,
                previous, observed, "minute regression dropped"
            );
            anomalies.push(MergeAnomaly::MinuteRegression { previous, observed });
            Some(previous)
        }
        (_, Some(observed)) => Some(observed),
        (kept, None) => kept,
    }
}

fn dedup_events(
    incoming: impl Iterator<Item = MatchEvent>,
    seen: &mut HashSet<scorewire_types::EventSignature>,
) -> Vec<MatchEvent> {
    let mut fresh = Vec::new();
    for event in incoming {
        if seen.insert(event.signature()) {
            fresh.push(event);
        }
    }
    fresh
}
