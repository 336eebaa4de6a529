//! Change detection between the previous record and the merged one.
//!
//! The diff runs against the record read at the start of the cycle, so a
//! process restart does not replay history for entities already persisted.
//! For a genuinely new entity the full current state is announced: a status
//! notification with no previous status, then one event notification per
//! timeline entry.
//!
//! Notification order within a cycle is fixed: score, then status, then
//! events in timeline order.

use scorewire_types::{ChangeNotification, ChangePayload, Match, MatchEvent};

/// Compute the notifications for one completed merge.
///
/// `new_events` are the events the merge actually appended; for an
/// unchanged snapshot the result is empty and nothing is published.
pub fn detect_changes(
    previous: Option<&Match>,
    current: &Match,
    new_events: &[MatchEvent],
) -> Vec<ChangeNotification> {
    let Some(prev) = previous else {
        return first_sight(current);
    };

    let mut changes = Vec::new();
    if prev.score != current.score {
        changes.push(ChangeNotification::new(ChangePayload::Score {
            entity_key: current.external_key.clone(),
            score_pair: current.score,
        }));
    }
    if prev.status != current.status {
        changes.push(ChangeNotification::new(ChangePayload::Status {
            entity_key: current.external_key.clone(),
            previous_status: Some(prev.status),
            status: current.status,
        }));
    }
    for event in new_events {
        changes.push(ChangeNotification::new(ChangePayload::Event {
            entity_key: current.external_key.clone(),
            event: event.clone(),
        }));
    }
    changes
}

fn first_sight(current: &Match) -> Vec<ChangeNotification> {
    let mut changes = vec![ChangeNotification::new(ChangePayload::Status {
        entity_key: current.external_key.clone(),
        previous_status: None,
        status: current.status,
    })];
    for event in &current.events {
        changes.push(ChangeNotification::new(ChangePayload::Event {
            entity_key: current.external_key.clone(),
            event: event.clone(),
        }));
    }
    changes
}
