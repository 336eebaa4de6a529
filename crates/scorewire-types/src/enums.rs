//! Enumeration types for the scorewire domain.
//!
//! [`MatchStatus`] carries the status state machine: the set of transitions
//! a merge is allowed to accept. Upstream sources spell statuses a dozen
//! different ways ("FT", "Half-time", "in play"...), so the canonical
//! vocabulary lives here together with the normalization table used at the
//! validation boundary.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of a tracked match.
///
/// Transitions are monotonic along
/// `Scheduled -> Live -> {Intermission <-> Live} -> Finished`.
/// [`Postponed`](Self::Postponed), [`Cancelled`](Self::Cancelled) and
/// [`Abandoned`](Self::Abandoned) are reachable from any pre-Finished
/// state and are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MatchStatus {
    /// Not yet started.
    Scheduled,
    /// In play.
    Live,
    /// Half-time or another scheduled break in play.
    Intermission,
    /// Completed normally.
    Finished,
    /// Postponed before completion.
    Postponed,
    /// Cancelled before completion.
    Cancelled,
    /// Started but abandoned before completion.
    Abandoned,
}

impl MatchStatus {
    /// Whether the status admits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Postponed | Self::Cancelled | Self::Abandoned
        )
    }

    /// Whether the match is currently in play (not a break).
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Whether the match is between kickoff and the final whistle,
    /// including breaks. Drives the fast polling cadence.
    pub const fn is_in_play(self) -> bool {
        matches!(self, Self::Live | Self::Intermission)
    }

    /// Whether a transition from `self` to `next` is valid.
    ///
    /// `self == next` is trivially valid (no transition). Terminal states
    /// admit nothing. Forward jumps that skip intermediate states are
    /// accepted (a poll cycle can easily miss the live window entirely),
    /// but regressions are not.
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            // Any pre-Finished state may be postponed, cancelled or abandoned.
            Self::Postponed | Self::Cancelled | Self::Abandoned => true,
            Self::Finished => true,
            Self::Live => matches!(self, Self::Scheduled | Self::Intermission),
            Self::Intermission => matches!(self, Self::Scheduled | Self::Live),
            Self::Scheduled => false,
        }
    }

    /// Normalize a raw status string from an upstream feed.
    ///
    /// Matching is case-insensitive and tolerant of the common
    /// abbreviations. Returns `None` for anything outside the known
    /// vocabulary -- the caller treats that as a validation failure, never
    /// as a silent default.
    pub fn from_feed_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "not started" | "ns" | "upcoming" => Some(Self::Scheduled),
            "live" | "in play" | "inplay" | "1st half" | "2nd half" | "first half"
            | "second half" | "extra time" => Some(Self::Live),
            "ht" | "halftime" | "half-time" | "half time" | "intermission" | "break" => {
                Some(Self::Intermission)
            }
            "ft" | "finished" | "full-time" | "full time" | "ended" | "aet"
            | "after extra time" | "after penalties" => Some(Self::Finished),
            "postponed" => Some(Self::Postponed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "abandoned" | "interrupted" | "suspended" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Lowercase identifier used for database columns and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Intermission => "intermission",
            Self::Finished => "finished",
            Self::Postponed => "postponed",
            Self::Cancelled => "cancelled",
            Self::Abandoned => "abandoned",
        }
    }
}

impl core::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a discrete timeline event within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MatchEventKind {
    /// A goal scored.
    Goal,
    /// A goal scored against the scorer's own side.
    OwnGoal,
    /// A converted penalty.
    Penalty,
    /// A yellow card.
    CardYellow,
    /// A red card (including second yellow).
    CardRed,
    /// A player substitution.
    Substitution,
}

impl MatchEventKind {
    /// Normalize a raw event-kind string from an upstream feed.
    ///
    /// Returns `None` for unknown kinds; the validator rejects the
    /// snapshot rather than guessing.
    pub fn from_feed_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "goal" => Some(Self::Goal),
            "own_goal" | "own goal" => Some(Self::OwnGoal),
            "penalty" | "penalty_goal" => Some(Self::Penalty),
            "yellow_card" | "yellow card" | "yellow" => Some(Self::CardYellow),
            "red_card" | "red card" | "red" | "second_yellow" => Some(Self::CardRed),
            "substitution" | "sub" => Some(Self::Substitution),
            _ => None,
        }
    }
}

/// Which side of the fixture an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TeamSide {
    /// The home team.
    Home,
    /// The away team.
    Away,
}

impl TeamSide {
    /// Normalize a raw side string from an upstream feed.
    pub fn from_feed_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "h" => Some(Self::Home),
            "away" | "a" => Some(Self::Away),
            _ => None,
        }
    }
}

/// Kind of a change notification emitted by the diff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ChangeKind {
    /// The score pair changed.
    ScoreChanged,
    /// The lifecycle status changed.
    StatusChanged,
    /// A new timeline event appeared.
    EventAdded,
}
