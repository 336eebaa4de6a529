//! Validation of raw upstream snapshots.
//!
//! Upstream sources are untrusted: fields go missing, scores arrive as
//! nonsense, statuses are spelled a dozen ways. [`validate_snapshot`] is the
//! single boundary where a loose [`RawSnapshot`] either becomes a fully
//! typed [`ValidatedSnapshot`] or is rejected naming the first structural
//! violation. It is a pure function; a rejection is logged by the caller
//! and the snapshot is skipped until the next poll cycle.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use scorewire_types::{
    topic, MatchEvent, MatchEventKind, MatchStatus, Score, TeamRef, TeamSide, MAX_SCORE,
};

use crate::error::ValidationError;

/// Upper bound for a progress marker, including stoppage and extra time.
pub const MAX_MINUTE: u16 = 200;

/// Length cap for actor names after trimming.
const MAX_ACTOR_LEN: usize = 200;

/// Length cap for free-text notes after trimming.
const MAX_NOTE_LEN: usize = 500;

/// An untyped snapshot as fetched from an upstream source.
///
/// Everything is optional and loosely typed; unknown fields are ignored.
/// Nothing downstream of the validator ever sees this type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    /// Source-assigned match identifier.
    pub external_key: Option<String>,
    /// Home team name or identifier.
    pub home_team: Option<String>,
    /// Away team name or identifier.
    pub away_team: Option<String>,
    /// Scheduled start time (RFC 3339).
    pub kickoff: Option<DateTime<Utc>>,
    /// Raw status string.
    pub status: Option<String>,
    /// Elapsed minute.
    pub minute: Option<i64>,
    /// Raw score pair.
    pub score: Option<RawScore>,
    /// Raw timeline events.
    pub events: Vec<RawEvent>,
}

/// A raw score pair.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RawScore {
    /// Home goals.
    pub home: Option<i64>,
    /// Away goals.
    pub away: Option<i64>,
}

/// A raw timeline event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Raw event kind string.
    #[serde(alias = "type")]
    pub kind: Option<String>,
    /// Match minute.
    pub minute: Option<i64>,
    /// Raw side string (`home`/`away`).
    #[serde(alias = "team")]
    pub side: Option<String>,
    /// Primary actor.
    pub player: Option<String>,
    /// Secondary actor (assist, substitute coming on).
    pub assist: Option<String>,
    /// Free-text description.
    #[serde(alias = "description")]
    pub note: Option<String>,
}

/// A snapshot that passed every structural check.
///
/// All fields are range-checked and normalized; downstream components
/// operate exclusively on this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSnapshot {
    /// Source-assigned match identifier, token-validated.
    pub external_key: String,
    /// Home participant slug.
    pub home: TeamRef,
    /// Away participant slug.
    pub away: TeamRef,
    /// Scheduled start time.
    pub kickoff: DateTime<Utc>,
    /// Canonical status.
    pub status: MatchStatus,
    /// Elapsed minute, when reported.
    pub minute: Option<u16>,
    /// Score pair, bounded.
    pub score: Score,
    /// Timeline events, normalized and sorted by minute.
    pub events: Vec<MatchEvent>,
}

/// Validate and normalize a raw snapshot.
///
/// # Errors
///
/// Returns [`ValidationError`] naming the first structural violation.
pub fn validate_snapshot(raw: &RawSnapshot) -> Result<ValidatedSnapshot, ValidationError> {
    let external_key = raw
        .external_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ValidationError::MissingField("external_key"))?;
    if !topic::is_valid_token(external_key) {
        return Err(ValidationError::InvalidKey(external_key.to_owned()));
    }

    let home = team_slug(raw.home_team.as_deref(), "home_team")?;
    let away = team_slug(raw.away_team.as_deref(), "away_team")?;

    let kickoff = raw.kickoff.ok_or(ValidationError::MissingField("kickoff"))?;

    let status_raw = raw
        .status
        .as_deref()
        .ok_or(ValidationError::MissingField("status"))?;
    let status = MatchStatus::from_feed_str(status_raw)
        .ok_or_else(|| ValidationError::UnknownStatus(status_raw.to_owned()))?;

    let score_raw = raw.score.ok_or(ValidationError::MissingField("score"))?;
    let score = Score::new(
        bounded_score(score_raw.home, "score.home")?,
        bounded_score(score_raw.away, "score.away")?,
    );

    let minute = match raw.minute {
        None => None,
        Some(m) => Some(bounded_minute(m).ok_or(ValidationError::MinuteOutOfRange(m))?),
    };

    let mut events = Vec::with_capacity(raw.events.len());
    for (index, raw_event) in raw.events.iter().enumerate() {
        events.push(validate_event(index, raw_event)?);
    }
    // Stable sort: same-minute events keep their feed order.
    events.sort_by_key(|e| e.minute);

    Ok(ValidatedSnapshot {
        external_key: external_key.to_owned(),
        home,
        away,
        kickoff,
        status,
        minute,
        score,
        events,
    })
}

fn validate_event(index: usize, raw: &RawEvent) -> Result<MatchEvent, ValidationError> {
    let kind_raw = raw
        .kind
        .as_deref()
        .ok_or(ValidationError::EventMissingField { index, field: "kind" })?;
    let kind = MatchEventKind::from_feed_str(kind_raw).ok_or_else(|| {
        ValidationError::UnknownEventKind {
            index,
            kind: kind_raw.to_owned(),
        }
    })?;

    let minute_raw = raw.minute.ok_or(ValidationError::EventMissingField {
        index,
        field: "minute",
    })?;
    let minute = bounded_minute(minute_raw).ok_or(ValidationError::EventMinuteOutOfRange {
        index,
        minute: minute_raw,
    })?;

    let side_raw = raw
        .side
        .as_deref()
        .ok_or(ValidationError::EventMissingField { index, field: "side" })?;
    let side = TeamSide::from_feed_str(side_raw).ok_or_else(|| {
        ValidationError::UnknownEventSide {
            index,
            side: side_raw.to_owned(),
        }
    })?;

    let player = cap(
        raw.player
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ValidationError::EmptyPlayer { index })?,
        MAX_ACTOR_LEN,
    );

    Ok(MatchEvent {
        kind,
        minute,
        side,
        player,
        assist: trimmed_optional(raw.assist.as_deref(), MAX_ACTOR_LEN),
        note: trimmed_optional(raw.note.as_deref(), MAX_NOTE_LEN),
    })
}

/// Derive the topic-safe slug for a team name: lowercase, non-token
/// characters collapsed to single dashes.
fn team_slug(raw: Option<&str>, field: &'static str) -> Result<TeamRef, ValidationError> {
    let name = raw
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ValidationError::MissingField(field))?;

    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 64 {
            break;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if topic::is_valid_token(&slug) {
        Ok(TeamRef::new(slug))
    } else {
        Err(ValidationError::InvalidTeam(name.to_owned()))
    }
}

fn bounded_score(raw: Option<i64>, field: &'static str) -> Result<u8, ValidationError> {
    let value = raw.ok_or(ValidationError::MissingField(field))?;
    if (0..=i64::from(MAX_SCORE)).contains(&value) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(value as u8)
    } else {
        Err(ValidationError::ScoreOutOfRange { field, value })
    }
}

fn bounded_minute(raw: i64) -> Option<u16> {
    if (0..=i64::from(MAX_MINUTE)).contains(&raw) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(raw as u16)
    } else {
        None
    }
}

fn trimmed_optional(raw: Option<&str>, max: usize) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| cap(s, max))
}

fn cap(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_fixture() -> RawSnapshot {
        RawSnapshot {
            external_key: Some("m-001".to_owned()),
            home_team: Some("Arsenal FC".to_owned()),
            away_team: Some("Spurs".to_owned()),
            kickoff: Some(Utc::now()),
            status: Some("live".to_owned()),
            minute: Some(23),
            score: Some(RawScore {
                home: Some(1),
                away: Some(0),
            }),
            events: vec![RawEvent {
                kind: Some("goal".to_owned()),
                minute: Some(23),
                side: Some("home".to_owned()),
                player: Some("  P1  ".to_owned()),
                assist: None,
                note: None,
            }],
        }
    }

    #[test]
    fn valid_snapshot_passes() {
        let snap = validate_snapshot(&raw_fixture()).unwrap();
        assert_eq!(snap.external_key, "m-001");
        assert_eq!(snap.home.as_str(), "arsenal-fc");
        assert_eq!(snap.away.as_str(), "spurs");
        assert_eq!(snap.status, MatchStatus::Live);
        assert_eq!(snap.score, Score::new(1, 0));
        assert_eq!(snap.events.len(), 1);
        // Actor names are trimmed.
        assert_eq!(snap.events.first().unwrap().player, "P1");
    }

    #[test]
    fn missing_external_key_rejected() {
        let mut raw = raw_fixture();
        raw.external_key = None;
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::MissingField("external_key"))
        ));
    }

    #[test]
    fn wildcard_in_key_rejected() {
        let mut raw = raw_fixture();
        raw.external_key = Some("evil.>".to_owned());
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::InvalidKey(_))
        ));
    }

    #[test]
    fn score_out_of_bounds_rejected() {
        let mut raw = raw_fixture();
        raw.score = Some(RawScore {
            home: Some(100),
            away: Some(0),
        });
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::ScoreOutOfRange {
                field: "score.home",
                value: 100
            })
        ));
    }

    #[test]
    fn negative_score_rejected() {
        let mut raw = raw_fixture();
        raw.score = Some(RawScore {
            home: Some(-1),
            away: Some(0),
        });
        assert!(validate_snapshot(&raw).is_err());
    }

    #[test]
    fn unmappable_status_rejected() {
        let mut raw = raw_fixture();
        raw.status = Some("lunch break".to_owned());
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::UnknownStatus(_))
        ));
    }

    #[test]
    fn abbreviated_status_normalized() {
        let mut raw = raw_fixture();
        raw.status = Some("HT".to_owned());
        let snap = validate_snapshot(&raw).unwrap();
        assert_eq!(snap.status, MatchStatus::Intermission);
    }

    #[test]
    fn event_with_empty_player_rejected() {
        let mut raw = raw_fixture();
        raw.events = vec![RawEvent {
            kind: Some("goal".to_owned()),
            minute: Some(10),
            side: Some("home".to_owned()),
            player: Some("   ".to_owned()),
            assist: None,
            note: None,
        }];
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::EmptyPlayer { index: 0 })
        ));
    }

    #[test]
    fn event_minute_beyond_bound_rejected() {
        let mut raw = raw_fixture();
        raw.events = vec![RawEvent {
            kind: Some("goal".to_owned()),
            minute: Some(201),
            side: Some("home".to_owned()),
            player: Some("P1".to_owned()),
            assist: None,
            note: None,
        }];
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::EventMinuteOutOfRange { index: 0, minute: 201 })
        ));
    }

    #[test]
    fn unknown_event_kind_rejected() {
        let mut raw = raw_fixture();
        raw.events = vec![RawEvent {
            kind: Some("pitch invasion".to_owned()),
            minute: Some(10),
            side: Some("home".to_owned()),
            player: Some("P1".to_owned()),
            assist: None,
            note: None,
        }];
        assert!(matches!(
            validate_snapshot(&raw),
            Err(ValidationError::UnknownEventKind { index: 0, .. })
        ));
    }

    #[test]
    fn events_sorted_by_minute() {
        let mut raw = raw_fixture();
        raw.events = vec![
            RawEvent {
                kind: Some("yellow_card".to_owned()),
                minute: Some(60),
                side: Some("away".to_owned()),
                player: Some("P5".to_owned()),
                ..RawEvent::default()
            },
            RawEvent {
                kind: Some("goal".to_owned()),
                minute: Some(12),
                side: Some("home".to_owned()),
                player: Some("P1".to_owned()),
                ..RawEvent::default()
            },
        ];
        let snap = validate_snapshot(&raw).unwrap();
        let minutes: Vec<u16> = snap.events.iter().map(|e| e.minute).collect();
        assert_eq!(minutes, vec![12, 60]);
    }

    #[test]
    fn long_note_is_capped() {
        let mut raw = raw_fixture();
        raw.events = vec![RawEvent {
            kind: Some("goal".to_owned()),
            minute: Some(10),
            side: Some("home".to_owned()),
            player: Some("P1".to_owned()),
            assist: None,
            note: Some("x".repeat(2000)),
        }];
        let snap = validate_snapshot(&raw).unwrap();
        let note = snap.events.first().unwrap().note.clone().unwrap();
        assert_eq!(note.chars().count(), 500);
    }

    #[test]
    fn raw_decodes_from_partial_json() {
        let raw: RawSnapshot = serde_json::from_str(
            r#"{"external_key":"m1","status":"FT","unexpected_field":true}"#,
        )
        .unwrap();
        assert_eq!(raw.external_key.as_deref(), Some("m1"));
        assert!(raw.score.is_none());
        // Partial input decodes fine; validation is where it fails.
        assert!(validate_snapshot(&raw).is_err());
    }
}
