//! Topic key construction and the wildcard space.
//!
//! Topics double as broker subjects, so they use the broker's dotted token
//! syntax: `match.{external_key}`, `team.{slug}`, `live.all`. External keys
//! and team slugs are validated at the ingestion boundary to the token
//! charset, so no escaping happens here.

use crate::ids::TeamRef;

/// Catch-all topic for everything happening in live matches.
pub const LIVE_ALL: &str = "live.all";

/// Wildcard subject matching every per-match topic.
pub const MATCH_WILDCARD: &str = "match.>";

/// Wildcard subject matching every per-team topic.
pub const TEAM_WILDCARD: &str = "team.>";

/// Wildcard subject matching the live topic space.
pub const LIVE_WILDCARD: &str = "live.>";

/// The topic carrying every change for one match.
pub fn match_topic(external_key: &str) -> String {
    format!("match.{external_key}")
}

/// The topic carrying score and event changes for one participant.
pub fn team_topic(team: &TeamRef) -> String {
    format!("team.{team}")
}

/// Whether a string is usable as a topic token: non-empty, at most 64
/// bytes, ASCII alphanumerics plus `-` and `_`.
///
/// Applied to external keys and team slugs by the validator. Keeps topic
/// keys unambiguous (no separator or wildcard characters smuggled in via
/// feed data).
pub fn is_valid_token(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= 64
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_topic_shape() {
        assert_eq!(match_topic("abc123"), "match.abc123");
    }

    #[test]
    fn team_topic_shape() {
        assert_eq!(team_topic(&TeamRef::from("arsenal")), "team.arsenal");
    }

    #[test]
    fn token_validation() {
        assert!(is_valid_token("abc-123_X"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("has space"));
        assert!(!is_valid_token("dotted.key"));
        assert!(!is_valid_token("star*"));
        assert!(!is_valid_token(&"x".repeat(65)));
    }
}
