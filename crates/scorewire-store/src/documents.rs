//! The opaque backing document store.
//!
//! [`MatchDocuments`] is the seam between upsert/duplicate-detection logic
//! and whatever actually persists match documents. Production uses the
//! `PostgreSQL` implementation in [`crate::pg_documents`]; tests and local
//! development use [`MemoryDocuments`].

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scorewire_types::{Match, TeamRef};

use crate::error::StoreError;

/// Operations the backing document store must provide.
///
/// All methods are keyed by `external_key` or by the duplicate-detection
/// tuple (participant pair + kickoff window). Implementations must make
/// `insert` and `replace` atomic per document; cross-document transactions
/// are never required.
#[async_trait]
pub trait MatchDocuments: Send + Sync {
    /// Fetch the document stored under an external key.
    async fn get(&self, external_key: &str) -> Result<Option<Match>, StoreError>;

    /// Insert a document for a previously-unseen external key.
    async fn insert(&self, record: &Match) -> Result<(), StoreError>;

    /// Replace the document stored under `record.external_key`.
    async fn replace(&self, record: &Match) -> Result<(), StoreError>;

    /// All documents with the given participant pair whose kickoff lies
    /// within `tolerance` of `center`.
    async fn find_window(
        &self,
        home: &TeamRef,
        away: &TeamRef,
        center: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Vec<Match>, StoreError>;

    /// Matches the poll scheduler should refresh: everything in play,
    /// plus scheduled matches with kickoff inside `[from, to]`.
    async fn list_active(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>, StoreError>;
}

/// In-memory implementation of [`MatchDocuments`].
///
/// Used by pipeline tests and local development without a database.
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    inner: RwLock<BTreeMap<String, Match>>,
}

impl MemoryDocuments {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MatchDocuments for MemoryDocuments {
    async fn get(&self, external_key: &str) -> Result<Option<Match>, StoreError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(external_key).cloned())
    }

    async fn insert(&self, record: &Match) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&record.external_key) {
            return Err(StoreError::Unavailable(format!(
                "duplicate insert for key {}",
                record.external_key
            )));
        }
        map.insert(record.external_key.clone(), record.clone());
        Ok(())
    }

    async fn replace(&self, record: &Match) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(&record.external_key) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "replace of missing key {}",
                record.external_key
            ))),
        }
    }

    async fn find_window(
        &self,
        home: &TeamRef,
        away: &TeamRef,
        center: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Vec<Match>, StoreError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .values()
            .filter(|m| {
                m.home == *home
                    && m.away == *away
                    && (m.kickoff - center).abs() <= tolerance
            })
            .cloned()
            .collect())
    }

    async fn list_active(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>, StoreError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .values()
            .filter(|m| {
                m.status.is_in_play()
                    || (m.status == scorewire_types::MatchStatus::Scheduled
                        && m.kickoff >= from
                        && m.kickoff <= to)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use scorewire_types::{MatchId, MatchStatus, Score};

    fn fixture(key: &str, kickoff: DateTime<Utc>) -> Match {
        Match {
            id: MatchId::new(),
            external_key: key.to_owned(),
            home: TeamRef::from("home-fc"),
            away: TeamRef::from("away-fc"),
            kickoff,
            status: MatchStatus::Scheduled,
            minute: None,
            score: Score::default(),
            halftime_score: None,
            fulltime_score: None,
            events: Vec::new(),
            last_observed_at: kickoff,
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let docs = MemoryDocuments::new();
        let m = fixture("k1", Utc::now());
        docs.insert(&m).await.unwrap();
        let loaded = docs.get("k1").await.unwrap();
        assert_eq!(loaded, Some(m));
    }

    #[tokio::test]
    async fn double_insert_fails() {
        let docs = MemoryDocuments::new();
        let m = fixture("k1", Utc::now());
        docs.insert(&m).await.unwrap();
        assert!(docs.insert(&m).await.is_err());
    }

    #[tokio::test]
    async fn replace_missing_fails() {
        let docs = MemoryDocuments::new();
        let m = fixture("k1", Utc::now());
        assert!(docs.replace(&m).await.is_err());
    }

    #[tokio::test]
    async fn window_filters_by_pair_and_anchor() {
        let docs = MemoryDocuments::new();
        let now = Utc::now();
        docs.insert(&fixture("near", now)).await.unwrap();
        docs.insert(&fixture("far", now + Duration::hours(12)))
            .await
            .unwrap();

        let mut other_pair = fixture("other", now);
        other_pair.home = TeamRef::from("third-fc");
        docs.insert(&other_pair).await.unwrap();

        let found = docs
            .find_window(
                &TeamRef::from("home-fc"),
                &TeamRef::from("away-fc"),
                now + Duration::minutes(30),
                Duration::hours(3),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|m| m.external_key.as_str()), Some("near"));
    }

    #[tokio::test]
    async fn list_active_includes_in_play_and_upcoming() {
        let docs = MemoryDocuments::new();
        let now = Utc::now();

        let mut live = fixture("live", now - Duration::hours(1));
        live.status = MatchStatus::Live;
        docs.insert(&live).await.unwrap();

        docs.insert(&fixture("soon", now + Duration::minutes(20)))
            .await
            .unwrap();
        docs.insert(&fixture("tomorrow", now + Duration::days(1)))
            .await
            .unwrap();

        let mut done = fixture("done", now - Duration::days(1));
        done.status = MatchStatus::Finished;
        docs.insert(&done).await.unwrap();

        let active = docs
            .list_active(now - Duration::hours(2), now + Duration::hours(1))
            .await
            .unwrap();
        let keys: Vec<_> = active.iter().map(|m| m.external_key.as_str()).collect();
        assert!(keys.contains(&"live"));
        assert!(keys.contains(&"soon"));
        assert!(!keys.contains(&"tomorrow"));
        assert!(!keys.contains(&"done"));
    }
}
