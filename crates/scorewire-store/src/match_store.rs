//! Upsert-by-external-key and proximity-based duplicate detection.
//!
//! [`MatchStore`] owns the entity-store semantics on top of the opaque
//! [`MatchDocuments`] backing store: a merged record is written atomically
//! under its external key, and before a brand-new key creates a second
//! record for a fixture we already track (sources occasionally re-assign
//! identifiers), [`find_likely_duplicate`](MatchStore::find_likely_duplicate)
//! checks for an existing match with the same participant pair and a
//! kickoff inside the tolerance window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use scorewire_types::{Match, TeamRef};
use tracing::debug;

use crate::documents::MatchDocuments;
use crate::error::StoreError;

/// Entity store for tracked matches.
#[derive(Clone)]
pub struct MatchStore {
    docs: Arc<dyn MatchDocuments>,
}

impl MatchStore {
    /// Create a store over a backing document store.
    pub fn new(docs: Arc<dyn MatchDocuments>) -> Self {
        Self { docs }
    }

    /// Fetch the current record for an external key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unavailable.
    pub async fn get(&self, external_key: &str) -> Result<Option<Match>, StoreError> {
        self.docs.get(external_key).await
    }

    /// Write a merged record, inserting or replacing by external key.
    ///
    /// Returns the stored record and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails; the caller aborts the
    /// current entity's cycle and retries on a later poll.
    pub async fn upsert(&self, merged: &Match) -> Result<(Match, bool), StoreError> {
        let is_new = self.docs.get(&merged.external_key).await?.is_none();
        if is_new {
            self.docs.insert(merged).await?;
        } else {
            self.docs.replace(merged).await?;
        }
        debug!(
            external_key = merged.external_key,
            is_new,
            status = %merged.status,
            "match upserted"
        );
        Ok((merged.clone(), is_new))
    }

    /// Look for an existing match that is probably the same fixture as an
    /// incoming snapshot carrying an unknown external key.
    ///
    /// Heuristic: same participant pair and kickoff within `tolerance`.
    /// When several candidates fall inside the window the one with the
    /// closest kickoff wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unavailable.
    pub async fn find_likely_duplicate(
        &self,
        home: &TeamRef,
        away: &TeamRef,
        kickoff: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Option<Match>, StoreError> {
        let candidates = self.docs.find_window(home, away, kickoff, tolerance).await?;
        let best = candidates
            .into_iter()
            .min_by_key(|m| (m.kickoff - kickoff).abs());
        if let Some(found) = &best {
            debug!(
                existing_key = found.external_key,
                home = %home,
                away = %away,
                "likely duplicate fixture found"
            );
        }
        Ok(best)
    }

    /// Matches the poll scheduler should refresh.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unavailable.
    pub async fn list_active(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>, StoreError> {
        self.docs.list_active(from, to).await
    }
}
