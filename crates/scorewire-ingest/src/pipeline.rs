//! The per-snapshot ingestion cycle.
//!
//! One call to [`IngestPipeline::process`] runs the full cycle for one raw
//! snapshot: validate, take the per-key lease, load the stored record,
//! resolve duplicate keys, merge, persist, diff and publish. The diff runs
//! against the record loaded at the start of the cycle, so restarts do not
//! replay history for entities already persisted.
//!
//! Store failures abort the cycle with an error; everything else degrades
//! to a skip that the next poll cycle recovers from.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use scorewire_store::MatchStore;
use scorewire_types::Match;

use crate::diff::detect_changes;
use crate::error::{PipelineError, ValidationError};
use crate::merge::merge_snapshot;
use crate::metrics::IngestCounters;
use crate::publish::ChangePublisher;
use crate::singleflight::{KeyLease, KeyLeases};
use crate::validate::{validate_snapshot, RawSnapshot};

/// How one snapshot's cycle ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// A cycle for this key was already in flight; nothing was done.
    SkippedInFlight,
    /// The snapshot failed validation and was skipped.
    Rejected(ValidationError),
    /// The snapshot was merged but produced no observable change.
    Unchanged,
    /// The snapshot was merged and its changes published.
    Applied {
        /// Whether a new record was created.
        is_new: bool,
        /// How many notifications were published.
        notifications: usize,
    },
}

/// The ingestion pipeline, shared across poll tasks.
pub struct IngestPipeline {
    store: MatchStore,
    publisher: Arc<dyn ChangePublisher>,
    counters: Arc<IngestCounters>,
    leases: Arc<KeyLeases>,
    duplicate_tolerance: Duration,
}

impl IngestPipeline {
    /// Assemble a pipeline.
    pub fn new(
        store: MatchStore,
        publisher: Arc<dyn ChangePublisher>,
        counters: Arc<IngestCounters>,
        duplicate_tolerance: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            counters,
            leases: Arc::new(KeyLeases::new()),
            duplicate_tolerance,
        }
    }

    /// Shared ingest counters, for the status endpoint.
    pub fn counters(&self) -> Arc<IngestCounters> {
        Arc::clone(&self.counters)
    }

    /// Run one full cycle for a raw snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the store fails mid-cycle; the caller
    /// retries on a later poll.
    pub async fn process(&self, raw: &RawSnapshot) -> Result<PipelineOutcome, PipelineError> {
        let snapshot = match validate_snapshot(raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "snapshot rejected");
                self.counters.record_rejected();
                return Ok(PipelineOutcome::Rejected(error));
            }
        };

        let Some(_lease) = self.leases.try_acquire(&snapshot.external_key) else {
            debug!(
                external_key = snapshot.external_key,
                "cycle already in flight, skipped"
            );
            self.counters.record_skipped();
            return Ok(PipelineOutcome::SkippedInFlight);
        };

        let mut previous = self.store.get(&snapshot.external_key).await?;

        // A brand-new key may still be a fixture we already track under a
        // different key. The extra lease keeps two keys for the same
        // fixture from merging concurrently.
        let mut _merge_lease: Option<KeyLease> = None;
        if previous.is_none() {
            if let Some(existing) = self
                .store
                .find_likely_duplicate(
                    &snapshot.home,
                    &snapshot.away,
                    snapshot.kickoff,
                    self.duplicate_tolerance,
                )
                .await?
            {
                let Some(lease) = self.leases.try_acquire(&existing.external_key) else {
                    debug!(
                        external_key = snapshot.external_key,
                        existing_key = existing.external_key,
                        "duplicate target in flight, skipped"
                    );
                    self.counters.record_skipped();
                    return Ok(PipelineOutcome::SkippedInFlight);
                };
                info!(
                    incoming_key = snapshot.external_key,
                    existing_key = existing.external_key,
                    "re-keyed fixture merged into existing record"
                );
                _merge_lease = Some(lease);
                previous = Some(existing);
            }
        }

        let outcome = merge_snapshot(previous.as_ref(), &snapshot, Utc::now());
        self.counters.record_anomalies(outcome.anomalies.len());

        let changes = detect_changes(previous.as_ref(), &outcome.record, &outcome.new_events);

        let (stored, is_new) = self.store.upsert(&outcome.record).await?;
        self.counters.record_accepted();

        if changes.is_empty() {
            return Ok(PipelineOutcome::Unchanged);
        }

        self.publisher.publish_changes(&stored, &changes).await;
        debug!(
            external_key = stored.external_key,
            notifications = changes.len(),
            is_new,
            "cycle applied"
        );
        Ok(PipelineOutcome::Applied {
            is_new,
            notifications: changes.len(),
        })
    }

    /// The stored record for a key, for the status endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the store is unavailable.
    pub async fn current(&self, external_key: &str) -> Result<Option<Match>, PipelineError> {
        Ok(self.store.get(external_key).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use scorewire_store::MemoryDocuments;
    use scorewire_types::{ChangeKind, ChangeNotification, ChangePayload, MatchStatus};

    use crate::validate::{RawEvent, RawScore};

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<ChangeNotification>>,
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<ChangeNotification> {
            std::mem::take(
                &mut self
                    .published
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            )
        }
    }

    #[async_trait]
    impl ChangePublisher for RecordingPublisher {
        async fn publish_changes(&self, _record: &Match, changes: &[ChangeNotification]) {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(changes);
        }
    }

    fn pipeline() -> (IngestPipeline, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = IngestPipeline::new(
            MatchStore::new(Arc::new(MemoryDocuments::new())),
            Arc::clone(&publisher) as Arc<dyn ChangePublisher>,
            Arc::new(IngestCounters::new()),
            Duration::hours(3),
        );
        (pipeline, publisher)
    }

    fn raw(
        key: &str,
        status: &str,
        home_goals: i64,
        away_goals: i64,
        kickoff: DateTime<Utc>,
        events: Vec<RawEvent>,
    ) -> RawSnapshot {
        RawSnapshot {
            external_key: Some(key.to_owned()),
            home_team: Some("Home FC".to_owned()),
            away_team: Some("Away FC".to_owned()),
            kickoff: Some(kickoff),
            status: Some(status.to_owned()),
            minute: None,
            score: Some(RawScore {
                home: Some(home_goals),
                away: Some(away_goals),
            }),
            events,
        }
    }

    fn goal_event(minute: i64, player: &str) -> RawEvent {
        RawEvent {
            kind: Some("goal".to_owned()),
            minute: Some(minute),
            side: Some("home".to_owned()),
            player: Some(player.to_owned()),
            assist: None,
            note: None,
        }
    }

    fn kinds(changes: &[ChangeNotification]) -> Vec<ChangeKind> {
        changes.iter().map(ChangeNotification::kind).collect()
    }

    #[tokio::test]
    async fn full_match_lifecycle_publishes_expected_changes() {
        let (pipeline, publisher) = pipeline();
        let kickoff = Utc::now();

        // First sight: scheduled, nothing has happened yet.
        let outcome = pipeline
            .process(&raw("m1", "scheduled", 0, 0, kickoff, vec![]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            PipelineOutcome::Applied { is_new: true, .. }
        ));
        assert_eq!(kinds(&publisher.take()), vec![ChangeKind::StatusChanged]);

        // Kickoff.
        pipeline
            .process(&raw("m1", "live", 0, 0, kickoff, vec![]))
            .await
            .unwrap();
        assert_eq!(kinds(&publisher.take()), vec![ChangeKind::StatusChanged]);

        // A goal: score and event, no status change.
        pipeline
            .process(&raw(
                "m1",
                "live",
                1,
                0,
                kickoff,
                vec![goal_event(23, "P1")],
            ))
            .await
            .unwrap();
        assert_eq!(
            kinds(&publisher.take()),
            vec![ChangeKind::ScoreChanged, ChangeKind::EventAdded]
        );

        // Full time; the goal is re-delivered but already known.
        pipeline
            .process(&raw("m1", "ft", 1, 0, kickoff, vec![goal_event(23, "P1")]))
            .await
            .unwrap();
        assert_eq!(kinds(&publisher.take()), vec![ChangeKind::StatusChanged]);

        let stored = pipeline.current("m1").await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
        assert_eq!(stored.events.len(), 1);
        assert_eq!(stored.fulltime_score.map(|s| (s.home, s.away)), Some((1, 0)));
    }

    #[tokio::test]
    async fn rekeyed_fixture_merges_into_existing_record() {
        let (pipeline, publisher) = pipeline();
        let kickoff = Utc::now();

        pipeline
            .process(&raw("k1", "live", 1, 0, kickoff, vec![]))
            .await
            .unwrap();
        publisher.take();

        // Same fixture, re-assigned identifier, kickoff a few minutes off.
        let shifted = kickoff + Duration::minutes(10);
        pipeline
            .process(&raw("k2", "live", 2, 0, shifted, vec![]))
            .await
            .unwrap();

        // No second record appears; the change is attributed to the
        // original key.
        assert!(pipeline.current("k2").await.unwrap().is_none());
        let stored = pipeline.current("k1").await.unwrap().unwrap();
        assert_eq!((stored.score.home, stored.score.away), (2, 0));

        let changes = publisher.take();
        assert_eq!(kinds(&changes), vec![ChangeKind::ScoreChanged]);
        match &changes.first().unwrap().payload {
            ChangePayload::Score { entity_key, .. } => assert_eq!(entity_key, "k1"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unchanged_snapshot_publishes_nothing() {
        let (pipeline, publisher) = pipeline();
        let kickoff = Utc::now();
        let snapshot = raw("m1", "live", 1, 1, kickoff, vec![]);

        pipeline.process(&snapshot).await.unwrap();
        publisher.take();

        let outcome = pipeline.process(&snapshot).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Unchanged));
        assert!(publisher.take().is_empty());
    }

    #[tokio::test]
    async fn invalid_snapshot_is_rejected_and_counted() {
        let (pipeline, publisher) = pipeline();
        let mut snapshot = raw("m1", "live", 1, 0, Utc::now(), vec![]);
        snapshot.status = Some("lunch break".to_owned());

        let outcome = pipeline.process(&snapshot).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Rejected(_)));
        assert!(publisher.take().is_empty());
        assert_eq!(pipeline.counters().snapshot().snapshots_rejected, 1);
        assert!(pipeline.current("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_regression_is_dropped_but_rest_applies() {
        let (pipeline, publisher) = pipeline();
        let kickoff = Utc::now();

        pipeline
            .process(&raw("m1", "ft", 2, 1, kickoff, vec![]))
            .await
            .unwrap();
        publisher.take();

        // A stale cache replays "live" with a corrected score.
        pipeline
            .process(&raw("m1", "live", 2, 2, kickoff, vec![]))
            .await
            .unwrap();

        let stored = pipeline.current("m1").await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
        assert_eq!((stored.score.home, stored.score.away), (2, 2));
        assert_eq!(kinds(&publisher.take()), vec![ChangeKind::ScoreChanged]);
        assert_eq!(pipeline.counters().snapshot().merge_anomalies, 1);
    }
}
