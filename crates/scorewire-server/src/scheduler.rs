//! The poll scheduler.
//!
//! Drives ingestion on a fixed cadence: every tick it loads the matches
//! worth refreshing, fetches a raw snapshot for each and hands it to the
//! pipeline. Matches in play are polled every tick; scheduled matches near
//! kickoff are polled on a slower cadence. On that same slower cadence it
//! also pulls the upstream fixture list, which is how a match enters
//! tracking in the first place. A fetch failure skips that match (or the
//! discovery pass) for the tick, nothing more.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use scorewire_ingest::{IngestPipeline, SnapshotFetcher};
use scorewire_store::MatchStore;
use scorewire_types::MatchStatus;

/// Cadence and window parameters for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick interval; matches in play are polled every tick.
    pub live_interval: Duration,
    /// Cadence for matches that are not in play yet.
    pub idle_interval: Duration,
    /// How far before kickoff a scheduled match enters polling.
    pub poll_lead: chrono::Duration,
}

/// Polls tracked matches and feeds the pipeline.
pub struct PollScheduler {
    store: MatchStore,
    fetcher: Arc<dyn SnapshotFetcher>,
    pipeline: Arc<IngestPipeline>,
    config: SchedulerConfig,
}

impl PollScheduler {
    /// Assemble a scheduler.
    pub fn new(
        store: MatchStore,
        fetcher: Arc<dyn SnapshotFetcher>,
        pipeline: Arc<IngestPipeline>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            pipeline,
            config,
        }
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let idle_every = idle_ratio(self.config.live_interval, self.config.idle_interval);
        let mut interval = tokio::time::interval(self.config.live_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle(tick, idle_every).await;
                    tick = tick.wrapping_add(1);
                }
                _ = shutdown.changed() => {
                    debug!("poll scheduler stopping");
                    return;
                }
            }
        }
    }

    /// One scheduler tick: refresh every match due this tick.
    pub async fn run_cycle(&self, tick: u64, idle_every: u64) {
        let now = Utc::now();
        let matches = match self
            .store
            .list_active(now - chrono::Duration::hours(1), now + self.config.poll_lead)
            .await
        {
            Ok(matches) => matches,
            Err(error) => {
                warn!(%error, "active match listing failed, tick skipped");
                return;
            }
        };

        for tracked in matches {
            if !due_this_tick(tracked.status, tick, idle_every) {
                continue;
            }
            let raw = match self.fetcher.fetch(&tracked.external_key).await {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(
                        external_key = tracked.external_key,
                        %error,
                        "snapshot fetch failed, match skipped this tick"
                    );
                    self.pipeline.counters().record_fetch_failure();
                    continue;
                }
            };
            if let Err(error) = self.pipeline.process(&raw).await {
                warn!(
                    external_key = tracked.external_key,
                    %error,
                    "pipeline cycle aborted"
                );
            }
        }

        // Discovery shares the idle cadence; fixtures found here are
        // refreshed from their next due tick onwards.
        if tick % idle_every.max(1) == 0 {
            self.discover_fixtures().await;
        }
    }

    /// Pull the upstream fixture list and run every announced fixture
    /// through the pipeline, so previously unseen keys become tracked.
    async fn discover_fixtures(&self) {
        let fixtures = match self.fetcher.fetch_upcoming().await {
            Ok(fixtures) => fixtures,
            Err(error) => {
                warn!(%error, "fixture discovery failed, retried next idle tick");
                self.pipeline.counters().record_fetch_failure();
                return;
            }
        };
        debug!(count = fixtures.len(), "fixture list fetched");
        for raw in fixtures {
            if let Err(error) = self.pipeline.process(&raw).await {
                warn!(%error, "fixture ingestion aborted");
            }
        }
    }
}

/// How many live ticks make up one idle tick.
fn idle_ratio(live: Duration, idle: Duration) -> u64 {
    let live_ms = live.as_millis().max(1);
    let idle_ms = idle.as_millis().max(live_ms);
    u64::try_from(idle_ms / live_ms).unwrap_or(1).max(1)
}

/// Matches in play go every tick; anything else only on the idle cadence.
fn due_this_tick(status: MatchStatus, tick: u64, idle_every: u64) -> bool {
    status.is_in_play() || tick % idle_every.max(1) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use scorewire_ingest::{
        ChangePublisher, FetchError, IngestCounters, RawSnapshot, RawScore,
    };
    use scorewire_store::MemoryDocuments;
    use scorewire_types::{ChangeNotification, Match};

    struct StaticFetcher {
        snapshot: RawSnapshot,
        upcoming: Vec<RawSnapshot>,
    }

    #[async_trait]
    impl SnapshotFetcher for StaticFetcher {
        async fn fetch(&self, _external_key: &str) -> Result<RawSnapshot, FetchError> {
            Ok(self.snapshot.clone())
        }

        async fn fetch_upcoming(&self) -> Result<Vec<RawSnapshot>, FetchError> {
            Ok(self.upcoming.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl SnapshotFetcher for FailingFetcher {
        async fn fetch(&self, _external_key: &str) -> Result<RawSnapshot, FetchError> {
            Err(FetchError::Status(503))
        }

        async fn fetch_upcoming(&self) -> Result<Vec<RawSnapshot>, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    struct NullPublisher;

    #[async_trait]
    impl ChangePublisher for NullPublisher {
        async fn publish_changes(&self, _record: &Match, _changes: &[ChangeNotification]) {}
    }

    fn raw(key: &str, status: &str, home_goals: i64) -> RawSnapshot {
        RawSnapshot {
            external_key: Some(key.to_owned()),
            home_team: Some("Home FC".to_owned()),
            away_team: Some("Away FC".to_owned()),
            kickoff: Some(Utc::now()),
            status: Some(status.to_owned()),
            minute: None,
            score: Some(RawScore {
                home: Some(home_goals),
                away: Some(0),
            }),
            events: Vec::new(),
        }
    }

    fn scheduler(fetcher: Arc<dyn SnapshotFetcher>) -> (PollScheduler, Arc<IngestPipeline>) {
        let store = MatchStore::new(Arc::new(MemoryDocuments::new()));
        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            Arc::new(NullPublisher),
            Arc::new(IngestCounters::new()),
            ChronoDuration::hours(3),
        ));
        let config = SchedulerConfig {
            live_interval: Duration::from_secs(10),
            idle_interval: Duration::from_secs(60),
            poll_lead: ChronoDuration::hours(2),
        };
        (
            PollScheduler::new(store, fetcher, Arc::clone(&pipeline), config),
            pipeline,
        )
    }

    #[test]
    fn idle_cadence_ratio() {
        assert_eq!(
            idle_ratio(Duration::from_secs(10), Duration::from_secs(60)),
            6
        );
        // Idle can never be more frequent than live.
        assert_eq!(
            idle_ratio(Duration::from_secs(10), Duration::from_secs(5)),
            1
        );
    }

    #[test]
    fn in_play_matches_are_always_due() {
        assert!(due_this_tick(MatchStatus::Live, 1, 6));
        assert!(due_this_tick(MatchStatus::Intermission, 5, 6));
        assert!(!due_this_tick(MatchStatus::Scheduled, 1, 6));
        assert!(due_this_tick(MatchStatus::Scheduled, 6, 6));
    }

    #[tokio::test]
    async fn cycle_refreshes_tracked_live_match() {
        let fetcher = Arc::new(StaticFetcher {
            snapshot: raw("m1", "live", 1),
            upcoming: Vec::new(),
        });
        let (scheduler, pipeline) = scheduler(fetcher);

        // Seed the store through the pipeline so the match is tracked.
        pipeline.process(&raw("m1", "live", 0)).await.unwrap();

        scheduler.run_cycle(0, 6).await;

        let stored = pipeline.current("m1").await.unwrap().unwrap();
        assert_eq!(stored.score.home, 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_counted_and_skipped() {
        let (scheduler, pipeline) = scheduler(Arc::new(FailingFetcher));
        pipeline.process(&raw("m1", "live", 0)).await.unwrap();

        // Tick 1 is not an idle tick, so only the per-match fetch runs.
        scheduler.run_cycle(1, 6).await;

        assert_eq!(pipeline.counters().snapshot().fetch_failures, 1);
        // The stored record is untouched.
        let stored = pipeline.current("m1").await.unwrap().unwrap();
        assert_eq!(stored.score.home, 0);
    }

    #[tokio::test]
    async fn discovery_starts_tracking_unseen_fixtures() {
        let fetcher = Arc::new(StaticFetcher {
            snapshot: raw("m1", "live", 0),
            upcoming: vec![raw("f1", "scheduled", 0), raw("f2", "scheduled", 0)],
        });
        let (scheduler, pipeline) = scheduler(fetcher);

        // Empty store: nothing to refresh, discovery still runs.
        scheduler.run_cycle(0, 6).await;

        assert!(pipeline.current("f1").await.unwrap().is_some());
        assert!(pipeline.current("f2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn discovery_skips_non_idle_ticks() {
        let fetcher = Arc::new(StaticFetcher {
            snapshot: raw("m1", "live", 0),
            upcoming: vec![raw("f1", "scheduled", 0)],
        });
        let (scheduler, pipeline) = scheduler(fetcher);

        scheduler.run_cycle(3, 6).await;

        assert!(pipeline.current("f1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn discovery_failure_is_counted_not_fatal() {
        let (scheduler, pipeline) = scheduler(Arc::new(FailingFetcher));

        scheduler.run_cycle(0, 6).await;

        assert_eq!(pipeline.counters().snapshot().fetch_failures, 1);
    }
}
