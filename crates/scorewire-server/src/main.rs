//! Service binary for the scorewire live-score system.
//!
//! Wires the whole service together: the `PostgreSQL`-backed match store,
//! the NATS publisher, the ingestion pipeline, the poll scheduler, the
//! gateway WebSocket server and the broker-to-client bridge. Runs until
//! `Ctrl-C`, then flips the shutdown signal and waits for the background
//! tasks to drain.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `scorewire.yaml` (or `SCOREWIRE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Connect the NATS publisher
//! 5. Start the gateway server, bridge and idle-connection sweep
//! 6. Start the poll scheduler
//! 7. Wait for `Ctrl-C`

mod config;
mod scheduler;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use scorewire_gateway::{
    run_bridge, start_server, AppState, HeartbeatConfig, ServerConfig, SubscriptionBroker,
};
use scorewire_ingest::{
    HttpSnapshotFetcher, IngestCounters, IngestPipeline, NatsPublisher, PublishCounters,
};
use scorewire_store::{MatchStore, PgMatchDocuments, PostgresPool};

use crate::config::ServiceConfig;
use crate::scheduler::{PollScheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config_path =
        std::env::var("SCOREWIRE_CONFIG").unwrap_or_else(|_| String::from("scorewire.yaml"));
    let config = if Path::new(&config_path).exists() {
        ServiceConfig::from_file(Path::new(&config_path))?
    } else {
        ServiceConfig::parse("{}")?
    };

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone()));
    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("scorewire starting");

    // 3. Connect to PostgreSQL and run migrations.
    let pool = PostgresPool::connect_url(&config.infrastructure.postgres_url).await?;
    pool.run_migrations().await?;
    let store = MatchStore::new(Arc::new(PgMatchDocuments::new(&pool)));
    info!("database connected, migrations applied");

    // 4. Connect the NATS publisher.
    let publish_counters = Arc::new(PublishCounters::new());
    let publisher = NatsPublisher::connect(
        &config.infrastructure.nats_url,
        Arc::clone(&publish_counters),
    )
    .await?;
    info!(url = config.infrastructure.nats_url, "publisher connected");

    let ingest_counters = Arc::new(IngestCounters::new());
    let pipeline = Arc::new(IngestPipeline::new(
        store.clone(),
        Arc::new(publisher),
        Arc::clone(&ingest_counters),
        chrono::Duration::hours(config.ingest.duplicate_tolerance_hours),
    ));

    let fetcher = Arc::new(HttpSnapshotFetcher::new(
        config.ingest.feed_url_template.clone(),
        config.ingest.fixtures_url.clone(),
        Duration::from_secs(config.ingest.fetch_timeout_secs),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 5. Start the gateway server, bridge and sweep.
    let broker = Arc::new(SubscriptionBroker::new(
        config.gateway.outbox_capacity,
        Duration::from_secs(config.gateway.idle_timeout_secs),
    ));
    let app_state = Arc::new(AppState::new(Arc::clone(&broker)).with_heartbeat(
        HeartbeatConfig {
            interval: Duration::from_secs(config.gateway.heartbeat_interval_secs),
            timeout: Duration::from_secs(config.gateway.heartbeat_timeout_secs),
        },
    ));

    let bridge_handle = tokio::spawn(run_bridge(
        config.infrastructure.nats_url.clone(),
        Arc::clone(&broker),
        Arc::clone(&app_state.bridge),
        shutdown_rx.clone(),
    ));

    let sweep_handle = {
        let broker = Arc::clone(&broker);
        let mut shutdown = shutdown_rx.clone();
        let every = Duration::from_secs(config.gateway.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let swept = broker.sweep();
                        if swept > 0 {
                            debug!(swept, "idle connections swept");
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }
        })
    };

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let server_state = Arc::clone(&app_state);
    let server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_config, server_state, server_shutdown).await {
            error!(error = %e, "gateway server exited with error");
        }
    });
    info!(port = config.gateway.port, "gateway started");

    // 6. Start the poll scheduler.
    let scheduler = PollScheduler::new(
        store,
        fetcher,
        Arc::clone(&pipeline),
        SchedulerConfig {
            live_interval: Duration::from_secs(config.ingest.live_poll_interval_secs),
            idle_interval: Duration::from_secs(config.ingest.idle_poll_interval_secs),
            poll_lead: chrono::Duration::hours(config.ingest.poll_lead_hours),
        },
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));
    info!(
        live_poll_secs = config.ingest.live_poll_interval_secs,
        idle_poll_secs = config.ingest.idle_poll_interval_secs,
        "poll scheduler started"
    );

    // 7. Wait for Ctrl-C, then drain.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    shutdown_tx.send(true).ok();
    let _ = scheduler_handle.await;
    let _ = bridge_handle.await;
    let _ = sweep_handle.await;
    let _ = server_handle.await;
    pool.close().await;

    info!(
        accepted = ingest_counters.snapshot().snapshots_accepted,
        published = publish_counters.snapshot().published,
        "scorewire stopped"
    );
    Ok(())
}
