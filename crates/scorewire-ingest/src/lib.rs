//! Ingestion side of the scorewire live-score service.
//!
//! Raw snapshots from untrusted upstream sources flow through a fixed
//! pipeline: validate, merge into the stored record, detect changes, fan
//! the changes out to broker topics. Each stage is its own module and a
//! pure function where possible; the [`pipeline`] module wires them
//! together with the per-key single-flight guard and the store.
//!
//! # Modules
//!
//! - [`validate`] -- the trust boundary for raw snapshots
//! - [`merge`] -- reconciliation of a snapshot with the stored record
//! - [`diff`] -- change detection between previous and merged state
//! - [`publish`] -- topic routing and the NATS publisher
//! - [`fetch`] -- the upstream snapshot source
//! - [`pipeline`] -- the per-snapshot cycle
//! - [`singleflight`] -- the per-key in-flight guard
//! - [`metrics`] -- ingest and publish counters
//! - [`error`] -- the failure taxonomy

pub mod diff;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod singleflight;
pub mod validate;

pub use diff::detect_changes;
pub use error::{FetchError, PipelineError, PublishError, ValidationError};
pub use fetch::{HttpSnapshotFetcher, SnapshotFetcher};
pub use merge::{merge_snapshot, MergeAnomaly, MergeOutcome};
pub use metrics::{IngestCounters, PublishCounters};
pub use pipeline::{IngestPipeline, PipelineOutcome};
pub use publish::{route, ChangePublisher, NatsPublisher};
pub use singleflight::{KeyLease, KeyLeases};
pub use validate::{validate_snapshot, RawEvent, RawScore, RawSnapshot, ValidatedSnapshot};
