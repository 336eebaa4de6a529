//! Error types for the data layer.
//!
//! Every variant is treated identically by the ingestion pipeline: the
//! current entity's cycle is aborted and retried on a later poll. Store
//! errors never partially apply a merge and never escalate beyond one
//! entity.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `PostgreSQL` operation failed (connection, timeout, constraint).
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored document could not be decoded.
    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store is unreachable or unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A configuration error (bad URL, bad pool parameters).
    #[error("store configuration error: {0}")]
    Config(String),
}
