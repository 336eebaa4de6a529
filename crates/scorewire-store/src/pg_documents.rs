//! `PostgreSQL` implementation of the backing document store.
//!
//! Each match is one row: the canonical record as a JSONB document plus
//! denormalized scalar columns (`external_key`, participant pair, kickoff,
//! status) that carry the indexes used by lookups. The document is the
//! source of truth; the scalars are rewritten on every replace.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scorewire_types::{Match, TeamRef};
use sqlx::PgPool;

use crate::documents::MatchDocuments;
use crate::error::StoreError;
use crate::postgres::PostgresPool;

/// Match documents stored in `PostgreSQL`.
#[derive(Clone)]
pub struct PgMatchDocuments {
    pool: PgPool,
}

impl PgMatchDocuments {
    /// Create a document store backed by the given pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

fn decode(document: serde_json::Value) -> Result<Match, StoreError> {
    serde_json::from_value(document).map_err(StoreError::Serialization)
}

fn decode_rows(rows: Vec<(serde_json::Value,)>) -> Result<Vec<Match>, StoreError> {
    rows.into_iter().map(|(doc,)| decode(doc)).collect()
}

#[async_trait]
impl MatchDocuments for PgMatchDocuments {
    async fn get(&self, external_key: &str) -> Result<Option<Match>, StoreError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT document FROM matches WHERE external_key = $1")
                .bind(external_key)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(doc,)| decode(doc)).transpose()
    }

    async fn insert(&self, record: &Match) -> Result<(), StoreError> {
        let document = serde_json::to_value(record)?;
        sqlx::query(
            r"INSERT INTO matches
                  (id, external_key, home_team, away_team, kickoff, status, document, last_observed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id.into_inner())
        .bind(&record.external_key)
        .bind(record.home.as_str())
        .bind(record.away.as_str())
        .bind(record.kickoff)
        .bind(record.status.as_str())
        .bind(document)
        .bind(record.last_observed_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(external_key = record.external_key, "match inserted");
        Ok(())
    }

    async fn replace(&self, record: &Match) -> Result<(), StoreError> {
        let document = serde_json::to_value(record)?;
        let result = sqlx::query(
            r"UPDATE matches
              SET kickoff = $2, status = $3, document = $4, last_observed_at = $5
              WHERE external_key = $1",
        )
        .bind(&record.external_key)
        .bind(record.kickoff)
        .bind(record.status.as_str())
        .bind(document)
        .bind(record.last_observed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Unavailable(format!(
                "replace of missing key {}",
                record.external_key
            )));
        }
        Ok(())
    }

    async fn find_window(
        &self,
        home: &TeamRef,
        away: &TeamRef,
        center: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Vec<Match>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
            r"SELECT document FROM matches
              WHERE home_team = $1 AND away_team = $2
                AND kickoff BETWEEN $3 AND $4",
        )
        .bind(home.as_str())
        .bind(away.as_str())
        .bind(center - tolerance)
        .bind(center + tolerance)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    async fn list_active(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>, StoreError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
            r"SELECT document FROM matches
              WHERE status IN ('live', 'intermission')
                 OR (status = 'scheduled' AND kickoff BETWEEN $1 AND $2)
              ORDER BY kickoff",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }
}
