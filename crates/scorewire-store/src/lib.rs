//! Data layer for the scorewire live-score service.
//!
//! `PostgreSQL` holds the canonical match records as JSONB documents with
//! denormalized lookup columns. The rest of the system never talks SQL:
//! it goes through [`MatchStore`], which owns upsert-by-external-key and
//! duplicate-detection semantics over the opaque [`MatchDocuments`] trait.
//!
//! # Modules
//!
//! - [`postgres`] -- connection pool and migrations
//! - [`documents`] -- the backing-store trait and the in-memory implementation
//! - [`pg_documents`] -- the `PostgreSQL` implementation
//! - [`match_store`] -- upsert and proximity-based duplicate detection
//! - [`error`] -- shared error types

pub mod documents;
pub mod error;
pub mod match_store;
pub mod pg_documents;
pub mod postgres;

// Re-export primary types for convenience.
pub use documents::{MatchDocuments, MemoryDocuments};
pub use error::StoreError;
pub use match_store::MatchStore;
pub use pg_documents::PgMatchDocuments;
pub use postgres::{PostgresConfig, PostgresPool};
