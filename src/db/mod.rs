//! Analytics database layer for media-dl
//!
//! SQLite persistence for the per-job outcome log. This is an
//! observability record, not engine state: the queue, cache, and rate
//! tables are in-memory only, and every write here is treated as
//! best-effort by the caller. [`migrations`] owns the connection
//! lifecycle and schema; [`outcomes`] holds the insert and query
//! operations.

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod outcomes;

/// Recorded outcome row, one per completed fetch job
#[derive(Debug, Clone, FromRow)]
pub struct OutcomeRow {
    /// Rowid, assigned on insert
    pub id: i64,
    /// Requester the job belonged to
    pub requester_id: String,
    /// Source URL as submitted
    pub url: String,
    /// Fingerprint of the normalized source URL
    pub fingerprint: String,
    /// Origin label ("tiktok", "youtube", ..., "unknown")
    pub origin: String,
    /// Whether the job produced an artifact
    pub success: bool,
    /// Failure classification code when the job failed
    pub error_kind: Option<String>,
    /// Artifact size in bytes when the job succeeded
    pub size_bytes: Option<i64>,
    /// Wall-clock job duration in milliseconds
    pub duration_ms: i64,
    /// Whether the artifact came from the cache instead of a fetch
    pub cache_hit: bool,
    /// Unix timestamp when the outcome was recorded
    pub created_at: i64,
}

/// Handle to the analytics database
pub struct Database {
    pool: SqlitePool,
}
