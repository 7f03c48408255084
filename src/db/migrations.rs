//! Database lifecycle and schema migrations.
//!
//! The schema is versioned through a `schema_version` table. [`Database::new`]
//! opens (or creates) the file and brings it up to the latest version before
//! handing the pool to the rest of the engine, so every other query in this
//! module tree can assume the tables exist.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::Database;

fn open_err(detail: String) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(detail))
}

fn migration_err(step: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!("{step}: {e}")))
}

impl Database {
    /// Open the analytics database at `path`, creating the file and any
    /// missing parent directories, and migrate it to the current schema.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| open_err(format!("creating database directory: {e}")))?;
        }

        // WAL keeps readers (stats queries) from blocking the writer.
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| open_err(format!("invalid database path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| open_err(format!("opening {}: {e}", path.display())))?;

        let db = Self { pool };
        db.migrate_to_latest().await?;
        Ok(db)
    }

    async fn migrate_to_latest(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| open_err(format!("acquiring migration connection: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_err("creating schema_version table", e))?;

        let applied: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "reading schema version: {e}"
                )))
            })?;
        let applied = applied.unwrap_or(0);

        if applied < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: the outcomes log.
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // A half-applied version would wedge every later startup, so all of
        // v1 goes through one transaction.
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_err("starting migration v1", e))?;

        let steps = async {
            sqlx::query(
                "CREATE TABLE outcomes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    requester_id TEXT NOT NULL,
                    url TEXT NOT NULL,
                    fingerprint TEXT NOT NULL,
                    origin TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    error_kind TEXT,
                    size_bytes INTEGER,
                    duration_ms INTEGER NOT NULL,
                    cache_hit INTEGER NOT NULL,
                    created_at INTEGER NOT NULL
                )",
            )
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_err("creating outcomes table", e))?;

            sqlx::query("CREATE INDEX idx_outcomes_created ON outcomes(created_at DESC)")
                .execute(&mut *conn)
                .await
                .map_err(|e| migration_err("indexing outcomes.created_at", e))?;

            sqlx::query("CREATE INDEX idx_outcomes_requester ON outcomes(requester_id)")
                .execute(&mut *conn)
                .await
                .map_err(|e| migration_err("indexing outcomes.requester_id", e))?;

            Self::mark_applied(conn, 1).await
        }
        .await;

        if let Err(e) = steps {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_err("committing migration v1", e))?;

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    async fn mark_applied(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_err("recording applied version", e))?;
        Ok(())
    }

    /// Close the connection pool, waiting for in-flight queries to finish.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Borrow the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
