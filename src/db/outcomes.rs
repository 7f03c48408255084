//! Outcome log operations.

use crate::types::{Outcome, OutcomeTotals};
use crate::{Error, Result};

use super::{Database, OutcomeRow};

impl Database {
    /// Insert a completed job outcome into the log
    ///
    /// Called once per terminal job state (delivered, failed, or cache hit).
    /// Returns the ID of the inserted row.
    pub async fn record_outcome(&self, outcome: &Outcome) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO outcomes (
                requester_id, url, fingerprint, origin, success,
                error_kind, size_bytes, duration_ms, cache_hit, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(outcome.requester_id.as_str())
        .bind(&outcome.url)
        .bind(outcome.fingerprint.as_str())
        .bind(outcome.origin.as_str())
        .bind(outcome.success)
        .bind(outcome.error_kind.map(|k| k.as_str()))
        .bind(outcome.size_bytes.map(|s| s as i64))
        .bind(outcome.duration_ms as i64)
        .bind(outcome.cache_hit)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Query the most recent outcomes, newest first
    pub async fn recent_outcomes(&self, limit: usize) -> Result<Vec<OutcomeRow>> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            r#"
            SELECT id, requester_id, url, fingerprint, origin, success,
                   error_kind, size_bytes, duration_ms, cache_hit, created_at
            FROM outcomes
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows)
    }

    /// Aggregate counters over the whole outcome log
    pub async fn outcome_totals(&self) -> Result<OutcomeTotals> {
        let (total, succeeded, failed, cache_hits) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN success THEN 0 ELSE 1 END), 0),
                   COALESCE(SUM(CASE WHEN cache_hit THEN 1 ELSE 0 END), 0)
            FROM outcomes
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(OutcomeTotals {
            total,
            succeeded,
            failed,
            cache_hits,
        })
    }

    /// Count outcomes recorded for a single requester
    pub async fn count_outcomes_for_requester(&self, requester_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outcomes WHERE requester_id = ?")
                .bind(requester_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sqlx)?;

        Ok(count)
    }

    /// Delete outcomes recorded before `before_timestamp`, returning how
    /// many rows went away.
    pub async fn delete_outcomes_before(&self, before_timestamp: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM outcomes WHERE created_at < ?")
            .bind(before_timestamp)
            .execute(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(result.rows_affected())
    }
}
