//! Repository for the `jobs` table (queue mode).
//!
//! Claiming uses `UPDATE ... WHERE id IN (SELECT ... FOR UPDATE SKIP
//! LOCKED)` so two concurrent workers can never claim the same job while
//! its lock is live. This is the only place in the pipeline that needs
//! true mutual exclusion; everything else is handled by the generation
//! status guard.

use sqlx::PgPool;

use lumen_core::types::DbId;

use crate::models::job::Job;

/// Column list for `jobs` queries.
const COLUMNS: &str = "id, generation_id, locked_at, attempts, run_after, created_at";

/// Provides claim/resolve operations for queue-mode jobs.
pub struct JobRepo;

impl JobRepo {
    /// Enqueue a job for a generation. Returns the created row.
    pub async fn enqueue(pool: &PgPool, generation_id: DbId) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (generation_id) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(generation_id)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim up to `batch_size` jobs.
    ///
    /// A job is claimable when its lock is absent or older than
    /// `lock_timeout_secs` (crash/abandonment recovery) and its
    /// `run_after`, if set, has elapsed. Claimed rows get a fresh lock
    /// timestamp and an incremented attempt counter in the same statement.
    pub async fn claim(
        pool: &PgPool,
        batch_size: i64,
        lock_timeout_secs: i64,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET locked_at = NOW(), attempts = attempts + 1 \
             WHERE id IN ( \
                 SELECT id FROM jobs \
                 WHERE (locked_at IS NULL \
                        OR locked_at < NOW() - $2 * INTERVAL '1 second') \
                   AND (run_after IS NULL OR run_after <= NOW()) \
                 ORDER BY created_at ASC \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(batch_size)
            .bind(lock_timeout_secs)
            .fetch_all(pool)
            .await
    }

    /// Resolve a job terminally (success, skip, or generation not found):
    /// delete the row so it can never be claimed again.
    pub async fn delete(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a job as failed: clear the lock so it becomes reclaimable
    /// and push `run_after` out by `retry_delay_secs`. The attempts
    /// counter is retained for future escalation.
    pub async fn release_for_retry(
        pool: &PgPool,
        job_id: DbId,
        retry_delay_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET locked_at = NULL, \
                 run_after = NOW() + $2 * INTERVAL '1 second' \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(retry_delay_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find the job for a generation, if one exists.
    pub async fn find_by_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE generation_id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(generation_id)
            .fetch_optional(pool)
            .await
    }
}
