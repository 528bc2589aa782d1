//! Repository for the `generations` table.
//!
//! All transitions out of `processing` are conditional updates
//! (`... AND status_id = processing`), so concurrent completion paths
//! resolve to exactly one winner at the database rather than relying on
//! read-then-write status checks.

use sqlx::PgPool;

use lumen_core::types::DbId;

use crate::models::generation::{CreateGeneration, Generation};
use crate::models::status::{GenerationStatus, StatusId};

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, session_id, user_id, model_id, prompt, negative_prompt, params, \
    status_id, cost_cents, error_message, error_kind, error_at, \
    last_heartbeat_at, created_at, updated_at";

/// Maximum page size for generation listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for generation listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides persistence operations for generations.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new generation in `processing` status, returning the row.
    pub async fn create(pool: &PgPool, input: &CreateGeneration) -> Result<Generation, sqlx::Error> {
        let params = serde_json::to_value(&input.params)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = format!(
            "INSERT INTO generations \
                 (session_id, user_id, model_id, prompt, negative_prompt, params, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(input.session_id)
            .bind(input.user_id)
            .bind(&input.model_id)
            .bind(&input.prompt)
            .bind(&input.negative_prompt)
            .bind(params)
            .bind(GenerationStatus::Processing.id())
            .fetch_one(pool)
            .await
    }

    /// Find a generation by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a generation by the provider correlation id stored in its
    /// parameter bag. Used by the webhook completion path.
    pub async fn find_by_correlation(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE params->>'provider_correlation' = $1"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(correlation_id)
            .fetch_optional(pool)
            .await
    }

    /// Current status of a generation, if it exists. Cheap re-read used by
    /// idempotency guards.
    pub async fn status(pool: &PgPool, id: DbId) -> Result<Option<StatusId>, sqlx::Error> {
        sqlx::query_scalar::<_, StatusId>("SELECT status_id FROM generations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's generations, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Overwrite the parameter bag (trail markers, correlation id,
    /// rewritten reference pointers).
    pub async fn set_params(
        pool: &PgPool,
        id: DbId,
        params: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generations SET params = $2 WHERE id = $1")
            .bind(id)
            .bind(params)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Write a heartbeat: updated parameter bag plus `last_heartbeat_at`.
    pub async fn record_heartbeat(
        pool: &PgPool,
        id: DbId,
        params: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE generations SET params = $2, last_heartbeat_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(params)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition `processing -> completed`, attaching the cost atomically.
    ///
    /// Returns `true` if this caller won the transition; `false` means the
    /// row was already terminal (another completion path got there first).
    pub async fn complete_if_processing(
        pool: &PgPool,
        id: DbId,
        cost_cents: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, cost_cents = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(cost_cents)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition `processing -> failed` with structured error context.
    pub async fn fail_if_processing(
        pool: &PgPool,
        id: DbId,
        message: &str,
        kind: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_message = $3, error_kind = $4, error_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(message)
        .bind(kind)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition `processing -> cancelled` (user-initiated).
    pub async fn cancel_if_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status_id = $2 WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(GenerationStatus::Cancelled.id())
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition to `dismissed`.
    ///
    /// Dismissal hides stuck or failed rows from the UI without deleting
    /// history, so it is allowed from `processing` and `failed` only.
    pub async fn dismiss(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2 \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(GenerationStatus::Dismissed.id())
        .bind(GenerationStatus::Processing.id())
        .bind(GenerationStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rows still in `processing` created more than `min_age_secs` ago.
    /// Input to the stuck-generation sweep; classification happens in the
    /// pipeline, not here.
    pub async fn find_processing_older_than(
        pool: &PgPool,
        min_age_secs: i64,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE status_id = $1 \
               AND created_at < NOW() - $2 * INTERVAL '1 second' \
             ORDER BY created_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(GenerationStatus::Processing.id())
            .bind(min_age_secs)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
