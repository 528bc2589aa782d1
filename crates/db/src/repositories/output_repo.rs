//! Repository for the `outputs` table.

use sqlx::PgPool;

use lumen_core::types::DbId;

use crate::models::output::{CreateOutput, Output};

/// Column list for `outputs` queries.
const COLUMNS: &str =
    "id, generation_id, file_url, media_type, width, height, duration_secs, starred, created_at";

/// Provides persistence operations for generation outputs.
pub struct OutputRepo;

impl OutputRepo {
    /// Bulk-insert outputs for a generation inside one transaction.
    ///
    /// Only the completion routine calls this, and only after winning the
    /// `processing -> completed` transition, so a generation ends up with
    /// exactly one set of output rows.
    pub async fn create_many(
        pool: &PgPool,
        generation_id: DbId,
        outputs: &[CreateOutput],
    ) -> Result<Vec<Output>, sqlx::Error> {
        let query = format!(
            "INSERT INTO outputs \
                 (generation_id, file_url, media_type, width, height, duration_secs) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(outputs.len());
        for output in outputs {
            let row = sqlx::query_as::<_, Output>(&query)
                .bind(generation_id)
                .bind(&output.file_url)
                .bind(&output.media_type)
                .bind(output.width)
                .bind(output.height)
                .bind(output.duration_secs)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }
        tx.commit().await?;
        Ok(created)
    }

    /// All outputs for a generation, in insertion order.
    pub async fn list_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Vec<Output>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outputs WHERE generation_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(generation_id)
            .fetch_all(pool)
            .await
    }

    /// Count outputs for a generation.
    pub async fn count_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outputs WHERE generation_id = $1")
            .bind(generation_id)
            .fetch_one(pool)
            .await
    }

    /// Find an output by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Output>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outputs WHERE id = $1");
        sqlx::query_as::<_, Output>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the user-toggled starred flag. Returns the updated row.
    pub async fn set_starred(
        pool: &PgPool,
        id: DbId,
        starred: bool,
    ) -> Result<Option<Output>, sqlx::Error> {
        let query = format!(
            "UPDATE outputs SET starred = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Output>(&query)
            .bind(id)
            .bind(starred)
            .fetch_optional(pool)
            .await
    }
}
