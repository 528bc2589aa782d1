//! Repository for the `creative_sessions` table.
//!
//! Sessions are owned by the broader platform; the pipeline only needs a
//! lookup for the admission handler's checks, plus a create used by tests
//! and local seeding.

use sqlx::PgPool;

use lumen_core::types::DbId;

use crate::models::session::CreativeSession;

/// Column list for `creative_sessions` queries.
const COLUMNS: &str = "id, user_id, name, created_at";

/// Read access to creative sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Find a session by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CreativeSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM creative_sessions WHERE id = $1");
        sqlx::query_as::<_, CreativeSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a session, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        name: &str,
    ) -> Result<CreativeSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO creative_sessions (user_id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreativeSession>(&query)
            .bind(user_id)
            .bind(name)
            .fetch_one(pool)
            .await
    }
}
