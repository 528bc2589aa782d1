//! Creative session model.
//!
//! Sessions are owned by the broader platform; the pipeline only reads
//! them for the admission handler's existence and ownership checks.

use serde::Serialize;
use sqlx::FromRow;

use lumen_core::types::{DbId, Timestamp};

/// A row from the `creative_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreativeSession {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}
