//! Output entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use lumen_core::types::{DbId, Timestamp};

/// A row from the `outputs` table: one produced artifact belonging to a
/// generation. Immutable once created except for the `starred` flag.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Output {
    pub id: DbId,
    pub generation_id: DbId,
    pub file_url: String,
    pub media_type: String,
    pub width: i32,
    pub height: i32,
    pub duration_secs: Option<f64>,
    pub starred: bool,
    pub created_at: Timestamp,
}

/// DTO for bulk-creating outputs on the completion path.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOutput {
    pub file_url: String,
    pub media_type: String,
    pub width: i32,
    pub height: i32,
    pub duration_secs: Option<f64>,
}
