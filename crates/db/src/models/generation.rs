//! Generation entity model and DTOs.
//!
//! A generation is the durable record of one user-initiated creative
//! request. Exactly one row exists per request; retries mutate the same
//! row, and it is never deleted while non-terminal.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use lumen_core::params::GenerationParams;
use lumen_core::types::{DbId, Timestamp};

use super::status::{is_terminal, StatusId};

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    pub session_id: DbId,
    pub user_id: DbId,
    pub model_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: serde_json::Value,
    pub status_id: StatusId,
    pub cost_cents: Option<i64>,
    pub error_message: Option<String>,
    pub error_kind: Option<String>,
    pub error_at: Option<Timestamp>,
    pub last_heartbeat_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Generation {
    /// Deserialize the typed parameter bag from the raw JSONB column.
    ///
    /// Rows written before a params field existed deserialize with that
    /// field defaulted, so this cannot fail on old data; a genuinely
    /// corrupt column falls back to an empty bag.
    pub fn parsed_params(&self) -> GenerationParams {
        serde_json::from_value(self.params.clone()).unwrap_or_default()
    }

    /// Whether this row has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        is_terminal(self.status_id)
    }
}

/// DTO for creating a generation (admission handler).
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub session_id: DbId,
    pub user_id: DbId,
    pub model_id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub params: GenerationParams,
}

/// Structured error context written alongside a `failed` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationError {
    pub message: String,
    pub kind: String,
}
