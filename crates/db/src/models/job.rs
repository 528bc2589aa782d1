//! Queue-mode job model.
//!
//! A job is an ephemeral claim ticket referencing a generation awaiting
//! processing. Its lock is advisory and time-bounded: an expired lock is
//! eligible for re-claim by any worker.

use serde::Serialize;
use sqlx::FromRow;

use lumen_core::types::{DbId, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub generation_id: DbId,
    pub locked_at: Option<Timestamp>,
    pub attempts: i32,
    pub run_after: Option<Timestamp>,
    pub created_at: Timestamp,
}
