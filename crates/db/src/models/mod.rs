//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for the operations that mutate it

pub mod generation;
pub mod job;
pub mod output;
pub mod session;
pub mod status;
