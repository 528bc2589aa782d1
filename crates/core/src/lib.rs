//! Lumen core domain logic.
//!
//! Pure types and functions shared across the generation pipeline: the
//! error taxonomy, the typed generation parameter bag, cost computation,
//! webhook signature verification, and retry/backoff schedules. No I/O
//! happens in this crate.

pub mod backoff;
pub mod cost;
pub mod error;
pub mod params;
pub mod signature;
pub mod types;
