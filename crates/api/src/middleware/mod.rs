//! Request extractors: end-user JWT auth and internal-caller auth.

pub mod auth;

pub use auth::{AuthUser, ProcessCaller};
