//! HTTP handlers, grouped by resource.

pub mod generations;
pub mod outputs;
pub mod process;
pub mod webhooks;
