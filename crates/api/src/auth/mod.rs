//! Authentication building blocks: JWT config and token helpers.

pub mod jwt;
