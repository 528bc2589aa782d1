//! Provider adapter seam.
//!
//! An AI provider is anything that accepts a prompt plus parameters and
//! either returns outputs synchronously or accepts the work and completes
//! it later via webhook. The [`Provider`](adapter::Provider) trait is the
//! only surface the pipeline sees; concrete adapters live behind it.

pub mod adapter;
pub mod http;
pub mod registry;
pub mod stub;

pub use adapter::{
    MediaType, OutputPayload, Provider, ProviderOutput, ProviderRequest, ProviderResponse,
    ProviderSuccess,
};
pub use registry::ProviderRegistry;
