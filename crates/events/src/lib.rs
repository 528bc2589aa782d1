//! In-process event bus for generation lifecycle events.

pub mod bus;

pub use bus::{EventBus, PipelineEvent};
