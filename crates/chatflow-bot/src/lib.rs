//! Pipeline orchestration and the composition root.
//!
//! [`BotBuilder`] turns a [`FlowConfig`](chatflow_core::config::FlowConfig)
//! plus the application's routes, scenarios and filters into a [`Bot`].

pub mod builder;
pub mod dispatcher;
pub mod exception;
pub mod pipeline;

pub use builder::{Bot, BotBuilder};
pub use dispatcher::UpdateDispatcher;
pub use exception::DefaultExceptionHandler;
pub use pipeline::{HandleOutcome, UpdatePipeline};
