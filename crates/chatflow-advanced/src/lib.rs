//! Named scenario graphs that hand control to each other within one run.
//!
//! Unlike the persisted state machines in `chatflow-scenario`, an advanced
//! scenario keeps no state of its own between updates. All it carries over is
//! an opaque JSON payload stored per conversation, and every run ends before
//! the update handler returns.

pub mod context;
pub mod handler;
pub mod manager;
pub mod scenario;
pub mod storage;

pub use context::UserScenarioContext;
pub use handler::AdvancedScenarioUpdateHandler;
pub use manager::AdvancedScenarioManager;
pub use scenario::{AdvancedScenario, AdvancedScenarioConfig, FnScenario};
pub use storage::{AdvancedScenarioEntity, AdvancedScenarioStorage, InMemoryAdvancedScenarioStorage};
