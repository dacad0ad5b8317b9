//! Persisted per-conversation state machines.
//!
//! A [`ScenarioConfig`] is built once at startup. For every update the
//! [`ScenarioPopulateFilter`] restores the conversation's [`Scenario`] and
//! attaches it when one of its transitions accepts the update; the
//! [`ScenarioUpdateHandler`] then applies the update as an event.

pub mod config;
pub mod factory;
pub mod handler;
pub mod id;
pub mod persist;
pub mod populate;
pub mod scenario;
pub mod transition;

pub use config::{ScenarioConfig, ScenarioConfigBuilder};
pub use factory::ScenarioFactory;
pub use handler::ScenarioUpdateHandler;
pub use id::{
    InMemoryScenarioIdRepository, ScenarioIdData, ScenarioIdRepositoryAdapter, ScenarioIdResolver,
    SimpleScenarioIdResolver,
};
pub use persist::{InMemoryScenarioRepository, ScenarioPersister, ScenarioRepositoryAdapter};
pub use populate::ScenarioPopulateFilter;
pub use scenario::{Scenario, ScenarioEventResult};
pub use transition::{Action, ActionContext, Transition};

use std::fmt;
use std::hash::Hash;

/// Bound for scenario state values.
pub trait ScenarioState: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> ScenarioState for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
