use std::sync::Arc;

use chatflow_core::Result;

use crate::config::ScenarioConfig;
use crate::id::ScenarioIdResolver;
use crate::persist::ScenarioPersister;
use crate::scenario::Scenario;
use crate::ScenarioState;

/// Builds scenario instances for a single config.
pub struct ScenarioFactory<S> {
    config: Arc<ScenarioConfig<S>>,
    persister: Arc<ScenarioPersister<S>>,
    id_resolver: Arc<dyn ScenarioIdResolver>,
}

impl<S: ScenarioState> ScenarioFactory<S> {
    pub fn new(
        config: ScenarioConfig<S>,
        persister: ScenarioPersister<S>,
        id_resolver: Arc<dyn ScenarioIdResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            persister: Arc::new(persister),
            id_resolver,
        }
    }

    pub fn id_resolver(&self) -> &dyn ScenarioIdResolver {
        self.id_resolver.as_ref()
    }

    /// A scenario at the initial state.
    pub fn create(&self, id: impl Into<String>) -> Scenario<S> {
        self.at(id.into(), self.config.initial_state().clone())
    }

    /// A scenario at its stored state, or at the initial state when nothing
    /// is stored under `id`.
    pub fn restore(&self, id: &str) -> Result<Scenario<S>> {
        let state = self
            .persister
            .restore(id)?
            .unwrap_or_else(|| self.config.initial_state().clone());
        Ok(self.at(id.to_string(), state))
    }

    fn at(&self, id: String, state: S) -> Scenario<S> {
        Scenario::new(
            id,
            state,
            Arc::clone(&self.config),
            Arc::clone(&self.persister),
            Arc::clone(&self.id_resolver),
        )
    }
}
