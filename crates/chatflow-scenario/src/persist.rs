use std::sync::Arc;

use chatflow_core::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::ScenarioState;

/// Storage for scenario states, keyed by scenario id.
pub trait ScenarioRepositoryAdapter<S>: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<S>>;

    fn save(&self, id: &str, state: &S) -> Result<()>;
}

/// Process-local storage. Lost on restart.
pub struct InMemoryScenarioRepository<S> {
    states: DashMap<String, S>,
}

impl<S> InMemoryScenarioRepository<S> {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<S> Default for InMemoryScenarioRepository<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ScenarioState> ScenarioRepositoryAdapter<S> for InMemoryScenarioRepository<S> {
    fn load(&self, id: &str) -> Result<Option<S>> {
        Ok(self.states.get(id).map(|s| s.value().clone()))
    }

    fn save(&self, id: &str, state: &S) -> Result<()> {
        self.states.insert(id.to_string(), state.clone());
        Ok(())
    }
}

/// Loads and saves scenario states through an optional adapter.
///
/// Without an adapter every conversation starts from the initial state and
/// nothing survives the request.
pub struct ScenarioPersister<S> {
    adapter: Option<Arc<dyn ScenarioRepositoryAdapter<S>>>,
}

impl<S: ScenarioState> ScenarioPersister<S> {
    pub fn new(adapter: Option<Arc<dyn ScenarioRepositoryAdapter<S>>>) -> Self {
        Self { adapter }
    }

    /// Stored state for `id`, if any.
    pub fn restore(&self, id: &str) -> Result<Option<S>> {
        match &self.adapter {
            Some(adapter) => {
                let state = adapter.load(id)?;
                debug!(scenario_id = id, ?state, "scenario state restored");
                Ok(state)
            }
            None => Ok(None),
        }
    }

    pub fn persist(&self, id: &str, state: &S) -> Result<()> {
        if let Some(adapter) = &self.adapter {
            adapter.save(id, state)?;
            debug!(scenario_id = id, ?state, "scenario state persisted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_roundtrip() {
        let repo = InMemoryScenarioRepository::<u8>::new();
        assert!(repo.load("a").unwrap().is_none());
        repo.save("a", &3).unwrap();
        assert_eq!(repo.load("a").unwrap(), Some(3));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn persister_without_adapter_is_stateless() {
        let persister = ScenarioPersister::<u8>::new(None);
        persister.persist("a", &1).unwrap();
        assert!(persister.restore("a").unwrap().is_none());
    }
}
