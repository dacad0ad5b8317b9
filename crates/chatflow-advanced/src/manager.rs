use std::sync::Arc;

use chatflow_core::{FlowError, Result};
use tracing::{debug, warn};

use crate::context::UserScenarioContext;
use crate::scenario::{AdvancedScenario, AdvancedScenarioConfig};

const LOOP_WARN_INTERVAL: u64 = 1000;

/// Registry of named scenarios plus a cursor on the current one.
///
/// Built for a single run and dropped afterwards, so the cursor never
/// outlives the update that moved it.
#[derive(Default)]
pub struct AdvancedScenarioManager {
    /// Registration order is kept so dispatch is deterministic.
    scenarios: Vec<(String, Arc<dyn AdvancedScenario>)>,
    current: Option<String>,
}

impl AdvancedScenarioManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[AdvancedScenarioConfig]) -> Self {
        let mut manager = Self::new();
        for config in configs {
            manager.add_scenario(config.name.clone(), Arc::clone(&config.scenario));
        }
        manager
    }

    /// Registering a name twice replaces the earlier scenario in place.
    pub fn add_scenario(&mut self, name: impl Into<String>, scenario: Arc<dyn AdvancedScenario>) {
        let name = name.into();
        match self.scenarios.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = scenario,
            None => self.scenarios.push((name, scenario)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|(n, _)| n.as_str())
    }

    pub fn set_current(&mut self, name: &str) -> Result<()> {
        if !self.scenarios.iter().any(|(n, _)| n == name) {
            return Err(FlowError::ScenarioNotFound {
                name: name.to_string(),
            });
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Arc<dyn AdvancedScenario>> {
        let name = self.current.as_deref()?;
        self.get(name)
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn AdvancedScenario>> {
        self.scenarios.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// The current scenario if one is selected, otherwise every scenario.
    pub fn active_scenarios(&self) -> Vec<(&str, &Arc<dyn AdvancedScenario>)> {
        match &self.current {
            Some(name) => self
                .get(name)
                .map(|s| vec![(name.as_str(), s)])
                .unwrap_or_default(),
            None => self.scenarios.iter().map(|(n, s)| (n.as_str(), s)).collect(),
        }
    }

    /// Run the current scenario until the context reports the end, following
    /// every hand-off on the way.
    ///
    /// There is no iteration cap. A cycle of hand-offs that never ends the
    /// run keeps looping and logs a warning every thousand steps.
    pub fn process(&mut self, ctx: &mut UserScenarioContext<'_>) -> Result<()> {
        let mut steps: u64 = 0;
        while !ctx.is_end {
            let name = self.current.clone().unwrap_or_default();
            let scenario = self
                .get(&name)
                .cloned()
                .ok_or_else(|| FlowError::ScenarioNotFound { name: name.clone() })?;

            scenario.process(ctx)?;

            if let Some(next) = ctx.next_scenario.take() {
                debug!(from = %name, to = %next, "advanced scenario hand-off");
                self.set_current(&next)?;
            }

            steps += 1;
            if steps % LOOP_WARN_INTERVAL == 0 {
                warn!(
                    scenario = %name,
                    steps,
                    "advanced scenario run has not ended; possible hand-off cycle"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::scenario::FnScenario;
    use chatflow_core::{Response, Update, UpdateRequest};

    fn scenario<F>(step: F) -> Arc<dyn AdvancedScenario>
    where
        F: Fn(&mut UserScenarioContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Arc::new(FnScenario::new(Vec::new(), step))
    }

    fn request() -> UpdateRequest {
        UpdateRequest::new(Update::message(1, 2, 3, "go"))
    }

    #[test]
    fn hand_off_continues_until_end() {
        let mut manager = AdvancedScenarioManager::new();
        manager.add_scenario("x", scenario(|ctx| {
            ctx.set("visited", "x");
            ctx.hand_off("y");
            Ok(())
        }));
        manager.add_scenario("y", scenario(|ctx| {
            assert_eq!(ctx.get("visited").and_then(|v| v.as_str()), Some("x"));
            ctx.reply(Response::text("from y"));
            ctx.end();
            Ok(())
        }));
        manager.set_current("x").unwrap();

        let request = request();
        let mut ctx = UserScenarioContext::new(&request, None);
        manager.process(&mut ctx).unwrap();

        assert!(ctx.is_end);
        assert!(ctx.next_scenario.is_none());
        assert_eq!(manager.current_name(), Some("y"));
        assert!(matches!(ctx.response, Some(Response::SimpleMessage { .. })));
    }

    #[test]
    fn scenario_runs_repeatedly_until_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut manager = AdvancedScenarioManager::new();
        manager.add_scenario("count", scenario(move |ctx| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                ctx.end();
            }
            Ok(())
        }));
        manager.set_current("count").unwrap();

        let request = request();
        let mut ctx = UserScenarioContext::new(&request, None);
        manager.process(&mut ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn error_propagates_unchanged() {
        let mut manager = AdvancedScenarioManager::new();
        manager.add_scenario("x", scenario(|_| Err(FlowError::Storage("disk".to_string()))));
        manager.set_current("x").unwrap();

        let request = request();
        let mut ctx = UserScenarioContext::new(&request, None);
        assert!(matches!(manager.process(&mut ctx), Err(FlowError::Storage(_))));
    }

    #[test]
    fn unknown_scenario_rejected() {
        let mut manager = AdvancedScenarioManager::new();
        assert!(matches!(
            manager.set_current("missing"),
            Err(FlowError::ScenarioNotFound { .. })
        ));

        manager.add_scenario("x", scenario(|ctx| {
            ctx.hand_off("missing");
            Ok(())
        }));
        manager.set_current("x").unwrap();
        let request = request();
        let mut ctx = UserScenarioContext::new(&request, None);
        assert!(matches!(
            manager.process(&mut ctx),
            Err(FlowError::ScenarioNotFound { .. })
        ));
    }

    #[test]
    fn active_scenarios_follow_cursor() {
        let mut manager = AdvancedScenarioManager::new();
        manager.add_scenario("a", scenario(|_| Ok(())));
        manager.add_scenario("b", scenario(|_| Ok(())));
        let all: Vec<&str> = manager.active_scenarios().into_iter().map(|(n, _)| n).collect();
        assert_eq!(all, ["a", "b"]);

        manager.set_current("b").unwrap();
        let current: Vec<&str> = manager.active_scenarios().into_iter().map(|(n, _)| n).collect();
        assert_eq!(current, ["b"]);
    }
}
