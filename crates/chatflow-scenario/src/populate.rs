use std::sync::Arc;

use chatflow_core::{ActiveScenario, Result, UpdateRequest};
use chatflow_filters::PreFilter;
use tracing::debug;

use crate::factory::ScenarioFactory;
use crate::scenario::Scenario;
use crate::ScenarioState;

/// Restores the conversation's scenario and attaches it when it can accept
/// the update.
///
/// Candidates are tried in order: every id the resolver reports, then the
/// fallback id, then a freshly generated id at the initial state. The first
/// candidate with a transition accepting the update wins. If none does, no
/// scenario is attached and the request goes on to the other handlers.
pub struct ScenarioPopulateFilter<S> {
    factory: Arc<ScenarioFactory<S>>,
}

impl<S: ScenarioState> ScenarioPopulateFilter<S> {
    pub fn new(factory: Arc<ScenarioFactory<S>>) -> Self {
        Self { factory }
    }

    fn find(&self, request: &UpdateRequest) -> Result<Option<Scenario<S>>> {
        let data = self.factory.id_resolver().resolve_id(request)?;

        for id in data.ids.iter().chain(data.fallback_id.iter()) {
            let scenario = self.factory.restore(id)?;
            if scenario.matches(request) {
                return Ok(Some(scenario));
            }
        }

        let id = self.factory.id_resolver().generate_id(request);
        let scenario = self.factory.create(id);
        Ok(scenario.matches(request).then_some(scenario))
    }
}

impl<S: ScenarioState> PreFilter for ScenarioPopulateFilter<S> {
    fn name(&self) -> &str {
        "scenario-populate"
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        match self.find(request)? {
            Some(scenario) => {
                debug!(scenario_id = scenario.id(), state = ?scenario.state(), "scenario attached");
                request.accessor_mut().set_scenario(Box::new(scenario));
            }
            None => debug!("no scenario accepts the update"),
        }
        Ok(())
    }
}
