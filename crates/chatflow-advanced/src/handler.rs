use std::sync::Arc;

use chatflow_core::{Response, Result, UpdateHandler, UpdateRequest};
use tracing::debug;

use crate::context::UserScenarioContext;
use crate::manager::AdvancedScenarioManager;
use crate::scenario::AdvancedScenarioConfig;
use crate::storage::{AdvancedScenarioEntity, AdvancedScenarioStorage};

/// Dispatches an update to every active advanced scenario whose conditions
/// accept it.
///
/// A scenario that hands control to another without ending the run is
/// followed through the manager loop, and that loop finishes the run. The
/// conversation payload is saved once any scenario ran.
pub struct AdvancedScenarioUpdateHandler {
    storage: Arc<dyn AdvancedScenarioStorage>,
    configs: Vec<AdvancedScenarioConfig>,
}

impl AdvancedScenarioUpdateHandler {
    pub fn new(storage: Arc<dyn AdvancedScenarioStorage>, configs: Vec<AdvancedScenarioConfig>) -> Self {
        Self { storage, configs }
    }

    /// Runs the scenarios, returning the final context parts if any ran.
    fn run(&self, request: &UpdateRequest) -> Result<Option<(serde_json::Value, Option<Response>)>> {
        let mut manager = AdvancedScenarioManager::from_configs(&self.configs);
        if manager.is_empty() {
            return Ok(None);
        }

        let key = request.conversation_key();
        let data = self.storage.find_by_id(&key)?.map(|e| e.data);
        let mut ctx = UserScenarioContext::new(request, data);

        let matching: Vec<(String, _)> = manager
            .active_scenarios()
            .into_iter()
            .filter(|(_, s)| s.active_conditions().iter().any(|c| c.matches(request)))
            .map(|(name, s)| (name.to_string(), Arc::clone(s)))
            .collect();
        if matching.is_empty() {
            return Ok(None);
        }

        for (name, scenario) in matching {
            debug!(scenario = %name, "advanced scenario processing");
            scenario.process(&mut ctx)?;

            if let Some(next) = ctx.next_scenario.take() {
                manager.set_current(&next)?;
                if !ctx.is_end {
                    manager.process(&mut ctx)?;
                }
                break;
            }
        }

        Ok(Some((ctx.data, ctx.response)))
    }
}

impl UpdateHandler for AdvancedScenarioUpdateHandler {
    fn name(&self) -> &str {
        "advanced-scenario"
    }

    fn on_update(&self, request: &mut UpdateRequest) -> Result<()> {
        let Some((data, response)) = self.run(request)? else {
            return Ok(());
        };

        self.storage
            .save(AdvancedScenarioEntity::new(request.conversation_key(), data))?;

        let accessor = request.accessor_mut();
        match response {
            Some(response) => accessor.set_response(response),
            None if accessor.response().is_none() => accessor.set_response(Response::Empty),
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::FnScenario;
    use crate::storage::InMemoryAdvancedScenarioStorage;
    use chatflow_core::{FlowError, RequestMapping, Update};
    use serde_json::json;

    fn handler(storage: Arc<InMemoryAdvancedScenarioStorage>) -> AdvancedScenarioUpdateHandler {
        let greet = FnScenario::new(vec![RequestMapping::text("/greet").unwrap()], |ctx| {
            let visits = ctx.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            ctx.set("visits", visits);
            ctx.hand_off("farewell");
            Ok(())
        });
        let farewell = FnScenario::new(vec![RequestMapping::text("/bye").unwrap()], |ctx| {
            let visits = ctx.get("visits").and_then(|v| v.as_u64()).unwrap_or(0);
            ctx.reply(Response::text(format!("bye after {visits}")));
            ctx.end();
            Ok(())
        });
        let broken = FnScenario::new(vec![RequestMapping::text("/boom").unwrap()], |_| {
            Err(FlowError::handler("boom"))
        });
        AdvancedScenarioUpdateHandler::new(
            storage,
            vec![
                AdvancedScenarioConfig::new("greet", greet),
                AdvancedScenarioConfig::new("farewell", farewell),
                AdvancedScenarioConfig::new("broken", broken),
            ],
        )
    }

    fn request(text: &str) -> UpdateRequest {
        UpdateRequest::new(Update::message(1, 8, 4, text))
    }

    #[test]
    fn hand_off_runs_target_in_same_update_and_saves_data() {
        let storage = Arc::new(InMemoryAdvancedScenarioStorage::new());
        let handler = handler(storage.clone());

        let mut req = request("/greet");
        handler.on_update(&mut req).unwrap();

        assert!(matches!(req.response(), Some(Response::SimpleMessage { text, .. }) if text == "bye after 1"));
        let saved = storage.find_by_id("4:8").unwrap().unwrap();
        assert_eq!(saved.data, json!({ "visits": 1 }));

        let mut again = request("/greet");
        handler.on_update(&mut again).unwrap();
        assert_eq!(storage.find_by_id("4:8").unwrap().unwrap().data, json!({ "visits": 2 }));
    }

    #[test]
    fn unmatched_update_is_declined() {
        let storage = Arc::new(InMemoryAdvancedScenarioStorage::new());
        let mut req = request("hello");
        handler(storage.clone()).on_update(&mut req).unwrap();
        assert!(req.response().is_none());
        assert!(storage.find_by_id("4:8").unwrap().is_none());
    }

    #[test]
    fn scenario_error_propagates() {
        let storage = Arc::new(InMemoryAdvancedScenarioStorage::new());
        let mut req = request("/boom");
        let result = handler(storage.clone()).on_update(&mut req);
        assert!(matches!(result, Err(FlowError::Handler(_))));
        assert!(storage.find_by_id("4:8").unwrap().is_none());
    }

    #[test]
    fn silent_scenario_sets_empty_response() {
        let storage = Arc::new(InMemoryAdvancedScenarioStorage::new());
        let quiet = FnScenario::new(vec![RequestMapping::any()], |ctx| {
            ctx.end();
            Ok(())
        });
        let handler = AdvancedScenarioUpdateHandler::new(
            storage,
            vec![AdvancedScenarioConfig::new("quiet", quiet)],
        );
        let mut req = request("anything");
        handler.on_update(&mut req).unwrap();
        assert!(matches!(req.response(), Some(Response::Empty)));
    }
}
