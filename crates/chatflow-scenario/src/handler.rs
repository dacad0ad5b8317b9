use chatflow_core::{Response, Result, UpdateHandler, UpdateRequest};
use tracing::debug;

/// Applies the update to the scenario attached during the pre-filter phase.
///
/// Declines when nothing is attached or no transition fired. A failed
/// action or state write is returned as the handler error.
pub struct ScenarioUpdateHandler;

impl UpdateHandler for ScenarioUpdateHandler {
    fn name(&self) -> &str {
        "scenario"
    }

    fn on_update(&self, request: &mut UpdateRequest) -> Result<()> {
        let Some(mut scenario) = request.accessor_mut().take_scenario() else {
            return Ok(());
        };
        let outcome = scenario.send_event(request);
        request.accessor_mut().restore_scenario(scenario);

        if !outcome.success {
            return match outcome.error {
                Some(error) => Err(error),
                None => Ok(()),
            };
        }

        debug!(source = %outcome.source, target = ?outcome.target, "scenario event applied");
        let accessor = request.accessor_mut();
        match outcome.response {
            Some(response) => accessor.set_response(response),
            None if accessor.response().is_none() => accessor.set_response(Response::Empty),
            None => {}
        }
        accessor.mark_scenario_committed();
        Ok(())
    }
}
