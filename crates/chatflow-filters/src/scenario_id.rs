use chatflow_core::{Result, UpdateRequest};
use tracing::debug;

use crate::filter::PostFilter;

/// Saves the id of a scenario that applied its event successfully as the
/// conversation's id of record.
///
/// Sits in the last post-filter slot, so the id is only committed once the
/// event succeeded and every other post-filter has seen the request.
pub struct ScenarioIdPersistFilter;

impl PostFilter for ScenarioIdPersistFilter {
    fn name(&self) -> &str {
        "scenario-id-persist"
    }

    fn matches(&self, request: &UpdateRequest) -> bool {
        request.accessor().scenario_committed() && request.accessor().scenario().is_some()
    }

    fn post_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        if let Some(scenario) = request.accessor().scenario() {
            scenario.save_id(request)?;
            debug!(scenario_id = scenario.id(), "scenario id persisted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use chatflow_core::{ActiveScenario, EventOutcome, Update};

    #[derive(Debug, Default)]
    struct Counting {
        saves: Arc<AtomicUsize>,
    }

    impl ActiveScenario for Counting {
        fn id(&self) -> &str {
            "scenario-1"
        }
        fn state_name(&self) -> String {
            "Start".to_string()
        }
        fn matches(&self, _request: &UpdateRequest) -> bool {
            true
        }
        fn send_event(&mut self, _request: &UpdateRequest) -> EventOutcome {
            EventOutcome {
                success: true,
                error: None,
                response: None,
                source: "Start".to_string(),
                target: Some("End".to_string()),
            }
        }
        fn save_id(&self, _request: &UpdateRequest) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn only_committed_scenarios_are_persisted() {
        let saves = Arc::new(AtomicUsize::new(0));
        let mut request = UpdateRequest::new(Update::message(1, 2, 3, "go"));
        request
            .accessor_mut()
            .set_scenario(Box::new(Counting { saves: Arc::clone(&saves) }));

        assert!(!ScenarioIdPersistFilter.matches(&request));

        request.accessor_mut().mark_scenario_committed();
        assert!(ScenarioIdPersistFilter.matches(&request));
        ScenarioIdPersistFilter.post_filter(&mut request).unwrap();
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }
}
