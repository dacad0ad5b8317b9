use std::fmt;
use std::sync::Arc;

use chatflow_core::{ActiveScenario, EventOutcome, FlowError, Response, Result, UpdateRequest};
use tracing::{debug, warn};

use crate::config::ScenarioConfig;
use crate::id::ScenarioIdResolver;
use crate::persist::ScenarioPersister;
use crate::ScenarioState;

/// One conversation's instance of a scenario graph.
pub struct Scenario<S> {
    id: String,
    state: S,
    config: Arc<ScenarioConfig<S>>,
    persister: Arc<ScenarioPersister<S>>,
    id_resolver: Arc<dyn ScenarioIdResolver>,
}

/// What happened when an event was applied.
#[derive(Debug)]
pub struct ScenarioEventResult<S> {
    pub success: bool,
    pub source: S,
    /// Target of the transition that fired, if one did.
    pub target: Option<S>,
    /// The target was terminal, so the conversation went back to the
    /// initial state.
    pub terminal: bool,
    pub response: Option<Response>,
    pub error: Option<FlowError>,
}

impl<S: ScenarioState> ScenarioEventResult<S> {
    fn rejected(source: S) -> Self {
        Self {
            success: false,
            source,
            target: None,
            terminal: false,
            response: None,
            error: None,
        }
    }

    pub fn into_outcome(self) -> EventOutcome {
        EventOutcome {
            success: self.success,
            error: self.error,
            response: self.response,
            source: format!("{:?}", self.source),
            target: self.target.map(|t| format!("{t:?}")),
        }
    }
}

impl<S: ScenarioState> Scenario<S> {
    pub fn new(
        id: impl Into<String>,
        state: S,
        config: Arc<ScenarioConfig<S>>,
        persister: Arc<ScenarioPersister<S>>,
        id_resolver: Arc<dyn ScenarioIdResolver>,
    ) -> Self {
        Self {
            id: id.into(),
            state,
            config,
            persister,
            id_resolver,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn config(&self) -> &ScenarioConfig<S> {
        &self.config
    }

    /// Apply `request` to the current state.
    ///
    /// The first outgoing transition, in declaration order, whose guard
    /// accepts the request fires. Its action runs before anything is
    /// stored; a failed action leaves both the in-memory and the persisted
    /// state untouched.
    pub fn apply(&mut self, request: &UpdateRequest) -> ScenarioEventResult<S> {
        let source = self.state.clone();
        let fired = self
            .config
            .transitions_from(&source)
            .iter()
            .find_map(|t| t.guard().match_request(request).map(|vars| (t, vars)));

        let Some((transition, variables)) = fired else {
            debug!(scenario_id = %self.id, state = ?source, "no transition accepts the event");
            return ScenarioEventResult::rejected(source);
        };
        let target = transition.target().clone();

        let response = match transition.execute(request, &variables) {
            Ok(response) => response,
            Err(error) => {
                warn!(scenario_id = %self.id, ?source, ?target, %error, "transition action failed");
                return ScenarioEventResult {
                    target: Some(target),
                    error: Some(error),
                    ..ScenarioEventResult::rejected(source)
                };
            }
        };

        let terminal = self.config.is_terminal(&target);
        let next = if terminal {
            self.config.initial_state().clone()
        } else {
            target.clone()
        };

        if let Err(error) = self.persister.persist(&self.id, &next) {
            warn!(scenario_id = %self.id, %error, "failed to persist scenario state");
            return ScenarioEventResult {
                target: Some(target),
                error: Some(error),
                ..ScenarioEventResult::rejected(source)
            };
        }

        debug!(scenario_id = %self.id, ?source, ?target, terminal, "transition applied");
        self.state = next;
        ScenarioEventResult {
            success: true,
            source,
            target: Some(target),
            terminal,
            response,
            error: None,
        }
    }
}

impl<S: ScenarioState> ActiveScenario for Scenario<S> {
    fn id(&self) -> &str {
        &self.id
    }

    fn state_name(&self) -> String {
        format!("{:?}", self.state)
    }

    fn matches(&self, request: &UpdateRequest) -> bool {
        self.config
            .transitions_from(&self.state)
            .iter()
            .any(|t| t.guard().matches(request))
    }

    fn send_event(&mut self, request: &UpdateRequest) -> EventOutcome {
        self.apply(request).into_outcome()
    }

    fn save_id(&self, request: &UpdateRequest) -> Result<()> {
        self.id_resolver.save_new_id(request, &self.id)
    }
}

impl<S: fmt::Debug> fmt::Debug for Scenario<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SimpleScenarioIdResolver;
    use crate::persist::{InMemoryScenarioRepository, ScenarioRepositoryAdapter};
    use crate::transition::Transition;
    use chatflow_core::{RequestMapping, Update};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Order {
        Start,
        Size,
        Done,
    }

    struct Rejecting;

    impl ScenarioRepositoryAdapter<Order> for Rejecting {
        fn load(&self, _id: &str) -> Result<Option<Order>> {
            Ok(None)
        }
        fn save(&self, _id: &str, _state: &Order) -> Result<()> {
            Err(FlowError::Storage("read-only".to_string()))
        }
    }

    fn config() -> Arc<ScenarioConfig<Order>> {
        Arc::new(
            ScenarioConfig::builder()
                .initial(Order::Start)
                .state(Order::Size)
                .terminal(Order::Done)
                .transition(
                    Transition::new(Order::Start, Order::Size)
                        .on(RequestMapping::text("/order").unwrap())
                        .action(|_ctx| Ok(Some(Response::text("Which size?")))),
                )
                .transition(
                    Transition::new(Order::Size, Order::Done)
                        .on(RequestMapping::text("{size}").unwrap())
                        .action(|ctx| {
                            let size = ctx.variable("size").unwrap_or_default();
                            if size == "huge" {
                                return Err(FlowError::handler("no such size"));
                            }
                            Ok(Some(Response::text(format!("Ordered {size}"))))
                        }),
                )
                .build()
                .unwrap(),
        )
    }

    fn scenario(
        state: Order,
        repo: Arc<dyn ScenarioRepositoryAdapter<Order>>,
    ) -> Scenario<Order> {
        Scenario::new(
            "s-1",
            state,
            config(),
            Arc::new(ScenarioPersister::new(Some(repo))),
            Arc::new(SimpleScenarioIdResolver::new(None)),
        )
    }

    fn request(text: &str) -> UpdateRequest {
        UpdateRequest::new(Update::message(1, 2, 3, text))
    }

    #[test]
    fn matching_transition_moves_and_persists() {
        let repo = Arc::new(InMemoryScenarioRepository::new());
        let mut s = scenario(Order::Start, repo.clone());

        assert!(s.matches(&request("/order")));
        let result = s.apply(&request("/order"));

        assert!(result.success);
        assert_eq!(result.target, Some(Order::Size));
        assert!(!result.terminal);
        assert_eq!(s.state(), &Order::Size);
        assert_eq!(repo.load("s-1").unwrap(), Some(Order::Size));
    }

    #[test]
    fn unmatched_event_is_rejected_without_error() {
        let repo = Arc::new(InMemoryScenarioRepository::new());
        let mut s = scenario(Order::Start, repo.clone());

        assert!(!s.matches(&request("hello")));
        let result = s.apply(&request("hello"));
        assert!(!result.success);
        assert!(result.error.is_none());
        assert_eq!(s.state(), &Order::Start);
        assert!(repo.is_empty());
    }

    #[test]
    fn failed_action_keeps_state() {
        let repo = Arc::new(InMemoryScenarioRepository::new());
        let mut s = scenario(Order::Size, repo.clone());

        let result = s.apply(&request("huge"));
        assert!(!result.success);
        assert!(matches!(result.error, Some(FlowError::Handler(_))));
        assert_eq!(s.state(), &Order::Size);
        assert!(repo.is_empty());
    }

    #[test]
    fn terminal_target_resets_to_initial() {
        let repo = Arc::new(InMemoryScenarioRepository::new());
        let mut s = scenario(Order::Size, repo.clone());

        let result = s.apply(&request("large"));
        assert!(result.success);
        assert!(result.terminal);
        assert_eq!(result.target, Some(Order::Done));
        assert!(matches!(
            result.response,
            Some(Response::SimpleMessage { ref text, .. }) if text == "Ordered large"
        ));
        assert_eq!(s.state(), &Order::Start);
        assert_eq!(repo.load("s-1").unwrap(), Some(Order::Start));
    }

    #[test]
    fn persistence_failure_reports_failure() {
        let mut s = scenario(Order::Start, Arc::new(Rejecting));
        let outcome = s.send_event(&request("/order"));
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(FlowError::Storage(_))));
        assert_eq!(s.state_name(), "Start");
    }
}
