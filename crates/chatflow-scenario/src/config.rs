use std::collections::{HashMap, HashSet};
use std::fmt;

use chatflow_core::{FlowError, Result};

use crate::transition::Transition;
use crate::ScenarioState;

/// Static definition of a conversation graph. Immutable once built and
/// shared by every conversation of that type.
pub struct ScenarioConfig<S> {
    initial: S,
    states: HashSet<S>,
    terminal: HashSet<S>,
    /// Outgoing edges per source, in declaration order.
    transitions: HashMap<S, Vec<Transition<S>>>,
}

impl<S: ScenarioState> ScenarioConfig<S> {
    pub fn builder() -> ScenarioConfigBuilder<S> {
        ScenarioConfigBuilder::default()
    }

    pub fn initial_state(&self) -> &S {
        &self.initial
    }

    pub fn states(&self) -> &HashSet<S> {
        &self.states
    }

    pub fn is_terminal(&self, state: &S) -> bool {
        self.terminal.contains(state)
    }

    pub fn transitions_from(&self, state: &S) -> &[Transition<S>] {
        self.transitions.get(state).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl<S: fmt::Debug> fmt::Debug for ScenarioConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioConfig")
            .field("initial", &self.initial)
            .field("states", &self.states)
            .field("terminal", &self.terminal)
            .field("transitions", &self.transitions.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

pub struct ScenarioConfigBuilder<S> {
    initial: Option<S>,
    states: Vec<S>,
    terminal: Vec<S>,
    transitions: Vec<Transition<S>>,
}

impl<S> Default for ScenarioConfigBuilder<S> {
    fn default() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            terminal: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

impl<S: ScenarioState> ScenarioConfigBuilder<S> {
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    pub fn state(mut self, state: S) -> Self {
        self.states.push(state);
        self
    }

    pub fn states(mut self, states: impl IntoIterator<Item = S>) -> Self {
        self.states.extend(states);
        self
    }

    /// Reaching a terminal state completes the conversation.
    pub fn terminal(mut self, state: S) -> Self {
        self.terminal.push(state);
        self
    }

    pub fn transition(mut self, transition: Transition<S>) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn build(self) -> Result<ScenarioConfig<S>> {
        let initial = self
            .initial
            .ok_or_else(|| FlowError::Config("scenario has no initial state".to_string()))?;

        let mut states: HashSet<S> = self.states.into_iter().collect();
        states.insert(initial.clone());
        states.extend(self.terminal.iter().cloned());

        let mut transitions: HashMap<S, Vec<Transition<S>>> = HashMap::new();
        for transition in self.transitions {
            for state in [&transition.source, &transition.target] {
                if !states.contains(state) {
                    return Err(FlowError::Config(format!(
                        "transition references undeclared state {state:?}"
                    )));
                }
            }
            transitions
                .entry(transition.source.clone())
                .or_default()
                .push(transition);
        }

        Ok(ScenarioConfig {
            initial,
            states,
            terminal: self.terminal.into_iter().collect(),
            transitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::RequestMapping;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Step {
        Start,
        Name,
        Done,
    }

    #[test]
    fn build_keeps_declaration_order_per_source() {
        let config = ScenarioConfig::builder()
            .initial(Step::Start)
            .states([Step::Name])
            .terminal(Step::Done)
            .transition(Transition::new(Step::Start, Step::Name).on(RequestMapping::text("a").unwrap()))
            .transition(Transition::new(Step::Start, Step::Done).on(RequestMapping::text("b").unwrap()))
            .build()
            .unwrap();

        let out = config.transitions_from(&Step::Start);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target(), &Step::Name);
        assert_eq!(out[1].target(), &Step::Done);
        assert!(config.transitions_from(&Step::Name).is_empty());
        assert!(config.is_terminal(&Step::Done));
        assert_eq!(config.states().len(), 3);
    }

    #[test]
    fn missing_initial_state_rejected() {
        let result = ScenarioConfig::<Step>::builder().state(Step::Name).build();
        assert!(matches!(result, Err(FlowError::Config(_))));
    }

    #[test]
    fn undeclared_state_rejected() {
        let result = ScenarioConfig::builder()
            .initial(Step::Start)
            .transition(Transition::new(Step::Start, Step::Name))
            .build();
        assert!(matches!(result, Err(FlowError::Config(_))));
    }
}
