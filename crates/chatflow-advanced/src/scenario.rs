use std::fmt;
use std::sync::Arc;

use chatflow_core::{RequestMapping, Result};

use crate::context::UserScenarioContext;

/// One named graph in the advanced model.
pub trait AdvancedScenario: Send + Sync {
    /// Guards under which the scenario takes part in dispatch.
    fn active_conditions(&self) -> &[RequestMapping];

    /// One step. Finish the run with [`UserScenarioContext::end`] or pass
    /// control on with [`UserScenarioContext::hand_off`].
    fn process(&self, ctx: &mut UserScenarioContext<'_>) -> Result<()>;
}

type Step = dyn Fn(&mut UserScenarioContext<'_>) -> Result<()> + Send + Sync;

/// Closure-backed scenario.
pub struct FnScenario {
    conditions: Vec<RequestMapping>,
    step: Box<Step>,
}

impl FnScenario {
    pub fn new<F>(conditions: Vec<RequestMapping>, step: F) -> Self
    where
        F: Fn(&mut UserScenarioContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            conditions,
            step: Box::new(step),
        }
    }
}

impl AdvancedScenario for FnScenario {
    fn active_conditions(&self) -> &[RequestMapping] {
        &self.conditions
    }

    fn process(&self, ctx: &mut UserScenarioContext<'_>) -> Result<()> {
        (self.step)(ctx)
    }
}

/// A scenario registered under a name.
#[derive(Clone)]
pub struct AdvancedScenarioConfig {
    pub name: String,
    pub scenario: Arc<dyn AdvancedScenario>,
}

impl AdvancedScenarioConfig {
    pub fn new(name: impl Into<String>, scenario: impl AdvancedScenario + 'static) -> Self {
        Self {
            name: name.into(),
            scenario: Arc::new(scenario),
        }
    }
}

impl fmt::Debug for AdvancedScenarioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancedScenarioConfig")
            .field("name", &self.name)
            .field("conditions", &self.scenario.active_conditions())
            .finish()
    }
}
