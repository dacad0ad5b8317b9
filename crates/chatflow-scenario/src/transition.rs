use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chatflow_core::{RequestMapping, Response, Result, UpdateRequest};

use crate::ScenarioState;

/// Work done when a transition fires. Returning a response attaches it to
/// the request; returning an error aborts the transition.
pub trait Action<S>: Send + Sync {
    fn execute(&self, ctx: &ActionContext<'_, S>) -> Result<Option<Response>>;
}

impl<S, F> Action<S> for F
where
    F: Fn(&ActionContext<'_, S>) -> Result<Option<Response>> + Send + Sync,
{
    fn execute(&self, ctx: &ActionContext<'_, S>) -> Result<Option<Response>> {
        self(ctx)
    }
}

/// Everything an action may look at.
pub struct ActionContext<'a, S> {
    pub request: &'a UpdateRequest,
    pub source: &'a S,
    pub target: &'a S,
    /// Static properties declared on the transition.
    pub props: &'a HashMap<String, serde_json::Value>,
    /// Values captured by `{name}` placeholders in the guard pattern.
    pub variables: &'a HashMap<String, String>,
}

impl<S> ActionContext<'_, S> {
    pub fn prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.get(key)
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

/// A guarded edge between two states.
pub struct Transition<S> {
    pub(crate) source: S,
    pub(crate) target: S,
    pub(crate) guard: RequestMapping,
    pub(crate) action: Option<Arc<dyn Action<S>>>,
    pub(crate) props: HashMap<String, serde_json::Value>,
}

impl<S: ScenarioState> Transition<S> {
    /// An edge that accepts every request until a guard is set with [`Transition::on`].
    pub fn new(source: S, target: S) -> Self {
        Self {
            source,
            target,
            guard: RequestMapping::any(),
            action: None,
            props: HashMap::new(),
        }
    }

    pub fn on(mut self, guard: RequestMapping) -> Self {
        self.guard = guard;
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&ActionContext<'_, S>) -> Result<Option<Response>> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn with_action(mut self, action: Arc<dyn Action<S>>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &S {
        &self.target
    }

    pub fn guard(&self) -> &RequestMapping {
        &self.guard
    }

    pub(crate) fn execute(
        &self,
        request: &UpdateRequest,
        variables: &HashMap<String, String>,
    ) -> Result<Option<Response>> {
        let Some(action) = &self.action else {
            return Ok(None);
        };
        let ctx = ActionContext {
            request,
            source: &self.source,
            target: &self.target,
            props: &self.props,
            variables,
        };
        action.execute(&ctx)
    }
}

impl<S: fmt::Debug> fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("guard", &self.guard)
            .field("has_action", &self.action.is_some())
            .field("props", &self.props)
            .finish()
    }
}
