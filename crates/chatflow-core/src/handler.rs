//! Seams between the orchestrator and the components it drives.

use std::fmt;

use crate::error::{FlowError, Result};
use crate::request::UpdateRequest;
use crate::response::Response;

/// One link of the update handler chain.
///
/// A handler that owns the request sets a response on the accessor. A
/// handler that declines leaves the response untouched and returns `Ok`.
pub trait UpdateHandler: Send + Sync {
    fn name(&self) -> &str;

    fn on_update(&self, request: &mut UpdateRequest) -> Result<()>;
}

/// Turns a captured error into a substitute response, or swallows it.
///
/// The error is on `request.error()`; a replacement goes through
/// `request.accessor_mut().set_response`.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, request: &mut UpdateRequest) -> Result<()>;
}

/// A routed handler resolved for a request during the pre-filter phase.
pub trait RequestHandler: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Roles of which the user must hold at least one. Empty means public.
    fn required_roles(&self) -> &[String] {
        &[]
    }

    fn invoke(&self, request: &UpdateRequest) -> Result<Option<Response>>;
}

/// A restored conversation state machine attached to a request.
///
/// Type-erased view over the generic scenario so the accessor does not
/// depend on the state type.
pub trait ActiveScenario: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Debug rendering of the current state, for logs.
    fn state_name(&self) -> String;

    /// Whether any transition out of the current state accepts the request.
    fn matches(&self, request: &UpdateRequest) -> bool;

    /// Apply the request as an event. Never panics or returns early on a
    /// failed action; the failure is reported through the outcome.
    fn send_event(&mut self, request: &UpdateRequest) -> EventOutcome;

    /// Record this scenario's id as the conversation's id of record.
    fn save_id(&self, request: &UpdateRequest) -> Result<()>;
}

/// Result of [`ActiveScenario::send_event`].
#[derive(Debug)]
pub struct EventOutcome {
    pub success: bool,
    pub error: Option<FlowError>,
    /// Response produced by the transition's action.
    pub response: Option<Response>,
    pub source: String,
    pub target: Option<String>,
}
