use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{ErrorPhase, FlowError};
use crate::handler::{ActiveScenario, RequestHandler};
use crate::response::Response;
use crate::types::{MessageType, RequestId, RequestType};
use crate::update::Update;

/// One inbound update travelling through the pipeline.
///
/// Created at pipeline entry and dropped at exit. Filters and handlers only
/// write through the [`Accessor`]; the update itself is immutable.
#[derive(Debug)]
pub struct UpdateRequest {
    id: RequestId,
    update: Update,
    request_type: RequestType,
    message_types: Vec<MessageType>,
    received_at: DateTime<Utc>,
    accessor: Accessor,
}

impl UpdateRequest {
    pub fn new(update: Update) -> Self {
        let request_type = update.request_type();
        let message_types = update.message_types();
        Self {
            id: RequestId::new(),
            update,
            request_type,
            message_types,
            received_at: Utc::now(),
            accessor: Accessor::default(),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn chat_id(&self) -> i64 {
        self.update.chat_id
    }

    pub fn user_id(&self) -> i64 {
        self.update.user_id
    }

    pub fn text(&self) -> Option<&str> {
        self.update.text.as_deref()
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn message_types(&self) -> &[MessageType] {
        &self.message_types
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// `"<userId>:<chatId>"`, the per-conversation storage key.
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.update.user_id, self.update.chat_id)
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    pub fn accessor_mut(&mut self) -> &mut Accessor {
        &mut self.accessor
    }

    // Shortcuts for the fields read on every phase.

    pub fn response(&self) -> Option<&Response> {
        self.accessor.response.as_ref()
    }

    pub fn error(&self) -> Option<&CapturedError> {
        self.accessor.error.as_ref()
    }
}

/// An error captured by the orchestrator together with the phase it came from.
#[derive(Debug)]
pub struct CapturedError {
    pub phase: ErrorPhase,
    pub error: FlowError,
}

/// Mutable slice of a request, written by filters and handlers.
#[derive(Debug, Default)]
pub struct Accessor {
    response: Option<Response>,
    /// Bumped on every `set_response`, so the orchestrator can tell whether
    /// the exception handler attached a replacement.
    response_revision: u64,
    scenario: Option<Box<dyn ActiveScenario>>,
    scenario_committed: bool,
    error: Option<CapturedError>,
    handler: Option<Arc<dyn RequestHandler>>,
    roles: BTreeSet<String>,
    template_variables: HashMap<String, String>,
}

impl Accessor {
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Response) {
        if let Some(previous) = &self.response {
            debug!(previous = %previous.kind(), next = %response.kind(), "response overwritten");
        }
        self.response = Some(response);
        self.response_revision += 1;
    }

    pub fn clear_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    pub fn response_revision(&self) -> u64 {
        self.response_revision
    }

    pub fn scenario(&self) -> Option<&dyn ActiveScenario> {
        self.scenario.as_deref()
    }

    pub fn set_scenario(&mut self, scenario: Box<dyn ActiveScenario>) {
        self.scenario = Some(scenario);
        self.scenario_committed = false;
    }

    /// Detach the scenario so it can be driven with a shared borrow of the
    /// request. Put it back with [`Accessor::restore_scenario`].
    pub fn take_scenario(&mut self) -> Option<Box<dyn ActiveScenario>> {
        self.scenario.take()
    }

    pub fn restore_scenario(&mut self, scenario: Box<dyn ActiveScenario>) {
        self.scenario = Some(scenario);
    }

    /// Set after the attached scenario applied an event successfully.
    pub fn scenario_committed(&self) -> bool {
        self.scenario_committed
    }

    pub fn mark_scenario_committed(&mut self) {
        self.scenario_committed = true;
    }

    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, phase: ErrorPhase, error: FlowError) {
        self.error = Some(CapturedError { phase, error });
    }

    pub fn take_error(&mut self) -> Option<CapturedError> {
        self.error.take()
    }

    pub fn handler(&self) -> Option<&Arc<dyn RequestHandler>> {
        self.handler.as_ref()
    }

    pub fn set_handler(&mut self, handler: Arc<dyn RequestHandler>) {
        self.handler = Some(handler);
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn set_roles<I, R>(&mut self, roles: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn template_variables(&self) -> &HashMap<String, String> {
        &self.template_variables
    }

    pub fn set_template_variables(&mut self, vars: HashMap<String, String>) {
        self.template_variables = vars;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_derives_types_from_update() {
        let request = UpdateRequest::new(Update::message(1, 10, 20, "/help"));
        assert_eq!(request.chat_id(), 10);
        assert_eq!(request.user_id(), 20);
        assert_eq!(request.conversation_key(), "20:10");
        assert_eq!(request.message_types(), &[MessageType::Command]);
        assert!(request.response().is_none());
    }

    #[test]
    fn set_response_bumps_revision() {
        let mut request = UpdateRequest::new(Update::message(1, 10, 20, "hi"));
        let before = request.accessor().response_revision();
        request.accessor_mut().set_response(Response::Empty);
        request.accessor_mut().set_response(Response::NotHandled);
        assert_eq!(request.accessor().response_revision(), before + 2);
        assert!(matches!(request.response(), Some(Response::NotHandled)));
    }

    #[test]
    fn roles_lookup() {
        let mut request = UpdateRequest::new(Update::message(1, 10, 20, "hi"));
        request.accessor_mut().set_roles(["user", "admin"]);
        assert!(request.accessor().has_any_role(&["admin".to_string()]));
        assert!(!request.accessor().has_any_role(&["owner".to_string()]));
    }
}
