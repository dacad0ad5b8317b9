use chatflow_core::config::MessagesConfig;
use chatflow_core::{ErrorPhase, ExceptionHandler, FlowError, Response, Result, UpdateRequest};
use tracing::{debug, error};

type Predicate = dyn Fn(&FlowError, ErrorPhase) -> bool + Send + Sync;
type Advise = dyn Fn(&FlowError, &UpdateRequest) -> Option<Response> + Send + Sync;

struct Advice {
    name: String,
    predicate: Box<Predicate>,
    advise: Box<Advise>,
}

/// Exception handler driven by an ordered advice table.
///
/// The first entry whose predicate accepts the error decides the
/// replacement response. Without a matching entry:
///
/// | error | phase | replacement |
/// |---|---|---|
/// | `Forbidden` | pre-filter, handler | `Response::Forbidden` |
/// | any other | pre-filter, handler | internal-error text, no conclusive filters |
/// | any | response processing, post-filters | none, logged |
///
/// Failures after the response was produced never get a replacement, so a
/// broken transport cannot make the pipeline retry forever.
pub struct DefaultExceptionHandler {
    advice: Vec<Advice>,
    messages: MessagesConfig,
}

impl DefaultExceptionHandler {
    pub fn new(messages: MessagesConfig) -> Self {
        Self {
            advice: Vec::new(),
            messages,
        }
    }

    /// Append an advice entry. Entries are consulted in registration order.
    pub fn advise<P, A>(mut self, name: impl Into<String>, predicate: P, advise: A) -> Self
    where
        P: Fn(&FlowError, ErrorPhase) -> bool + Send + Sync + 'static,
        A: Fn(&FlowError, &UpdateRequest) -> Option<Response> + Send + Sync + 'static,
    {
        self.advice.push(Advice {
            name: name.into(),
            predicate: Box::new(predicate),
            advise: Box::new(advise),
        });
        self
    }

    fn fallback(&self, error: &FlowError, phase: ErrorPhase) -> Option<Response> {
        match phase {
            ErrorPhase::PreFilter | ErrorPhase::Handler => match error {
                FlowError::Forbidden { .. } => Some(Response::Forbidden),
                _ => {
                    error!(%phase, code = error.code(), %error, "unhandled error, replying with internal error");
                    Some(Response::text_only(self.messages.internal_error.clone()))
                }
            },
            ErrorPhase::ResponseProcessing | ErrorPhase::PostFilter | ErrorPhase::ConclusivePostFilter => {
                error!(%phase, code = error.code(), %error, "error after response, not replaced");
                None
            }
        }
    }
}

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle(&self, request: &mut UpdateRequest) -> Result<()> {
        let Some(captured) = request.error() else {
            return Ok(());
        };
        let (error, phase) = (&captured.error, captured.phase);

        let response = match self.advice.iter().find(|a| (a.predicate)(error, phase)) {
            Some(advice) => {
                debug!(advice = %advice.name, %phase, code = error.code(), "exception advice applied");
                (advice.advise)(error, request)
            }
            None => self.fallback(error, phase),
        };

        if let Some(response) = response {
            request.accessor_mut().set_response(response);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::Update;

    fn failed(phase: ErrorPhase, error: FlowError) -> UpdateRequest {
        let mut request = UpdateRequest::new(Update::message(1, 2, 3, "hi"));
        request.accessor_mut().set_error(phase, error);
        request
    }

    #[test]
    fn forbidden_error_becomes_forbidden_response() {
        let mut request = failed(ErrorPhase::PreFilter, FlowError::forbidden("banned"));
        DefaultExceptionHandler::new(MessagesConfig::default())
            .handle(&mut request)
            .unwrap();
        assert!(matches!(request.response(), Some(Response::Forbidden)));
    }

    #[test]
    fn handler_failure_gets_internal_error_text() {
        let messages = MessagesConfig::default();
        let mut request = failed(ErrorPhase::Handler, FlowError::handler("boom"));
        DefaultExceptionHandler::new(messages.clone())
            .handle(&mut request)
            .unwrap();
        let response = request.response().unwrap();
        assert!(!response.execute_post_filters());
        assert!(matches!(response, Response::SimpleMessage { text, .. } if *text == messages.internal_error));
    }

    #[test]
    fn delivery_failures_are_not_replaced() {
        for phase in [ErrorPhase::ResponseProcessing, ErrorPhase::PostFilter] {
            let mut request = failed(phase, FlowError::Delivery("offline".to_string()));
            DefaultExceptionHandler::new(MessagesConfig::default())
                .handle(&mut request)
                .unwrap();
            assert!(request.response().is_none());
        }
    }

    #[test]
    fn first_matching_advice_wins() {
        let handler = DefaultExceptionHandler::new(MessagesConfig::default())
            .advise(
                "storage",
                |e, _| matches!(e, FlowError::Storage(_)),
                |_, _| Some(Response::text("storage is down")),
            )
            .advise("any", |_, _| true, |_, _| Some(Response::text("second")));

        let mut request = failed(ErrorPhase::Handler, FlowError::Storage("db".to_string()));
        handler.handle(&mut request).unwrap();
        assert!(matches!(request.response(), Some(Response::SimpleMessage { text, .. }) if text == "storage is down"));

        let mut other = failed(ErrorPhase::PostFilter, FlowError::handler("x"));
        handler.handle(&mut other).unwrap();
        assert!(matches!(other.response(), Some(Response::SimpleMessage { text, .. }) if text == "second"));
    }

    #[test]
    fn advice_may_swallow() {
        let handler = DefaultExceptionHandler::new(MessagesConfig::default())
            .advise("swallow", |_, _| true, |_, _| None);
        let mut request = failed(ErrorPhase::Handler, FlowError::handler("boom"));
        handler.handle(&mut request).unwrap();
        assert!(request.response().is_none());
    }
}
