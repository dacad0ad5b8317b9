use std::sync::Arc;

use chatflow_core::config::MessagesConfig;
use chatflow_core::context::{self, RequestInfo};
use chatflow_core::{
    ErrorPhase, ExceptionHandler, FlowError, RequestId, Response, ResponseSink, Update,
    UpdateHandler, UpdateRequest,
};
use chatflow_filters::FilterProvider;
use tracing::{debug, error, info_span, warn, Instrument};

/// What became of one update.
#[derive(Debug)]
pub struct HandleOutcome {
    pub request_id: RequestId,
    /// Response that went through processing, after any replacement.
    /// Responses attached by the exception handler during the post-filter
    /// phases are never delivered and not reported here.
    pub response: Option<Response>,
    /// Some phase failed, whether or not the failure was recovered.
    pub had_error: bool,
}

/// Runs an update through every pipeline phase.
///
/// Phases, in order: pre-filters, handler chain, default answer, response
/// processing, post-filters, conclusive post-filters. Every failure is
/// caught here and routed to the exception handler; `handle` never fails.
pub struct UpdatePipeline {
    filters: Arc<dyn FilterProvider>,
    handlers: Vec<Arc<dyn UpdateHandler>>,
    exception_handler: Arc<dyn ExceptionHandler>,
    sink: Arc<dyn ResponseSink>,
    messages: MessagesConfig,
    set_default_answer: bool,
}

/// Per-run bookkeeping.
struct Run {
    request: UpdateRequest,
    had_error: bool,
}

impl UpdatePipeline {
    pub fn new(
        filters: Arc<dyn FilterProvider>,
        handlers: Vec<Arc<dyn UpdateHandler>>,
        exception_handler: Arc<dyn ExceptionHandler>,
        sink: Arc<dyn ResponseSink>,
        messages: MessagesConfig,
        set_default_answer: bool,
    ) -> Self {
        Self {
            filters,
            handlers,
            exception_handler,
            sink,
            messages,
            set_default_answer,
        }
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub async fn handle(&self, update: Update) -> HandleOutcome {
        let request = UpdateRequest::new(update);
        let info = RequestInfo {
            request_id: request.id().clone(),
            user_id: request.user_id(),
            chat_id: request.chat_id(),
        };
        let span = info_span!(
            "update",
            request_id = %info.request_id,
            user_id = info.user_id,
            chat_id = info.chat_id
        );

        context::scope(info, self.run(request).instrument(span), |o| o.had_error).await
    }

    async fn run(&self, request: UpdateRequest) -> HandleOutcome {
        let mut run = Run {
            request,
            had_error: false,
        };

        let pre_filters_ok = self.pre_filters(&mut run);
        if pre_filters_ok && run.request.response().is_none() {
            self.handler_chain(&mut run);
        }
        if self.set_default_answer && run.request.response().is_none() && run.request.error().is_none() {
            debug!("no handler claimed the update");
            run.request.accessor_mut().set_response(Response::NotHandled);
        }

        self.process_response(&mut run).await;
        let delivered = run.request.response().cloned();
        let delivered_revision = run.request.accessor().response_revision();
        let conclusive = delivered.as_ref().is_some_and(Response::execute_post_filters);

        self.post_filters(&mut run);
        if conclusive {
            self.conclusive_post_filters(&mut run);
        }

        if run.request.accessor().response_revision() != delivered_revision {
            debug!("response attached after delivery ignored");
        }
        HandleOutcome {
            request_id: run.request.id().clone(),
            response: delivered,
            had_error: run.had_error,
        }
    }

    /// False when a pre-filter failed.
    fn pre_filters(&self, run: &mut Run) -> bool {
        for filter in self.filters.pre_filters(&run.request) {
            debug!(filter = filter.name(), "pre-filter");
            if let Err(e) = filter.pre_filter(&mut run.request) {
                warn!(filter = filter.name(), code = e.code(), error = %e, "pre-filter failed");
                self.raise(run, ErrorPhase::PreFilter, e);
                return false;
            }
        }
        true
    }

    fn handler_chain(&self, run: &mut Run) {
        for handler in &self.handlers {
            if let Err(e) = handler.on_update(&mut run.request) {
                warn!(handler = handler.name(), code = e.code(), error = %e, "update handler failed");
                // A half-built response from the failed handler is never sent.
                run.request.accessor_mut().clear_response();
                self.raise(run, ErrorPhase::Handler, e);
                return;
            }
            if let Some(response) = run.request.response() {
                debug!(handler = handler.name(), response = response.kind(), "update handled");
                return;
            }
        }
    }

    /// Delivers the response. A replacement attached by the exception
    /// handler after a delivery failure gets exactly one attempt.
    async fn process_response(&self, run: &mut Run) {
        let Some(response) = run.request.response().cloned() else {
            return;
        };
        let Err(e) = response.process(&run.request, self.sink.as_ref(), &self.messages).await else {
            return;
        };
        warn!(response = response.kind(), code = e.code(), error = %e, "response processing failed");
        if !self.raise(run, ErrorPhase::ResponseProcessing, e) {
            return;
        }

        let Some(replacement) = run.request.response().cloned() else {
            return;
        };
        if let Err(e) = replacement
            .process(&run.request, self.sink.as_ref(), &self.messages)
            .await
        {
            error!(
                response = replacement.kind(),
                code = e.code(),
                error = %e,
                "replacement response failed; giving up on this update"
            );
        }
    }

    fn post_filters(&self, run: &mut Run) {
        for filter in self.filters.post_filters(&run.request) {
            if let Err(e) = filter.post_filter(&mut run.request) {
                warn!(filter = filter.name(), code = e.code(), error = %e, "post-filter failed");
                self.raise(run, ErrorPhase::PostFilter, e);
            }
        }
    }

    fn conclusive_post_filters(&self, run: &mut Run) {
        for filter in self.filters.conclusive_post_filters(&run.request) {
            if let Err(e) = filter.conclusive_post_filter(&mut run.request) {
                error!(filter = filter.name(), code = e.code(), error = %e, "conclusive post-filter failed");
                run.had_error = true;
                run.request
                    .accessor_mut()
                    .set_error(ErrorPhase::ConclusivePostFilter, e);
            }
        }
    }

    /// Hand `error` to the exception handler. Returns whether it attached a
    /// response.
    fn raise(&self, run: &mut Run, phase: ErrorPhase, error: FlowError) -> bool {
        run.had_error = true;
        let revision = run.request.accessor().response_revision();
        run.request.accessor_mut().set_error(phase, error);

        if let Err(e) = self.exception_handler.handle(&mut run.request) {
            error!(%phase, code = e.code(), error = %e, "exception handler failed");
        }
        run.request.accessor().response_revision() != revision
    }
}
