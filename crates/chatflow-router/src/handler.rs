use chatflow_core::{Response, Result, UpdateHandler, UpdateRequest};
use tracing::debug;

/// Invokes the route resolved during the pre-filter phase.
pub struct RoutedUpdateHandler;

impl UpdateHandler for RoutedUpdateHandler {
    fn name(&self) -> &str {
        "routed"
    }

    fn on_update(&self, request: &mut UpdateRequest) -> Result<()> {
        let Some(handler) = request.accessor().handler().cloned() else {
            return Ok(());
        };
        debug!(route = handler.name(), "invoking route");
        let response = handler.invoke(request)?.unwrap_or(Response::Empty);
        request.accessor_mut().set_response(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::filters::RoutePopulateFilter;
    use crate::route::{Route, RouteTable};
    use chatflow_core::{FlowError, RequestMapping, Update};
    use chatflow_filters::PreFilter;

    fn handle(text: &str) -> (UpdateRequest, Result<()>) {
        let mut table = RouteTable::new();
        table
            .add(Route::new("echo", RequestMapping::text("/echo {word}").unwrap(), |req| {
                let word = req.accessor().template_variables().get("word").cloned().unwrap_or_default();
                Ok(Some(Response::text(word)))
            }))
            .add(Route::new("ack", RequestMapping::command("ack").unwrap(), |_| Ok(None)))
            .add(Route::new("fail", RequestMapping::command("fail").unwrap(), |_| {
                Err(FlowError::handler("route failed"))
            }));
        let mut request = UpdateRequest::new(Update::message(1, 2, 3, text));
        RoutePopulateFilter::new(Arc::new(table)).pre_filter(&mut request).unwrap();
        let result = RoutedUpdateHandler.on_update(&mut request);
        (request, result)
    }

    #[test]
    fn route_response_is_attached() {
        let (request, result) = handle("/echo hey");
        assert!(result.is_ok());
        assert!(matches!(request.response(), Some(Response::SimpleMessage { text, .. }) if text == "hey"));
    }

    #[test]
    fn silent_route_sets_empty() {
        let (request, _) = handle("/ack");
        assert!(matches!(request.response(), Some(Response::Empty)));
    }

    #[test]
    fn route_error_propagates() {
        let (request, result) = handle("/fail");
        assert!(matches!(result, Err(FlowError::Handler(_))));
        assert!(request.response().is_none());
    }

    #[test]
    fn declines_without_route() {
        let (request, result) = handle("nothing");
        assert!(result.is_ok());
        assert!(request.response().is_none());
    }
}
