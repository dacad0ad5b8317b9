use chatflow_core::{Response, Result, UpdateRequest};
use tracing::warn;

use crate::filter::PostFilter;

/// Reports requests that ended with the NotHandled fallback.
pub struct NotHandledFilter;

impl PostFilter for NotHandledFilter {
    fn name(&self) -> &str {
        "not-handled"
    }

    fn matches(&self, request: &UpdateRequest) -> bool {
        matches!(request.response(), Some(Response::NotHandled))
    }

    fn post_filter(&self, request: &mut UpdateRequest) -> Result<()> {
        warn!(
            request_id = %request.id(),
            user_id = request.user_id(),
            chat_id = request.chat_id(),
            request_type = %request.request_type(),
            text = request.text().unwrap_or_default(),
            "update not handled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::Update;

    #[test]
    fn matches_only_not_handled_responses() {
        let mut request = UpdateRequest::new(Update::message(1, 2, 3, "Hello"));
        assert!(!NotHandledFilter.matches(&request));
        request.accessor_mut().set_response(Response::Empty);
        assert!(!NotHandledFilter.matches(&request));
        request.accessor_mut().set_response(Response::NotHandled);
        assert!(NotHandledFilter.matches(&request));
        assert!(NotHandledFilter.post_filter(&mut request).is_ok());
    }
}
