use chatflow_core::{Result, UpdateRequest};

/// Runs before the handler chain. May attach a response (which skips the
/// chain), populate the accessor, or fail.
///
/// Filters must be cheap and non-blocking; they run on the caller's task.
pub trait PreFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Non-matching filters are excluded from the resolved list.
    fn matches(&self, _request: &UpdateRequest) -> bool {
        true
    }

    fn pre_filter(&self, request: &mut UpdateRequest) -> Result<()>;
}

/// Runs after response processing, whether or not it succeeded. A failure
/// does not stop the remaining post-filters.
pub trait PostFilter: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, _request: &UpdateRequest) -> bool {
        true
    }

    fn post_filter(&self, request: &mut UpdateRequest) -> Result<()>;
}

/// Runs last, and only when the response asks for it via
/// `execute_post_filters`.
pub trait ConclusivePostFilter: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, _request: &UpdateRequest) -> bool {
        true
    }

    fn conclusive_post_filter(&self, request: &mut UpdateRequest) -> Result<()>;
}
