//! Request-scoped context.
//!
//! A task-local holding a snapshot of the request being processed, so
//! cross-cutting code (logging, adapters) can read it without threading the
//! request through every call. The value only exists inside [`scope`] and is
//! gone once the scoped future completes, on every exit path.

use std::future::Future;

use tracing::debug;

use crate::types::RequestId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub request_id: RequestId,
    pub user_id: i64,
    pub chat_id: i64,
}

tokio::task_local! {
    static CURRENT_REQUEST: RequestInfo;
}

/// Run `fut` with `info` installed as the current request.
///
/// `had_error` is evaluated on the future's output to tag the teardown log.
pub async fn scope<F, T>(info: RequestInfo, fut: F, had_error: impl FnOnce(&T) -> bool) -> T
where
    F: Future<Output = T>,
{
    let request_id = info.request_id.clone();
    debug!(request_id = %request_id, "request context saved");
    let output = CURRENT_REQUEST.scope(info, fut).await;
    debug!(request_id = %request_id, had_error = had_error(&output), "request context removed");
    output
}

/// The request being processed on this task, if any.
pub fn current() -> Option<RequestInfo> {
    CURRENT_REQUEST.try_with(|info| info.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> RequestInfo {
        RequestInfo {
            request_id: RequestId::new(),
            user_id: 1,
            chat_id: 2,
        }
    }

    #[tokio::test]
    async fn visible_inside_scope_only() {
        let expected = info();
        let seen = scope(expected.clone(), async { current() }, |_| false).await;
        assert_eq!(seen, Some(expected));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn removed_after_failed_future() {
        let result: Result<(), String> =
            scope(info(), async { Err("failed".to_string()) }, |r| r.is_err()).await;
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn teardown_tag_sees_the_output() {
        let mut tags = Vec::new();
        for outcome in [Err("failed"), Ok(())] {
            scope(info(), async move { outcome }, |r| {
                // Runs after the future, outside the task-local.
                tags.push((r.is_err(), current().is_none()));
                r.is_err()
            })
            .await;
        }
        assert_eq!(tags, [(true, true), (false, true)]);
    }
}
