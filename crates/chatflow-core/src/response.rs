use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MessagesConfig;
use crate::error::Result;
use crate::request::UpdateRequest;

/// Outcome of handling a request.
///
/// Processed exactly once by the orchestrator, which then consults
/// [`Response::execute_post_filters`] to decide whether conclusive
/// post-filters run.
#[derive(Debug, Clone)]
pub enum Response {
    /// Handled, nothing to send.
    Empty,
    SimpleMessage {
        text: String,
        execute_post_filters: bool,
    },
    /// The user may not use the bot (or this route).
    Forbidden,
    /// No handler claimed the request.
    NotHandled,
    Custom(Arc<dyn CustomResponse>),
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Response::SimpleMessage {
            text: text.into(),
            execute_post_filters: true,
        }
    }

    /// A message that does not trigger conclusive post-filters.
    pub fn text_only(text: impl Into<String>) -> Self {
        Response::SimpleMessage {
            text: text.into(),
            execute_post_filters: false,
        }
    }

    pub fn custom(response: impl CustomResponse + 'static) -> Self {
        Response::Custom(Arc::new(response))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Response::Empty => "empty",
            Response::SimpleMessage { .. } => "simple_message",
            Response::Forbidden => "forbidden",
            Response::NotHandled => "not_handled",
            Response::Custom(_) => "custom",
        }
    }

    pub fn execute_post_filters(&self) -> bool {
        match self {
            Response::Empty => true,
            Response::SimpleMessage {
                execute_post_filters,
                ..
            } => *execute_post_filters,
            Response::Forbidden | Response::NotHandled => false,
            Response::Custom(custom) => custom.execute_post_filters(),
        }
    }

    /// Deliver the response through `sink`.
    pub async fn process(
        &self,
        request: &UpdateRequest,
        sink: &dyn ResponseSink,
        messages: &MessagesConfig,
    ) -> Result<()> {
        let text = match self {
            Response::Empty => return Ok(()),
            Response::Custom(custom) => return custom.process(request, sink).await,
            Response::SimpleMessage { text, .. } => text.clone(),
            Response::Forbidden => messages.forbidden.clone(),
            Response::NotHandled => messages.not_handled.clone(),
        };
        sink.send(&OutboundMessage::reply(request, text)).await
    }
}

/// User-defined response with its own delivery step.
#[async_trait]
pub trait CustomResponse: fmt::Debug + Send + Sync {
    async fn process(&self, request: &UpdateRequest, sink: &dyn ResponseSink) -> Result<()>;

    fn execute_post_filters(&self) -> bool {
        true
    }
}

/// A message to be delivered to the chat an update came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: i64,
    /// Update this message answers, if any.
    pub reply_to: Option<i64>,
    pub text: String,
    pub format: MessageFormat,
}

impl OutboundMessage {
    pub fn reply(request: &UpdateRequest, text: impl Into<String>) -> Self {
        Self {
            chat_id: request.chat_id(),
            reply_to: Some(request.update().update_id),
            text: text.into(),
            format: MessageFormat::PlainText,
        }
    }
}

/// Formatting hint for outbound message content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    #[default]
    PlainText,
    Markdown,
    Html,
}

/// Outbound transport. Failures surface back to the orchestrator, which
/// routes them to the exception handler.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Stable lowercase identifier (e.g. `"console"`).
    fn name(&self) -> &str;

    async fn send(&self, msg: &OutboundMessage) -> Result<()>;
}
