use serde::{Deserialize, Serialize};

use crate::types::{MessageType, RequestType};

/// Raw inbound event as handed over by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: UpdateKind,
    #[serde(default)]
    pub text: Option<String>,
    /// Full platform payload for handlers that need extra fields.
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    CallbackQuery,
    InlineQuery,
    ChannelPost,
}

fn default_kind() -> UpdateKind {
    UpdateKind::Message
}

impl Update {
    /// Plain text message, the most common shape.
    pub fn message(update_id: i64, chat_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        Self {
            update_id,
            chat_id,
            user_id,
            username: None,
            kind: UpdateKind::Message,
            text: Some(text.into()),
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_kind(mut self, kind: UpdateKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn request_type(&self) -> RequestType {
        match self.kind {
            UpdateKind::Message => RequestType::Message,
            UpdateKind::EditedMessage => RequestType::EditedMessage,
            UpdateKind::CallbackQuery => RequestType::CallbackQuery,
            UpdateKind::InlineQuery => RequestType::InlineQuery,
            UpdateKind::ChannelPost => RequestType::ChannelPost,
        }
    }

    /// Message shapes carried by this update. Callback and inline queries
    /// carry data rather than a message, so they report none.
    pub fn message_types(&self) -> Vec<MessageType> {
        match self.kind {
            UpdateKind::CallbackQuery | UpdateKind::InlineQuery => Vec::new(),
            _ => match self.text.as_deref() {
                Some(t) if t.starts_with('/') => vec![MessageType::Command],
                Some(_) => vec![MessageType::Text],
                None => vec![MessageType::Media],
            },
        }
    }
}
