use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Filter {filter} failed: {reason}")]
    Filter { filter: String, reason: String },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Scenario {id} failed: {reason}")]
    Scenario { id: String, reason: String },

    #[error("Scenario not found: {name}")]
    ScenarioNotFound { name: String },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Short stable code, used as a log field and by exception advice.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::Config(_) => "CONFIG_ERROR",
            FlowError::Forbidden { .. } => "FORBIDDEN",
            FlowError::Filter { .. } => "FILTER_ERROR",
            FlowError::Handler(_) => "HANDLER_ERROR",
            FlowError::Scenario { .. } => "SCENARIO_ERROR",
            FlowError::ScenarioNotFound { .. } => "SCENARIO_NOT_FOUND",
            FlowError::Delivery(_) => "DELIVERY_ERROR",
            FlowError::Storage(_) => "STORAGE_ERROR",
            FlowError::Serialization(_) => "SERIALIZATION_ERROR",
            FlowError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn handler(reason: impl Into<String>) -> Self {
        FlowError::Handler(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        FlowError::Forbidden { reason: reason.into() }
    }
}

/// Pipeline phase in which an error was captured.
///
/// The exception handler reads this to tell a failed delivery apart from a
/// failed handler, so a replacement response is applied at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    PreFilter,
    Handler,
    ResponseProcessing,
    PostFilter,
    ConclusivePostFilter,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorPhase::PreFilter => "pre_filter",
            ErrorPhase::Handler => "handler",
            ErrorPhase::ResponseProcessing => "response_processing",
            ErrorPhase::PostFilter => "post_filter",
            ErrorPhase::ConclusivePostFilter => "conclusive_post_filter",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
