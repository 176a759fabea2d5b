//! Error types for the chat gateway.

use thiserror::Error;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when talking to the chat endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("upstream HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint returned no usable choice content.
    #[error("empty completion response")]
    EmptyResponse,

    /// Structured output was requested but the reply is not valid JSON.
    #[error("non-JSON reply to a structured request: {0}")]
    NonJson(String),

    /// API key not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Check if this error is worth retrying at the gateway level.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
