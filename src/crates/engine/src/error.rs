//! Error types for the authoring engine.

use llm::LlmError;
use store::StoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The upstream model call failed.
    #[error("upstream LLM failure: {0}")]
    Llm(#[from] LlmError),

    /// The model replied but the payload failed schema validation.
    #[error("reply failed schema validation: {0}")]
    Schema(String),

    /// Waiting for another worker's generation exceeded the deadline.
    #[error("timed out waiting for generation: {0}")]
    Timeout(String),

    /// Invalid argument from the caller.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Book or page does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Document (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Schema error with context.
    pub fn schema(msg: impl Into<String>) -> Self {
        EngineError::Schema(msg.into())
    }

    /// Bad request with context.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        EngineError::BadRequest(msg.into())
    }
}
