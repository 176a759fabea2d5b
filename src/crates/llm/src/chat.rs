//! Chat primitives shared by the gateway and its callers.
//!
//! The engine talks to the model exclusively through [`ChatApi`]: a list of
//! messages in, the first choice's text out. Everything else (prompt
//! assembly, schema validation) lives on the caller side.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Requested shape of the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The reply must be a single JSON object. The gateway verifies this and
    /// raises [`crate::LlmError::NonJson`] otherwise.
    JsonObject,
}

/// Reasoning effort forwarded to models that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Low,
    Medium,
    High,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Override the gateway's default model.
    pub model: Option<String>,
    pub response_format: ResponseFormat,
    pub reasoning_effort: ReasoningEffort,
    pub max_completion_tokens: Option<u32>,
    /// Short caller tag used in logs (e.g. `"planner.points"`).
    pub tag: String,
}

impl ChatOptions {
    /// Options for a structured-output call under the given log tag.
    pub fn json(tag: impl Into<String>) -> Self {
        Self {
            response_format: ResponseFormat::JsonObject,
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set the model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the reasoning effort.
    pub fn with_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = effort;
        self
    }

    /// Cap the completion length.
    pub fn with_max_completion_tokens(mut self, max: u32) -> Self {
        self.max_completion_tokens = Some(max);
        self
    }
}

/// The single chat primitive the rest of the system depends on.
///
/// Implementations must be stateless and re-entrant; multiple chats may be
/// in flight concurrently.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a chat-completion request and return the first choice's content.
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String>;
}

/// Strip a Markdown code fence from a model reply, if present.
///
/// Models asked for strict JSON still occasionally wrap it in ``` fences.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
