//! LLM chat gateway for taletwo.
//!
//! This crate owns the single primitive the rest of the system uses to talk
//! to a model: [`ChatApi::chat`] — messages in, the first choice's text out.
//! The shipped implementation, [`OpenAiGateway`], targets any endpoint
//! speaking the OpenAI chat-completions wire format and takes care of
//! bearer auth, timeouts, retries for transient failures, and latency
//! logging under a per-caller tag.
//!
//! Prompt assembly and output-schema validation are deliberately *not* here;
//! they belong to the callers in the engine crate. The one exception is
//! JSON-ness: when a caller requests [`ResponseFormat::JsonObject`], the
//! gateway strips a stray code fence and rejects replies that are not valid
//! JSON with [`LlmError::NonJson`].
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ChatApi, ChatMessage, ChatOptions, OpenAiGateway};
//!
//! let gateway = OpenAiGateway::from_env()?;
//! let reply = gateway
//!     .chat(
//!         &[
//!             ChatMessage::system("You are a terse narrator."),
//!             ChatMessage::user("Describe a locked door."),
//!         ],
//!         ChatOptions::json("example"),
//!     )
//!     .await?;
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod openai;
pub mod testing;

pub use chat::{
    strip_code_fence, ChatApi, ChatMessage, ChatOptions, ReasoningEffort, ResponseFormat, Role,
};
pub use config::GatewayConfig;
pub use error::{LlmError, Result};
pub use openai::OpenAiGateway;
pub use testing::ScriptedChat;
