//! Branching-narrative authoring engine.
//!
//! A reader plays a story one page at a time; pages come from a slow LLM
//! endpoint, so the engine keeps interaction instant by precomputing likely
//! continuations in the background while a plan cursor preserves narrative
//! coherence. The moving parts:
//!
//! - [`models`] — the persisted book document (plan, story, branch cache)
//! - [`prompts`] / [`schema`] — pure prompt builders and reply validation
//! - plan lifecycle — generate, expand, intro-insert, adapt after a choice
//! - page generator — focus selection, prompt composition, option ids
//! - deferred verifier — advances the plan cursor only for dramatized beats
//! - branch coordinator — CAS claims, stale takeover, pruning, readiness
//! - story runtime — `start` / `next` / `choose` / `ready` / snapshots
//!
//! Coordination never uses in-process locks: every claim, takeover, commit
//! and prune is a conditional update on the book document, so any number of
//! worker processes can serve the same book.

pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod schema;

mod branch;
mod generator;
mod plan;
mod runtime;
mod verifier;

pub use branch::Readiness;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use generator::GenerateSpec;
pub use runtime::{ChoiceRequest, Snapshot};

use llm::{ChatApi, ChatOptions, ReasoningEffort};
use std::sync::Arc;
use store::DocumentStore;

/// The authoring engine. One instance serves all books; clones share the
/// gateway and the store, so background tasks just carry their own copy.
#[derive(Clone)]
pub struct Engine {
    chat: Arc<dyn ChatApi>,
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        store: Arc<dyn DocumentStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chat,
            store,
            config,
        }
    }

    /// The underlying document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub(crate) fn chat_opts(
        &self,
        tag: &str,
        model: Option<&String>,
        effort: ReasoningEffort,
    ) -> ChatOptions {
        let mut opts = ChatOptions::json(tag).with_effort(effort);
        if let Some(model) = model {
            opts = opts.with_model(model.clone());
        }
        opts
    }
}
