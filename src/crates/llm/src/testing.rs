//! Scripted chat implementation for tests.
//!
//! Replies are routed by the caller's log tag so tests stay deterministic
//! even when background work reorders calls.

use crate::chat::{ChatApi, ChatMessage, ChatOptions};
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A recorded call, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tag: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Default)]
struct Script {
    queues: HashMap<String, VecDeque<String>>,
    sticky: HashMap<String, String>,
}

/// Scripted [`ChatApi`] for tests.
///
/// Responses are keyed by tag. A queued response is consumed once; a sticky
/// response answers every call for its tag after the queue drains. Calls
/// with no scripted answer fail with [`LlmError::EmptyResponse`], which the
/// engine treats like any other upstream failure.
#[derive(Clone, Default)]
pub struct ScriptedChat {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for the given tag.
    pub fn push(&self, tag: &str, reply: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queues
            .entry(tag.to_string())
            .or_default()
            .push_back(reply.into());
        self
    }

    /// Set a repeating reply used whenever the tag's queue is empty.
    pub fn sticky(&self, tag: &str, reply: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .sticky
            .insert(tag.to_string(), reply.into());
        self
    }

    /// All calls observed so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls observed for a tag.
    pub fn call_count(&self, tag: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tag == tag)
            .count()
    }
}

#[async_trait]
impl ChatApi for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            tag: opts.tag.clone(),
            messages: messages.to_vec(),
        });

        let mut script = self.script.lock().unwrap();
        if let Some(reply) = script
            .queues
            .get_mut(&opts.tag)
            .and_then(|queue| queue.pop_front())
        {
            return Ok(reply);
        }
        if let Some(reply) = script.sticky.get(&opts.tag) {
            return Ok(reply.clone());
        }

        Err(LlmError::EmptyResponse)
    }
}
