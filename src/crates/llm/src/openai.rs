//! OpenAI-compatible gateway implementation.
//!
//! Works against any endpoint exposing the `/chat/completions` wire format
//! (OpenAI, Azure deployments, most proxies).

use crate::chat::{strip_code_fence, ChatApi, ChatMessage, ChatOptions, ResponseFormat, Role};
use crate::config::GatewayConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{sleep, Duration};

/// Chat gateway over an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiGateway {
    config: GatewayConfig,
    client: Client,
}

impl OpenAiGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create a gateway from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GatewayConfig::from_env()?))
    }

    fn convert_message(msg: &ChatMessage) -> WireMessage {
        WireMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            }
            .to_string(),
            content: Some(msg.content.clone()),
        }
    }

    async fn send_once(&self, body: &WireRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http { status, body });
        }

        let completion: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::NonJson(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl ChatApi for OpenAiGateway {
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String> {
        let model = opts
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        let body = WireRequest {
            model: model.clone(),
            messages: messages.iter().map(Self::convert_message).collect(),
            response_format: match opts.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(WireResponseFormat {
                    kind: "json_object".to_string(),
                }),
            },
            reasoning_effort: Some(opts.reasoning_effort),
            max_completion_tokens: opts.max_completion_tokens,
            stream: false,
        };

        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let started = Instant::now();

        let mut attempt = 0;
        let content = loop {
            match self.send_once(&body).await {
                Ok(content) => break content,
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        tag = %opts.tag,
                        model = %model,
                        attempt,
                        error = %err,
                        "chat call failed, retrying"
                    );
                    sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(err) => {
                    tracing::error!(
                        tag = %opts.tag,
                        model = %model,
                        latency_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "chat call failed"
                    );
                    return Err(err);
                }
            }
        };

        tracing::debug!(
            tag = %opts.tag,
            model = %model,
            latency_ms = started.elapsed().as_millis() as u64,
            prompt_chars,
            reply_chars = content.len(),
            "chat call completed"
        );

        if opts.response_format == ResponseFormat::JsonObject {
            let cleaned = strip_code_fence(&content);
            if serde_json::from_str::<serde_json::Value>(cleaned).is_err() {
                return Err(LlmError::NonJson(content));
            }
            return Ok(cleaned.to_string());
        }

        Ok(content)
    }
}

// Chat-completions wire types.
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<crate::chat::ReasoningEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}
