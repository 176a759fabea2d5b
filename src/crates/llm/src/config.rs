//! Gateway configuration.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the OpenAI-compatible chat gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API key for bearer authentication.
    pub api_key: String,

    /// Base URL of the chat-completions API.
    pub base_url: String,

    /// Default model; individual calls may override it.
    pub model: String,

    /// Request timeout. Completions routinely take tens of seconds.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl GatewayConfig {
    /// Create a new gateway configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Build the configuration from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
    /// `OPENAI_MODEL`, falling back to the public OpenAI defaults for the
    /// latter two.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::ApiKeyNotFound("OPENAI_API_KEY".to_string()))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(240)
}

fn default_max_retries() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o-mini")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new("k", "u", "m");
        assert_eq!(config.timeout, Duration::from_secs(240));
        assert_eq!(config.max_retries, 2);
    }
}
