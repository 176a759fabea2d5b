//! Engine configuration.

use std::time::Duration;

/// Tuning knobs for the engine.
///
/// The model fields are overrides on top of the gateway's default model;
/// planning and adaptation stay on the default (larger) model while
/// verification can run on a fast small one.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model override for plan generation and adaptation.
    pub planner_model: Option<String>,

    /// Model override for sub-step verification.
    pub verifier_model: Option<String>,

    /// Cache entries and pending claims older than this are stale.
    pub stale: Duration,

    /// Maximum time `ensure_ready` waits on another worker's generation.
    pub wait_timeout: Duration,

    /// Poll interval while waiting on another worker.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner_model: None,
            verifier_model: None,
            stale: Duration::from_secs(120),
            wait_timeout: Duration::from_secs(240),
            poll_interval: Duration::from_millis(300),
        }
    }
}

impl EngineConfig {
    /// Read optional model overrides from the environment.
    pub fn from_env() -> Self {
        Self {
            planner_model: std::env::var("OPENAI_PLANNER_MODEL").ok(),
            verifier_model: std::env::var("OPENAI_VERIFIER_MODEL").ok(),
            ..Self::default()
        }
    }

    /// Staleness threshold in milliseconds, the unit timestamps are kept in.
    pub fn stale_ms(&self) -> i64 {
        self.stale.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.stale, Duration::from_secs(120));
        assert_eq!(config.wait_timeout, Duration::from_secs(240));
        assert_eq!(config.poll_interval, Duration::from_millis(300));
        assert_eq!(config.stale_ms(), 120_000);
        assert!(config.verifier_model.is_none());
    }
}
