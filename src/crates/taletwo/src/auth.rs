//! Token authentication seam.
//!
//! Identity is an external collaborator; the service only needs "bearer
//! token in, user id out". The shipped implementation covers a static
//! token map for deployments and a permissive development mode.

use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves a bearer token to a user id.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<String>;
}

/// Authentication modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Development: the token string itself is trusted as the user id.
    None,
    /// Static token map from `AUTH_TOKENS`.
    Tokens,
}

impl AuthMode {
    /// Parse the mode from `AUTH_MODE`.
    pub fn from_env() -> Result<Self, String> {
        let mode = std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase();
        match mode.as_str() {
            "none" => Ok(AuthMode::None),
            "tokens" => Ok(AuthMode::Tokens),
            _ => Err(format!("Unknown auth mode: {mode}")),
        }
    }
}

/// Static-configuration [`Authenticator`].
pub struct StaticAuth {
    mode: AuthMode,
    tokens: HashMap<String, String>,
}

impl StaticAuth {
    pub fn new(mode: AuthMode, tokens: HashMap<String, String>) -> Self {
        Self { mode, tokens }
    }

    /// Build from `AUTH_MODE` and `AUTH_TOKENS` ("token:user,token:user").
    pub fn from_env() -> Result<Self, String> {
        let mode = AuthMode::from_env()?;
        let tokens = match mode {
            AuthMode::None => HashMap::new(),
            AuthMode::Tokens => {
                let raw = std::env::var("AUTH_TOKENS")
                    .map_err(|_| "AUTH_TOKENS required for tokens mode".to_string())?;
                parse_token_map(&raw)?
            }
        };
        Ok(Self::new(mode, tokens))
    }
}

fn parse_token_map(raw: &str) -> Result<HashMap<String, String>, String> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (token, user) = entry
            .split_once(':')
            .ok_or_else(|| format!("Malformed AUTH_TOKENS entry: {entry}"))?;
        if token.trim().is_empty() || user.trim().is_empty() {
            return Err(format!("Malformed AUTH_TOKENS entry: {entry}"));
        }
        tokens.insert(token.trim().to_string(), user.trim().to_string());
    }
    if tokens.is_empty() {
        return Err("AUTH_TOKENS contains no entries".to_string());
    }
    Ok(tokens)
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn resolve(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        match self.mode {
            AuthMode::None => Some(token.to_string()),
            AuthMode::Tokens => self.tokens.get(token).cloned(),
        }
    }
}
