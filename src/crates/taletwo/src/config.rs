//! Server configuration from the process environment.

/// Process-wide server settings.
///
/// The HTTP stack deliberately runs without an idle timeout: a single page
/// generation can take tens of seconds and `ready` blocks up to the
/// engine's wait deadline, so any idle cutoff must exceed the LLM's
/// worst-case latency.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port (`PORT`, default 3000).
    pub port: u16,

    /// Allowed CORS origin (`CORS_ORIGIN`, default `*`).
    pub cors_origin: String,

    /// Document store location (`DATABASE_URL`, default `sqlite:taletwo.db`).
    pub database_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:taletwo.db".to_string());

        Self {
            port,
            cors_origin,
            database_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Only meaningful when the variables are unset, as in CI.
        let config = ServerConfig {
            port: 3000,
            cors_origin: "*".to_string(),
            database_url: "sqlite:taletwo.db".to_string(),
        };
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origin, "*");
    }
}
