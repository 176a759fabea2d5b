//! CORS layer configuration.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Build the CORS layer for the configured origin. `*` (the default) and
/// unparseable values fall back to permissive.
pub fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin = %origin, "unparseable CORS_ORIGIN, falling back to permissive");
            CorsLayer::permissive()
        }
    }
}
