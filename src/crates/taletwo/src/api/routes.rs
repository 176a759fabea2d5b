//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::api::middleware::cors::cors_layer;
use crate::auth::Authenticator;
use engine::Engine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub auth: Arc<dyn Authenticator>,
}

/// Build the complete API router.
pub fn create_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/books",
            post(handlers::create_book).get(handlers::list_books),
        )
        .route(
            "/api/books/:id",
            get(handlers::get_book).put(handlers::update_book),
        )
        .route("/api/books/:id/story", get(handlers::get_story))
        .route("/api/books/:id/story/start", post(handlers::start_story))
        .route("/api/books/:id/story/ready", get(handlers::ready))
        .route("/api/books/:id/story/next", post(handlers::next_page))
        .route("/api/books/:id/story/choose", post(handlers::choose))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
