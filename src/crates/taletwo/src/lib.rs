//! taletwo HTTP service.
//!
//! A thin axum layer over the authoring engine: book CRUD for the owner,
//! the story surface (`story`, `start`, `ready`, `next`, `choose`), bearer
//! auth behind the [`auth::Authenticator`] seam, CORS, request tracing and
//! a health probe. All story semantics live in the `engine` crate.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{create_router, AppState};
pub use config::ServerConfig;
