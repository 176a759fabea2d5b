//! taletwo server binary.
//!
//! Wires the OpenAI gateway, the SQLite document store and the authoring
//! engine into the HTTP service and runs it until ctrl-c.

use engine::{Engine, EngineConfig};
use llm::OpenAiGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use store::SqliteStore;
use taletwo::auth::StaticAuth;
use taletwo::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config = ServerConfig::from_env();
    tracing::info!(port = config.port, db = %config.database_url, "starting taletwo");

    let store = SqliteStore::connect(&config.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("store setup failed: {e}"))?;

    let gateway =
        OpenAiGateway::from_env().map_err(|e| anyhow::anyhow!("gateway setup failed: {e}"))?;

    let auth = StaticAuth::from_env().map_err(|e| anyhow::anyhow!("auth setup failed: {e}"))?;

    let engine = Engine::new(Arc::new(gateway), Arc::new(store), EngineConfig::from_env());
    let state = AppState {
        engine,
        auth: Arc::new(auth),
    };
    let app = create_router(state, &config.cors_origin);

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
