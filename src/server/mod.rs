//! HTTP server for the German tutor chat API
//!
//! Routes:
//! - `GET /` service information
//! - `/api/v1/chat`, `/api/v1/model/status`
//! - `/api/v1/health`, `/api/v1/ready`, `/api/v1/live`
//! - `/api/v1/cache/stats`, `/api/v1/cache/clear`
//! - `/api/v1/config`

use crate::config::ConfigManager;
use crate::error::Result;
use crate::runtime::{create_engine, ModelManager};
use axum::{extract::State, middleware::from_fn, middleware::from_fn_with_state, response::IntoResponse, routing::get, Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

pub mod middleware;
pub mod routes;
pub mod state;

use state::ServerState;

pub const API_PREFIX: &str = "/api/v1";

/// Create the main application router
pub fn create_app(state: ServerState) -> Router {
    let cors_config = state.cors_config().clone();
    let timeout_duration = Duration::from_secs(state.server_config().request_timeout_secs);

    let mut app = Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, routes::create_router())
        .layer(TimeoutLayer::new(timeout_duration))
        .layer(from_fn_with_state(state.clone(), middleware::trusted_host_middleware))
        .layer(from_fn(middleware::timing_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_config.enabled {
        app = app.layer(middleware::cors_layer(&cors_config));
    }

    app
}

/// Root endpoint with basic information
async fn root(State(state): State<ServerState>) -> impl IntoResponse {
    let app = state.app_info();
    Json(serde_json::json!({
        "name": app.name,
        "version": app.version,
        "description": app.description,
        "docs": "/docs",
        "health": format!("{}/health", API_PREFIX),
        "model_status": format!("{}/model/status", API_PREFIX),
    }))
}

/// Completes on SIGTERM or SIGINT
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = signal(SignalKind::terminate());
    let sigint = signal(SignalKind::interrupt());

    match (sigterm, sigint) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }
        _ => {
            error!("Failed to register signal handlers, falling back to Ctrl+C");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
            }
        }
    }
}

/// Completes on Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C");
    }
}

/// Serve on an already bound listener until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the HTTP server and run until a shutdown signal
pub async fn start_server(addr: SocketAddr, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;

    info!("Starting server on {}", addr);
    info!("Chat API available at http://{}{}/chat", addr, API_PREFIX);

    serve(listener, state, shutdown_signal()).await
}

/// Full service lifespan: load the model, serve, then unload.
/// A model that fails to load aborts startup.
pub async fn run(config: Arc<ConfigManager>, addr: SocketAddr) -> Result<()> {
    info!("Starting German Language Teaching Chatbot...");

    let engine = create_engine(config.settings())?;
    let manager = Arc::new(ModelManager::new(
        engine,
        config.model_config().clone(),
        config.system_prompt(),
    ));

    if let Err(e) = manager.load_model().await {
        error!(error = %e, "Failed to load model during startup");
        return Err(e);
    }
    info!("Application startup complete");

    let state = ServerState::new(Arc::clone(&manager), config);
    let result = start_server(addr, state).await;

    info!("Shutting down application...");
    manager.unload_model().await?;
    info!("Application shutdown complete");

    result
}
