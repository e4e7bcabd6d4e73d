//! Cache counter endpoints

use crate::server::state::ServerState;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::info;

pub fn create_router() -> Router<ServerState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_cache))
}

async fn cache_stats(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.cache.snapshot())
}

async fn clear_cache(State(state): State<ServerState>) -> impl IntoResponse {
    state.cache.clear();
    info!("Cache cleared");
    Json(json!({"message": "Cache cleared successfully"}))
}
