//! Health, readiness, and liveness probes

use crate::api::{DetailResponse, HealthResponse, StatusResponse};
use crate::server::state::ServerState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

pub fn create_router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        model_loaded: state.manager.is_loaded(),
        version: state.app_info().version.clone(),
        uptime: Some(state.uptime()),
    })
}

async fn ready(State(state): State<ServerState>) -> Response {
    if state.manager.is_loaded() {
        Json(StatusResponse::now("ready")).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(DetailResponse::new("Model not loaded")),
        )
            .into_response()
    }
}

async fn live() -> impl IntoResponse {
    Json(StatusResponse::now("alive"))
}
