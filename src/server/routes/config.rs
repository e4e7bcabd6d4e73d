//! Read-only configuration endpoint

use crate::server::state::ServerState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

pub fn create_router() -> Router<ServerState> {
    Router::new().route("/config", get(get_config))
}

/// Non-sensitive subset of the merged configuration
async fn get_config(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.config.public_view())
}
