//! API route handlers mounted under `/api/v1`

pub mod cache;
pub mod chat;
pub mod config;
pub mod health;

use crate::server::state::ServerState;
use axum::Router;

/// All `/api/v1` routes
pub fn create_router() -> Router<ServerState> {
    Router::new()
        .merge(chat::create_router())
        .merge(health::create_router())
        .merge(cache::create_router())
        .merge(config::create_router())
}
