//! Chat and model status endpoints

use crate::api::{ChatRequest, ChatResponse, DetailResponse, ErrorResponse, ModelInfo};
use crate::error::Error;
use crate::server::middleware::request_id;
use crate::server::state::ServerState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::time::Instant;
use tracing::{error, info, warn};

pub fn create_router() -> Router<ServerState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/model/status", get(model_status))
}

fn validation_error(message: String, request_id: String) -> Response {
    warn!(request_id = %request_id, error = %message, "Invalid chat request");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::new(message, "ValidationError", Some(request_id))),
    )
        .into_response()
}

/// Chat with the German language tutor
async fn chat(
    State(state): State<ServerState>,
    uri: Uri,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id(&uri.to_string());

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return validation_error(rejection.body_text(), request_id),
    };
    if let Err(e) = request.validate() {
        return validation_error(e.to_string(), request_id);
    }

    info!(
        request_id = %request_id,
        message_length = request.message.chars().count(),
        max_tokens = ?request.max_tokens,
        "Chat request received"
    );

    let start = Instant::now();
    let generation = match state.manager.chat(&request.message, &request.options()).await {
        Ok(generation) => generation,
        Err(Error::ModelNotLoaded) => {
            error!(request_id = %request_id, "Chat request while model is not loaded");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DetailResponse::new("Model not loaded")),
            )
                .into_response();
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Error in chat endpoint");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DetailResponse::new("Internal server error")),
            )
                .into_response();
        }
    };
    let response_time = start.elapsed().as_secs_f64();

    state.cache.record_miss();

    let tokens_generated = generation
        .tokens_generated
        .unwrap_or_else(|| generation.text.split_whitespace().count());

    let model_info = ModelInfo {
        model_loaded: state.manager.is_loaded(),
        device: state.manager.device(),
        gpu_memory_gb: state.manager.gpu_memory_gb(),
    };

    info!(
        request_id = %request_id,
        response_time,
        tokens_generated,
        "Chat response generated"
    );

    Json(ChatResponse {
        response: generation.text,
        cached: false,
        response_time,
        tokens_generated: Some(tokens_generated),
        model_info: Some(model_info),
    })
    .into_response()
}

/// Current model status and counters
async fn model_status(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.manager.get_model_status())
}
