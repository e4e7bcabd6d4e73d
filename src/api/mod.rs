//! Request and response types of the REST API

pub mod schemas;

pub use schemas::{
    CacheStatsResponse, ChatRequest, ChatResponse, DetailResponse, ErrorResponse, HealthResponse,
    ModelInfo, ModelStatusResponse, StatusResponse,
};
