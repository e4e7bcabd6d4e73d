//! JSON schemas for the chat API

use crate::error::{Error, Result};
use crate::runtime::{ChatOptions, ModelStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const MAX_TOKENS_LIMIT: usize = 1000;

/// Body of `POST /api/v1/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<usize>,

    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,

    #[serde(default = "default_top_p")]
    pub top_p: Option<f64>,
}

fn default_max_tokens() -> Option<usize> {
    Some(256)
}
fn default_temperature() -> Option<f64> {
    Some(0.2)
}
fn default_top_p() -> Option<f64> {
    Some(0.9)
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }

    /// Check field bounds; `null` optional fields are accepted
    pub fn validate(&self) -> Result<()> {
        let chars = self.message.chars().count();
        if chars == 0 {
            return Err(Error::Validation("message must not be empty".to_string()));
        }
        if chars > MAX_MESSAGE_CHARS {
            return Err(Error::Validation(format!(
                "message must be at most {} characters, got {}",
                MAX_MESSAGE_CHARS, chars
            )));
        }
        if let Some(max_tokens) = self.max_tokens {
            if !(1..=MAX_TOKENS_LIMIT).contains(&max_tokens) {
                return Err(Error::Validation(format!(
                    "max_tokens must be between 1 and {}",
                    MAX_TOKENS_LIMIT
                )));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(Error::Validation("temperature must be between 0 and 2".to_string()));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(Error::Validation("top_p must be between 0 and 1".to_string()));
            }
        }
        Ok(())
    }

    pub fn options(&self) -> ChatOptions {
        ChatOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// Model facts attached to every chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    pub device: String,
    pub gpu_memory_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Always false; there is no response cache
    pub cached: bool,
    /// Seconds spent generating
    pub response_time: f64,
    pub tokens_generated: Option<usize>,
    pub model_info: Option<ModelInfo>,
}

pub type ModelStatusResponse = ModelStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub model_loaded: bool,
    pub version: String,
    pub uptime: Option<f64>,
}

/// Body of `/ready` and `/live`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusResponse {
    pub fn now(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, error_type: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            error: error.into(),
            error_type: error_type.into(),
            timestamp: Utc::now(),
            request_id,
        }
    }
}

/// `{"detail": "..."}` body used by the 5xx replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_size: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
}
