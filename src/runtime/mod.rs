//! Runtime abstraction layer for the chat inference engines

use crate::config::{AppConfig, EngineBackend};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod candle_engine;
pub mod model_files;
pub mod model_manager;
pub mod openai_engine;
pub mod template_engine;

pub use candle_engine::CandleEngine;
pub use model_manager::{ChatOptions, ModelManager, ModelStatus};
pub use openai_engine::OpenAiEngine;
pub use template_engine::{build_prompt, ChatMessage, TemplateEngine};

/// Abstract chat engine implemented by the local and remote backends
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Load weights and tokenizer (or validate remote credentials)
    async fn load(&self) -> Result<()>;

    /// Release the model
    async fn unload(&self) -> Result<()>;

    /// Check if the model is loaded
    fn is_loaded(&self) -> bool;

    /// Check if the tokenizer is loaded
    fn tokenizer_loaded(&self) -> bool;

    /// Device the model runs on (`cuda:0`, `cpu`, `remote`)
    fn device(&self) -> String;

    /// Accelerator memory held by the model, in bytes
    fn memory_bytes(&self) -> u64;

    /// Generate a reply to the conversation
    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<Generation>;
}

/// Per-call decoding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.2,
            top_p: 0.9,
            do_sample: false,
        }
    }
}

impl GenerationParams {
    /// Sampling only happens when enabled and the temperature is positive
    pub fn is_greedy(&self) -> bool {
        !self.do_sample || self.temperature <= 0.0
    }
}

/// Generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Token count when the backend reports one
    pub tokens_generated: Option<usize>,
    pub finish_reason: FinishReason,
}

/// Reason why generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    MaxTokens,
    EndOfSequence,
    /// Reported by a remote backend
    Stop,
}

/// Create the engine selected by `model.backend`
pub fn create_engine(config: &AppConfig) -> Result<Arc<dyn ChatEngine>> {
    let engine: Arc<dyn ChatEngine> = match config.model.backend {
        EngineBackend::Local => Arc::new(CandleEngine::new(
            config.model.clone(),
            config.optimization.clone(),
        )?),
        EngineBackend::Openai => Arc::new(OpenAiEngine::new(config.openai.clone())?),
    };
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_selection() {
        let mut params = GenerationParams::default();
        assert!(params.is_greedy());

        params.do_sample = true;
        assert!(!params.is_greedy());

        params.temperature = 0.0;
        assert!(params.is_greedy());
    }

    #[test]
    fn test_create_engine_follows_backend() {
        let mut config = AppConfig::default();
        let engine = create_engine(&config).unwrap();
        assert_eq!(engine.name(), "candle");
        assert!(!engine.is_loaded());

        config.model.backend = EngineBackend::Openai;
        let engine = create_engine(&config).unwrap();
        assert_eq!(engine.name(), "openai");
        assert_eq!(engine.device(), "remote");
    }
}
