//! Model lifecycle and chat bookkeeping on top of a [`ChatEngine`]

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::runtime::template_engine::ChatMessage;
use crate::runtime::{ChatEngine, Generation, GenerationParams};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot reported by `GET /api/v1/model/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub tokenizer_loaded: bool,
    pub device: String,
    /// Seconds spent in the last successful load
    pub load_time: f64,
    pub total_inferences: u64,
    pub total_tokens_generated: u64,
    pub gpu_memory_gb: f64,
    pub system_prompt: String,
}

/// Per-request overrides of the configured decoding parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub max_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

/// Owns the engine and the system prompt; counts inferences
pub struct ModelManager {
    engine: Arc<dyn ChatEngine>,
    model_config: ModelConfig,
    system_prompt: String,
    load_time: RwLock<f64>,
    total_inferences: AtomicU64,
    total_tokens_generated: AtomicU64,
}

impl ModelManager {
    pub fn new(engine: Arc<dyn ChatEngine>, model_config: ModelConfig, system_prompt: impl Into<String>) -> Self {
        Self {
            engine,
            model_config,
            system_prompt: system_prompt.into(),
            load_time: RwLock::new(0.0),
            total_inferences: AtomicU64::new(0),
            total_tokens_generated: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ChatEngine> {
        &self.engine
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Load the model and record how long it took
    pub async fn load_model(&self) -> Result<()> {
        info!(backend = self.engine.name(), model = %self.model_config.base_model, "Loading model...");
        let start = Instant::now();

        match self.engine.load().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                *self.load_time.write() = elapsed;
                info!(
                    load_time = elapsed,
                    device = %self.engine.device(),
                    gpu_memory_gb = self.gpu_memory_gb(),
                    "Model loaded successfully"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to load model");
                Err(e)
            }
        }
    }

    pub async fn unload_model(&self) -> Result<()> {
        self.engine.unload().await?;
        info!("Model unloaded");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn device(&self) -> String {
        self.engine.device()
    }

    pub fn gpu_memory_gb(&self) -> f64 {
        self.engine.memory_bytes() as f64 / BYTES_PER_GB
    }

    fn params(&self, options: &ChatOptions) -> GenerationParams {
        GenerationParams {
            max_tokens: options.max_tokens.unwrap_or(self.model_config.max_tokens),
            temperature: options.temperature.unwrap_or(self.model_config.temperature),
            top_p: options.top_p.unwrap_or(self.model_config.top_p),
            do_sample: self.model_config.do_sample,
        }
    }

    /// Answer a single student message under the system prompt
    pub async fn chat(&self, message: &str, options: &ChatOptions) -> Result<Generation> {
        if !self.engine.is_loaded() {
            return Err(Error::ModelNotLoaded);
        }

        let messages = [
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(message),
        ];
        let params = self.params(options);

        let start = Instant::now();
        let generation = self.engine.generate(&messages, &params).await?;
        let duration = start.elapsed().as_secs_f64();

        self.total_inferences.fetch_add(1, Ordering::Relaxed);
        if let Some(tokens) = generation.tokens_generated {
            self.total_tokens_generated.fetch_add(tokens as u64, Ordering::Relaxed);
        }

        info!(
            prompt_length = message.chars().count(),
            response_length = generation.text.chars().count(),
            duration,
            "Model inference"
        );
        Ok(generation)
    }

    pub fn get_model_status(&self) -> ModelStatus {
        ModelStatus {
            model_loaded: self.engine.is_loaded(),
            tokenizer_loaded: self.engine.tokenizer_loaded(),
            device: self.engine.device(),
            load_time: *self.load_time.read(),
            total_inferences: self.total_inferences.load(Ordering::Relaxed),
            total_tokens_generated: self.total_tokens_generated.load(Ordering::Relaxed),
            gpu_memory_gb: self.gpu_memory_gb(),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FinishReason;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct RecordingEngine {
        loaded: AtomicBool,
        seen: Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>,
    }

    #[async_trait]
    impl ChatEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }
        async fn load(&self) -> Result<()> {
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn unload(&self) -> Result<()> {
            self.loaded.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }
        fn tokenizer_loaded(&self) -> bool {
            self.is_loaded()
        }
        fn device(&self) -> String {
            "cpu".to_string()
        }
        fn memory_bytes(&self) -> u64 {
            0
        }
        async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<Generation> {
            self.seen.lock().push((messages.to_vec(), params.clone()));
            Ok(Generation {
                text: "Richtig!".to_string(),
                tokens_generated: Some(3),
                finish_reason: FinishReason::EndOfSequence,
            })
        }
    }

    #[tokio::test]
    async fn test_chat_requires_loaded_model() {
        let manager = ModelManager::new(Arc::new(RecordingEngine::default()), ModelConfig::default(), "sys");
        let err = manager.chat("Hallo", &ChatOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::ModelNotLoaded));
    }

    #[tokio::test]
    async fn test_chat_builds_conversation_and_counts() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = ModelManager::new(engine.clone(), ModelConfig::default(), "Sei ein Lehrer.");
        manager.load_model().await.unwrap();

        let options = ChatOptions {
            max_tokens: Some(32),
            ..ChatOptions::default()
        };
        let reply = manager.chat("Wie geht's?", &options).await.unwrap();
        assert_eq!(reply.text, "Richtig!");
        manager.chat("Noch einmal", &ChatOptions::default()).await.unwrap();

        let seen = engine.seen.lock();
        assert_eq!(seen[0].0, vec![ChatMessage::system("Sei ein Lehrer."), ChatMessage::user("Wie geht's?")]);
        assert_eq!(seen[0].1.max_tokens, 32);
        assert_eq!(seen[1].1.max_tokens, 256);
        assert_eq!(seen[1].1.temperature, 0.2);
        assert!(!seen[1].1.do_sample);

        let status = manager.get_model_status();
        assert!(status.model_loaded);
        assert_eq!(status.total_inferences, 2);
        assert_eq!(status.total_tokens_generated, 6);
        assert_eq!(status.system_prompt, "Sei ein Lehrer.");
    }

    #[tokio::test]
    async fn test_unload_reports_not_loaded() {
        let manager = ModelManager::new(Arc::new(RecordingEngine::default()), ModelConfig::default(), "sys");
        manager.load_model().await.unwrap();
        manager.unload_model().await.unwrap();
        assert!(!manager.get_model_status().model_loaded);
    }
}
