//! Local inference over quantized GGUF weights with candle

use crate::config::{Architecture, DevicePreference, ModelConfig, OptimizationConfig};
use crate::error::{Error, Result};
use crate::runtime::model_files::resolve_model_files;
use crate::runtime::template_engine::{ChatMessage, TemplateEngine};
use crate::runtime::{ChatEngine, FinishReason, Generation, GenerationParams};
use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::{quantized_llama, quantized_qwen2, quantized_qwen3};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Quantized model weights for the supported architectures
enum QuantizedModel {
    Qwen3(quantized_qwen3::ModelWeights),
    Qwen2(quantized_qwen2::ModelWeights),
    Llama(quantized_llama::ModelWeights),
}

impl QuantizedModel {
    fn load(architecture: Architecture, path: &Path, device: &Device) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let content = gguf_file::Content::read(&mut file).map_err(|e| e.with_path(path))?;

        let model = match architecture {
            Architecture::Qwen3 => {
                Self::Qwen3(quantized_qwen3::ModelWeights::from_gguf(content, &mut file, device)?)
            }
            Architecture::Qwen2 => {
                Self::Qwen2(quantized_qwen2::ModelWeights::from_gguf(content, &mut file, device)?)
            }
            Architecture::Llama => {
                Self::Llama(quantized_llama::ModelWeights::from_gguf(content, &mut file, device)?)
            }
        };
        Ok(model)
    }

    /// Forward pass; `offset` 0 starts a fresh KV cache
    fn forward(&mut self, input: &Tensor, offset: usize) -> Result<Tensor> {
        let logits = match self {
            Self::Qwen3(m) => m.forward(input, offset)?,
            Self::Qwen2(m) => m.forward(input, offset)?,
            Self::Llama(m) => m.forward(input, offset)?,
        };
        Ok(logits)
    }
}

/// Decoding knobs for one generation call
#[derive(Debug, Clone)]
struct DecodeSettings {
    max_tokens: usize,
    max_context_tokens: usize,
    repeat_penalty: f32,
    repeat_last_n: usize,
    seed: u64,
    sampling: Sampling,
}

impl DecodeSettings {
    fn new(config: &ModelConfig, params: &GenerationParams) -> Self {
        Self {
            max_tokens: params.max_tokens,
            max_context_tokens: config.max_context_tokens,
            repeat_penalty: config.repeat_penalty,
            repeat_last_n: config.repeat_last_n,
            seed: config.seed,
            sampling: sampling_for(params),
        }
    }
}

fn sampling_for(params: &GenerationParams) -> Sampling {
    if params.is_greedy() {
        Sampling::ArgMax
    } else if params.top_p >= 1.0 {
        Sampling::All {
            temperature: params.temperature,
        }
    } else {
        Sampling::TopP {
            p: params.top_p,
            temperature: params.temperature,
        }
    }
}

/// Keep the rightmost tokens so that prompt plus reply fit the context window
fn truncate_prompt(tokens: &[u32], max_context_tokens: usize, max_new_tokens: usize) -> &[u32] {
    let budget = max_context_tokens.saturating_sub(max_new_tokens).max(1);
    if tokens.len() > budget {
        &tokens[tokens.len() - budget..]
    } else {
        tokens
    }
}

/// Reduce model output to a 1-D logits vector for the last position
fn last_token_logits(logits: Tensor) -> Result<Tensor> {
    let logits = match logits.rank() {
        1 => logits,
        2 => logits.squeeze(0)?,
        3 => {
            let seq_len = logits.dim(1)?;
            logits.squeeze(0)?.get(seq_len - 1)?
        }
        rank => return Err(Error::Model(format!("unexpected logits rank {}", rank))),
    };
    Ok(logits.to_dtype(DType::F32)?)
}

fn select_device(preference: DevicePreference, ordinal: usize) -> Result<Device> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => Ok(Device::cuda_if_available(ordinal)?),
        DevicePreference::Cuda => {
            if candle_core::utils::cuda_is_available() {
                Ok(Device::new_cuda(ordinal)?)
            } else {
                Err(Error::Model(
                    "optimization.device is cuda but CUDA is not available".to_string(),
                ))
            }
        }
    }
}

fn device_label(device: &Device, ordinal: usize) -> String {
    if device.is_cuda() {
        format!("cuda:{}", ordinal)
    } else if device.is_metal() {
        "metal".to_string()
    } else {
        "cpu".to_string()
    }
}

/// A model ready to generate
struct LoadedModel {
    model: QuantizedModel,
    tokenizer: Tokenizer,
    device: Device,
    eos_ids: Vec<u32>,
}

impl LoadedModel {
    fn generate(&mut self, prompt: &str, settings: &DecodeSettings) -> Result<Generation> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        let prompt_tokens = truncate_prompt(
            encoding.get_ids(),
            settings.max_context_tokens,
            settings.max_tokens,
        )
        .to_vec();
        if prompt_tokens.is_empty() {
            return Err(Error::Tokenizer("prompt encodes to no tokens".to_string()));
        }
        if prompt_tokens.len() < encoding.get_ids().len() {
            debug!(
                original = encoding.get_ids().len(),
                kept = prompt_tokens.len(),
                "Prompt truncated to fit context window"
            );
        }

        let mut processor = LogitsProcessor::from_sampling(settings.seed, settings.sampling.clone());
        let mut all_tokens = prompt_tokens.clone();
        let mut generated: Vec<u32> = Vec::with_capacity(settings.max_tokens);
        let mut finish_reason = FinishReason::MaxTokens;

        let mut input = prompt_tokens;
        let mut offset = 0;
        for _ in 0..settings.max_tokens {
            let tensor = Tensor::new(input.as_slice(), &self.device)?.unsqueeze(0)?;
            let logits = last_token_logits(self.model.forward(&tensor, offset)?)?;
            let logits = if settings.repeat_penalty == 1.0 {
                logits
            } else {
                let start = all_tokens.len().saturating_sub(settings.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    settings.repeat_penalty,
                    &all_tokens[start..],
                )?
            };

            let next = processor.sample(&logits)?;
            offset += input.len();

            if self.eos_ids.contains(&next) {
                finish_reason = FinishReason::EndOfSequence;
                break;
            }
            generated.push(next);
            all_tokens.push(next);
            input = vec![next];
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        Ok(Generation {
            text: text.trim().to_string(),
            tokens_generated: Some(generated.len()),
            finish_reason,
        })
    }
}

/// Load-time facts readable while a generation holds the model
#[derive(Debug, Clone)]
struct LoadedInfo {
    device: String,
    memory_bytes: u64,
}

/// Candle-based engine for quantized GGUF chat models
pub struct CandleEngine {
    model_config: ModelConfig,
    optimization: OptimizationConfig,
    template: TemplateEngine,
    model: Arc<Mutex<Option<LoadedModel>>>,
    info: RwLock<Option<LoadedInfo>>,
}

impl CandleEngine {
    /// Create an unloaded engine; the chat template is validated here
    pub fn new(model_config: ModelConfig, optimization: OptimizationConfig) -> Result<Self> {
        let template = TemplateEngine::new(
            model_config.prompt_format,
            model_config.chat_template.as_deref(),
        )?;

        Ok(Self {
            model_config,
            optimization,
            template,
            model: Arc::new(Mutex::new(None)),
            info: RwLock::new(None),
        })
    }
}

#[async_trait]
impl ChatEngine for CandleEngine {
    fn name(&self) -> &str {
        "candle"
    }

    async fn load(&self) -> Result<()> {
        let files = resolve_model_files(&self.model_config).await?;
        let device = select_device(self.optimization.device, self.optimization.cuda_device)?;
        let label = device_label(&device, self.optimization.cuda_device);
        let architecture = self.model_config.architecture;
        let eos_tokens = self.model_config.eos_tokens.clone();

        info!(
            weights = %files.weights.display(),
            tokenizer = %files.tokenizer.display(),
            device = %label,
            architecture = ?architecture,
            "Loading model"
        );

        let start = Instant::now();
        let (loaded, weights_bytes) = tokio::task::spawn_blocking(move || -> Result<(LoadedModel, u64)> {
            let tokenizer = Tokenizer::from_file(&files.tokenizer)
                .map_err(|e| Error::Tokenizer(format!("{}: {}", files.tokenizer.display(), e)))?;
            let model = QuantizedModel::load(architecture, &files.weights, &device)?;
            let weights_bytes = std::fs::metadata(&files.weights)?.len();

            let eos_ids: Vec<u32> = eos_tokens
                .iter()
                .filter_map(|t| tokenizer.token_to_id(t))
                .collect();
            if eos_ids.is_empty() {
                warn!("None of the configured eos_tokens are in the vocabulary; generation runs to max_tokens");
            }

            Ok((
                LoadedModel {
                    model,
                    tokenizer,
                    device,
                    eos_ids,
                },
                weights_bytes,
            ))
        })
        .await
        .map_err(|e| Error::Model(format!("model loading task failed: {}", e)))??;

        let memory_bytes = if loaded.device.is_cuda() { weights_bytes } else { 0 };
        *self.model.lock() = Some(loaded);
        *self.info.write() = Some(LoadedInfo {
            device: label,
            memory_bytes,
        });

        info!(elapsed_secs = start.elapsed().as_secs_f64(), "Model weights ready");
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        *self.info.write() = None;
        *self.model.lock() = None;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.info.read().is_some()
    }

    fn tokenizer_loaded(&self) -> bool {
        self.is_loaded()
    }

    fn device(&self) -> String {
        self.info
            .read()
            .as_ref()
            .map(|i| i.device.clone())
            .unwrap_or_else(|| "cpu".to_string())
    }

    fn memory_bytes(&self) -> u64 {
        self.info.read().as_ref().map(|i| i.memory_bytes).unwrap_or(0)
    }

    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<Generation> {
        if !self.is_loaded() {
            return Err(Error::ModelNotLoaded);
        }

        let prompt = self.template.render(messages, true)?;
        let settings = DecodeSettings::new(&self.model_config, params);
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || {
            let mut guard = model.lock();
            let loaded = guard.as_mut().ok_or(Error::ModelNotLoaded)?;
            loaded.generate(&prompt, &settings)
        })
        .await
        .map_err(|e| Error::Model(format!("generation task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_prompt_keeps_rightmost_tokens() {
        let tokens: Vec<u32> = (0..10).collect();
        assert_eq!(truncate_prompt(&tokens, 8, 3), &[5, 6, 7, 8, 9]);
        assert_eq!(truncate_prompt(&tokens, 100, 3), tokens.as_slice());
        // Reply budget larger than the window still keeps one token
        assert_eq!(truncate_prompt(&tokens, 4, 10), &[9]);
    }

    #[test]
    fn test_sampling_selection() {
        let mut params = GenerationParams::default();
        assert!(matches!(sampling_for(&params), Sampling::ArgMax));

        params.do_sample = true;
        assert!(matches!(sampling_for(&params), Sampling::TopP { .. }));

        params.top_p = 1.0;
        assert!(matches!(sampling_for(&params), Sampling::All { .. }));
    }

    #[test]
    fn test_last_token_logits_shapes() {
        let device = Device::Cpu;
        let flat = Tensor::new(&[0.1f32, 0.2, 0.3], &device).unwrap();
        assert_eq!(last_token_logits(flat).unwrap().dims(), &[3]);

        let batched = Tensor::zeros((1, 5), DType::F32, &device).unwrap();
        assert_eq!(last_token_logits(batched).unwrap().dims(), &[5]);

        let seq = Tensor::new(&[[[1f32, 2.], [3., 4.]]], &device).unwrap();
        let last = last_token_logits(seq).unwrap();
        assert_eq!(last.to_vec1::<f32>().unwrap(), vec![3., 4.]);
    }

    #[test]
    fn test_cpu_device_label() {
        let device = select_device(DevicePreference::Cpu, 0).unwrap();
        assert_eq!(device_label(&device, 0), "cpu");
    }

    #[tokio::test]
    async fn test_generate_requires_loaded_model() {
        let engine = CandleEngine::new(ModelConfig::default(), OptimizationConfig::default()).unwrap();
        assert!(!engine.is_loaded());
        assert_eq!(engine.memory_bytes(), 0);

        let err = engine
            .generate(&[ChatMessage::user("Hallo")], &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotLoaded));
    }
}
