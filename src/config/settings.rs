//! Typed configuration sections
//!
//! Every field carries a serde default so that a partial YAML tree (or an
//! empty one) still deserializes into a complete [`AppConfig`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prompt used when no `system_prompt` is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Ты — преподаватель немецкого языка для русскоязычных студентов уровня A2. \
Сначала проанализируй диалог: укажи, есть ли ошибки, объясни их. \
Объяснение давай на русском языке. \
Затем предложи похожее упражнение на основе темы диалога. \
Отвечай строго по делу, без лишних вступлений.";

/// Root configuration combining all sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppInfo,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub optimization: OptimizationConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub lora: LoraConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppInfo::default(),
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            model: ModelConfig::default(),
            optimization: OptimizationConfig::default(),
            openai: OpenAiConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            data: DataConfig::default(),
            evaluation: EvaluationConfig::default(),
            lora: LoraConfig::default(),
            training: TrainingConfig::default(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Service identity reported by `/` and `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_description")]
    pub description: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

fn default_app_name() -> String {
    "German Language Teaching Chatbot".to_string()
}
fn default_app_description() -> String {
    "AI-powered German language tutor for Russian-speaking students".to_string()
}
fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            description: default_app_description(),
            version: default_app_version(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Tokio worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Accepted `Host` header values; empty accepts any host
    #[serde(default)]
    pub trusted_hosts: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_workers() -> usize {
    1
}
fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            trusted_hosts: Vec::new(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allowed origins (`["*"]` allows any origin)
    #[serde(default = "default_wildcard")]
    pub allow_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub allow_credentials: bool,

    #[serde(default = "default_wildcard")]
    pub allow_methods: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub allow_headers: Vec<String>,

    /// Max age for preflight cache (in seconds)
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_true() -> bool {
    true
}
fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origins: default_wildcard(),
            allow_credentials: true,
            allow_methods: default_wildcard(),
            allow_headers: default_wildcard(),
            max_age: default_cors_max_age(),
        }
    }
}

/// Which engine answers chat requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Quantized GGUF model run in-process with candle
    #[default]
    Local,
    /// OpenAI chat completions
    Openai,
}

/// Supported quantized architectures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Qwen3,
    Qwen2,
    Llama,
}

/// How chat messages are serialized into a prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    /// `<|im_start|>role ... <|im_end|>`
    #[default]
    Chatml,
    /// `<|system|> ... <|user|> ... <|assistant|>`
    Tagged,
    /// minijinja template from `model.chat_template`
    Custom,
}

/// Model identification, location and decoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: EngineBackend,

    /// Base model id; also the default tokenizer repository
    #[serde(default = "default_base_model")]
    pub base_model: String,

    /// Local `.gguf` file or directory holding one
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_gguf_repo")]
    pub gguf_repo: String,

    #[serde(default = "default_gguf_file")]
    pub gguf_file: String,

    #[serde(default)]
    pub tokenizer_repo: Option<String>,

    #[serde(default)]
    pub architecture: Architecture,

    #[serde(default)]
    pub prompt_format: PromptFormat,

    #[serde(default)]
    pub chat_template: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default)]
    pub do_sample: bool,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    #[serde(default = "default_repeat_last_n")]
    pub repeat_last_n: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_eos_tokens")]
    pub eos_tokens: Vec<String>,
}

fn default_base_model() -> String {
    "deepseek-ai/DeepSeek-R1-0528-Qwen3-8B".to_string()
}
fn default_gguf_repo() -> String {
    "unsloth/DeepSeek-R1-0528-Qwen3-8B-GGUF".to_string()
}
fn default_gguf_file() -> String {
    "DeepSeek-R1-0528-Qwen3-8B-Q4_K_M.gguf".to_string()
}
fn default_max_tokens() -> usize {
    256
}
fn default_temperature() -> f64 {
    0.2
}
fn default_top_p() -> f64 {
    0.9
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_repeat_last_n() -> usize {
    64
}
fn default_seed() -> u64 {
    299_792_458
}
fn default_max_context_tokens() -> usize {
    4096
}
fn default_eos_tokens() -> Vec<String> {
    vec![
        "<|im_end|>".to_string(),
        "<|endoftext|>".to_string(),
        "<｜end▁of▁sentence｜>".to_string(),
    ]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            base_model: default_base_model(),
            model_path: None,
            gguf_repo: default_gguf_repo(),
            gguf_file: default_gguf_file(),
            tokenizer_repo: None,
            architecture: Architecture::default(),
            prompt_format: PromptFormat::default(),
            chat_template: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            do_sample: false,
            repeat_penalty: default_repeat_penalty(),
            repeat_last_n: default_repeat_last_n(),
            seed: default_seed(),
            max_context_tokens: default_max_context_tokens(),
            eos_tokens: default_eos_tokens(),
        }
    }
}

impl ModelConfig {
    /// Repository the tokenizer is fetched from
    pub fn tokenizer_repo(&self) -> &str {
        self.tokenizer_repo.as_deref().unwrap_or(&self.base_model)
    }
}

/// Device selection for local inference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    /// Fail if CUDA is unavailable
    Cuda,
}

/// Inference placement and quantization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default)]
    pub device: DevicePreference,

    #[serde(default)]
    pub cuda_device: usize,

    /// Quantization label of the GGUF weights (informational)
    #[serde(default = "default_quantization")]
    pub quantization: String,
}

fn default_quantization() -> String {
    "q4_k_m".to_string()
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            device: DevicePreference::default(),
            cuda_device: 0,
            quantization: default_quantization(),
        }
    }
}

/// OpenAI chat completions client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default = "default_openai_temperature")]
    pub temperature: f64,

    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-4".to_string()
}
fn default_openai_temperature() -> f64 {
    0.7
}
fn default_openai_max_tokens() -> usize {
    768
}
fn default_openai_timeout_secs() -> u64 {
    120
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            model: default_openai_model(),
            project: None,
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_secs: default_openai_timeout_secs(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Rolling log file; console only when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Rotated files kept on disk
    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "INFO".to_string()
}
fn default_log_max_files() -> usize {
    5
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
            max_files: default_log_max_files(),
        }
    }
}

/// Response cache settings. Only counters are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: default_cache_ttl(),
        }
    }
}

/// Dataset preparation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Generate reference answers with OpenAI instead of the local model
    #[serde(default = "default_true")]
    pub use_openai: bool,

    /// Token budget for local reference answers
    #[serde(default = "default_data_max_tokens")]
    pub max_tokens: usize,

    /// CEFR level written into every sample
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_export_max_length")]
    pub export_max_length: usize,
}

fn default_data_max_tokens() -> usize {
    512
}
fn default_level() -> String {
    "A2".to_string()
}
fn default_export_max_length() -> usize {
    1024
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            use_openai: true,
            max_tokens: default_data_max_tokens(),
            level: default_level(),
            export_max_length: default_export_max_length(),
        }
    }
}

/// Checkpoint evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    #[serde(default = "default_eval_max_new_tokens")]
    pub max_new_tokens: usize,

    #[serde(default)]
    pub do_sample: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Overrides the built-in prompt set when non-empty
    #[serde(default)]
    pub prompts: Vec<String>,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("results")
}
fn default_eval_max_new_tokens() -> usize {
    100
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            max_new_tokens: default_eval_max_new_tokens(),
            do_sample: false,
            temperature: default_temperature(),
            prompts: Vec::new(),
        }
    }
}

/// LoRA adapter hyperparameters used by the fine-tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraConfig {
    #[serde(default = "default_lora_r")]
    pub r: usize,

    #[serde(default = "default_lora_alpha")]
    pub lora_alpha: usize,

    #[serde(default = "default_target_modules")]
    pub target_modules: Vec<String>,

    #[serde(default = "default_lora_dropout")]
    pub lora_dropout: f64,

    #[serde(default = "default_lora_bias")]
    pub bias: String,

    #[serde(default = "default_task_type")]
    pub task_type: String,
}

fn default_lora_r() -> usize {
    8
}
fn default_lora_alpha() -> usize {
    32
}
fn default_target_modules() -> Vec<String> {
    vec!["q_proj".to_string(), "v_proj".to_string()]
}
fn default_lora_dropout() -> f64 {
    0.1
}
fn default_lora_bias() -> String {
    "none".to_string()
}
fn default_task_type() -> String {
    "CAUSAL_LM".to_string()
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r: default_lora_r(),
            lora_alpha: default_lora_alpha(),
            target_modules: default_target_modules(),
            lora_dropout: default_lora_dropout(),
            bias: default_lora_bias(),
            task_type: default_task_type(),
        }
    }
}

impl LoraConfig {
    /// Effective scaling applied to the low-rank update
    pub fn scaling(&self) -> f64 {
        if self.r == 0 {
            0.0
        } else {
            self.lora_alpha as f64 / self.r as f64
        }
    }
}

/// Fine-tuning run arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_batch_size")]
    pub per_device_train_batch_size: usize,

    #[serde(default = "default_grad_accum")]
    pub gradient_accumulation_steps: usize,

    #[serde(default = "default_epochs")]
    pub num_train_epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_scheduler")]
    pub lr_scheduler_type: String,

    #[serde(default = "default_warmup_steps")]
    pub warmup_steps: usize,

    #[serde(default = "default_logging_steps")]
    pub logging_steps: usize,

    #[serde(default = "default_save_steps")]
    pub save_steps: usize,

    #[serde(default = "default_save_total_limit")]
    pub save_total_limit: usize,

    #[serde(default = "default_true")]
    pub fp16: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_batch_size() -> usize {
    4
}
fn default_grad_accum() -> usize {
    4
}
fn default_epochs() -> usize {
    3
}
fn default_learning_rate() -> f64 {
    2e-4
}
fn default_scheduler() -> String {
    "cosine".to_string()
}
fn default_warmup_steps() -> usize {
    10
}
fn default_logging_steps() -> usize {
    5
}
fn default_save_steps() -> usize {
    50
}
fn default_save_total_limit() -> usize {
    2
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            per_device_train_batch_size: default_batch_size(),
            gradient_accumulation_steps: default_grad_accum(),
            num_train_epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            lr_scheduler_type: default_scheduler(),
            warmup_steps: default_warmup_steps(),
            logging_steps: default_logging_steps(),
            save_steps: default_save_steps(),
            save_total_limit: default_save_total_limit(),
            fp16: true,
        }
    }
}

impl TrainingConfig {
    /// Samples consumed per optimizer step
    pub fn effective_batch_size(&self) -> usize {
        self.per_device_train_batch_size * self.gradient_accumulation_steps
    }
}
