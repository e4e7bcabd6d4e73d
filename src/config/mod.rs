//! Configuration management for lehrbot.
//!
//! Configuration is assembled from layered sources, later sources overriding
//! earlier ones key by key:
//! 1. Built-in defaults (serialized from [`AppConfig::default`])
//! 2. `<config_dir>/model_config.yaml`
//! 3. `<config_dir>/app_config.yaml`
//! 4. Environment variables prefixed with `LEHRBOT__` (`LEHRBOT__SERVER__PORT=9000`)
//!
//! A file that exists but cannot be parsed makes the whole load fall back to
//! the built-in defaults. Values are looked up by dotted path
//! (`"model.max_tokens"`) or through the typed [`AppConfig`] view.

pub mod settings;

pub use settings::{
    AppConfig, AppInfo, Architecture, CacheConfig, CorsConfig, DataConfig, DevicePreference,
    EngineBackend, EvaluationConfig, LogFormat, LoggingConfig, LoraConfig, ModelConfig,
    OpenAiConfig, OptimizationConfig, PromptFormat, ServerConfig, TrainingConfig,
    DEFAULT_SYSTEM_PROMPT,
};

use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Model-side configuration file name
pub const MODEL_CONFIG_FILE: &str = "model_config.yaml";
/// Application-side configuration file name
pub const APP_CONFIG_FILE: &str = "app_config.yaml";
/// Default configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Merged configuration tree with dotted-path access
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
    raw: Config,
    settings: AppConfig,
    load_error: Option<String>,
}

impl ConfigManager {
    /// Load configuration from `config_dir`, falling back to defaults on failure.
    ///
    /// Nothing is logged here since this normally runs before the subscriber
    /// exists; call [`ConfigManager::log_load_outcome`] once logging is up.
    pub fn load(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();

        let loaded = Self::build(&config_dir).and_then(|raw| {
            let settings = raw.clone().try_deserialize::<AppConfig>()?;
            Ok((raw, settings))
        });

        match loaded {
            Ok((raw, settings)) => Self {
                config_dir,
                raw,
                settings,
                load_error: None,
            },
            Err(e) => {
                let mut manager = Self::from_defaults();
                manager.config_dir = config_dir;
                manager.load_error = Some(e.to_string());
                manager
            }
        }
    }

    /// Why [`ConfigManager::load`] fell back to the built-in defaults
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Report how [`ConfigManager::load`] went
    pub fn log_load_outcome(&self) {
        match &self.load_error {
            None => info!(config_dir = %self.config_dir.display(), "Configuration loaded successfully"),
            Some(e) => warn!(
                config_dir = %self.config_dir.display(),
                error = %e,
                "Error loading configuration, using default configuration"
            ),
        }
    }

    /// Configuration holding only the built-in defaults
    pub fn from_defaults() -> Self {
        let settings = AppConfig::default();
        let raw = Config::builder()
            .add_source(Self::defaults_source())
            .build()
            .unwrap_or_default();

        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            raw,
            settings,
            load_error: None,
        }
    }

    fn defaults_source() -> Config {
        Config::try_from(&AppConfig::default()).unwrap_or_default()
    }

    fn build(config_dir: &Path) -> Result<Config> {
        let raw = Config::builder()
            .add_source(Self::defaults_source())
            .add_source(
                File::from(config_dir.join(MODEL_CONFIG_FILE))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(config_dir.join(APP_CONFIG_FILE))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("LEHRBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(raw)
    }

    /// Directory the configuration files were read from
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Typed view of the merged tree
    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }

    /// Look up a value by dotted path
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw.get::<T>(key).ok()
    }

    /// Look up a value by dotted path, returning `default` when the key is
    /// missing or holds a value of another type
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Override a value at runtime; intermediate tables are created as needed
    pub fn set(&mut self, key: &str, value: impl Into<config::Value>) -> Result<()> {
        let value = value.into();
        let raw = Config::builder()
            .add_source(self.raw.clone())
            .set_override(key, value.clone())?
            .build()?;
        let settings = raw.clone().try_deserialize::<AppConfig>()?;

        self.raw = raw;
        self.settings = settings;
        info!("Configuration updated: {} = {}", key, value);
        Ok(())
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.settings.model
    }

    pub fn optimization_config(&self) -> &OptimizationConfig {
        &self.settings.optimization
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.settings.server
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.settings.cache
    }

    /// System prompt prepended to every conversation
    pub fn system_prompt(&self) -> String {
        self.settings.system_prompt.clone()
    }

    /// Configuration subset that is safe to expose over HTTP
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "model": {
                "base_model": self.get::<serde_json::Value>("model.base_model"),
                "backend": self.get::<serde_json::Value>("model.backend"),
                "max_tokens": self.get::<serde_json::Value>("model.max_tokens"),
                "temperature": self.get::<serde_json::Value>("model.temperature"),
            },
            "optimization": {
                "quantization": self.get::<serde_json::Value>("optimization.quantization"),
                "device": self.get::<serde_json::Value>("optimization.device"),
            },
            "server": {
                "host": self.get::<serde_json::Value>("server.host"),
                "port": self.get::<serde_json::Value>("server.port"),
            },
        })
    }

    /// Render the typed configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.settings)?)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::from_defaults()
    }
}
