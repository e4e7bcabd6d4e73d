//! Error types for the lehrbot service.

use std::result;
use thiserror::Error;

/// A specialized Result type for lehrbot operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type for lehrbot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine has no model loaded
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Model loading or forward pass errors
    #[error("Model error: {0}")]
    Model(String),

    /// Tokenizer errors
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Chat template rendering errors
    #[error("Template error: {0}")]
    Template(String),

    /// Remote generation API errors
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Word document errors
    #[error("Document error: {0}")]
    Document(String),

    /// Tabular output errors
    #[error("Data frame error: {0}")]
    DataFrame(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Short machine-readable name used in error response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::ModelNotLoaded => "ModelNotLoaded",
            Error::Model(_) => "ModelError",
            Error::Tokenizer(_) => "TokenizerError",
            Error::Template(_) => "TemplateError",
            Error::RemoteApi(_) => "RemoteApiError",
            Error::Validation(_) => "ValidationError",
            Error::Document(_) => "DocumentError",
            Error::DataFrame(_) => "DataFrameError",
            Error::Io(_) => "IoError",
            Error::Serialization(_) => "SerializationError",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<candle_core::Error> for Error {
    fn from(err: candle_core::Error) -> Self {
        Error::Model(err.to_string())
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Template(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteApi(err.to_string())
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(err: polars::error::PolarsError) -> Self {
        Error::DataFrame(err.to_string())
    }
}
