//! German language tutor chat service.
//!
//! A REST API that answers learner messages with a quantized causal language
//! model, plus offline tools to build training datasets from Word documents
//! and to compare fine-tuned checkpoints.

pub mod api;
pub mod cli;
pub mod config;
pub mod dataprep;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod runtime;
pub mod server;

pub use config::{AppConfig, ConfigManager};
pub use error::{Error, Result};
pub use runtime::{create_engine, ChatEngine, ChatMessage, Generation, GenerationParams, ModelManager};
pub use server::state::ServerState;
