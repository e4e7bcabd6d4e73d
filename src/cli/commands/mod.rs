pub mod chat;
pub mod config;
pub mod data;
pub mod evaluate;
pub mod server;

pub use chat::ChatCommand;
pub use config::{ConfigAction, ConfigCommand};
pub use data::{ExportCommand, PrepareCommand};
pub use evaluate::{EvaluateCommand, SummarizeCommand};
pub use server::ServeCommand;

use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the chat API server
    Serve(ServeCommand),
    /// Send one message to the tutor and print the reply
    Chat(ChatCommand),
    /// Load the model and print its status
    Status,
    /// Build an answered dataset from a Word document
    Prepare(PrepareCommand),
    /// Export a prepared dataset as chat-formatted training records
    Export(ExportCommand),
    /// Evaluate a checkpoint against the prompt set
    Evaluate(EvaluateCommand),
    /// Summarize all evaluation results of a directory
    Summarize(SummarizeCommand),
    /// Inspect the configuration
    Config(ConfigCommand),
    /// Print build and device information
    Info,
}
