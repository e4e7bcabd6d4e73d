//! lehrbot binary.
//!
//! Entry point for the tutor chat server and the offline dataset and
//! evaluation tools.

use anyhow::{Context, Result};
use clap::Parser;
use lehrbot_core::{
    cli::commands::Commands,
    cli::handlers::{
        handle_chat, handle_config, handle_evaluate, handle_export, handle_info, handle_prepare,
        handle_serve, handle_status, handle_summarize, worker_threads,
    },
    cli::Cli,
    config::ConfigManager,
    logging::init_logging,
};
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigManager::load(&cli.config_dir);
    let _log_guard = init_logging(&config.settings().logging).context("failed to initialize logging")?;
    config.log_load_outcome();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %config.config_dir().display(),
        "lehrbot starting up"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Commands::Serve(cmd) = &cli.command {
        builder.worker_threads(worker_threads(&config, cmd));
    }
    let runtime = builder.build().context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Serve(cmd) => handle_serve(config, cmd).await,
            Commands::Chat(cmd) => handle_chat(config, cmd).await,
            Commands::Status => handle_status(config).await,
            Commands::Prepare(cmd) => handle_prepare(config, cmd).await,
            Commands::Export(cmd) => handle_export(config, cmd),
            Commands::Evaluate(cmd) => handle_evaluate(config, cmd).await,
            Commands::Summarize(cmd) => handle_summarize(config, cmd),
            Commands::Config(cmd) => handle_config(&config, cmd),
            Commands::Info => handle_info(&config),
        }
    })
}
