//! Command handlers

use crate::cli::commands::{
    ChatCommand, ConfigAction, ConfigCommand, EvaluateCommand, ExportCommand, PrepareCommand,
    ServeCommand, SummarizeCommand,
};
use crate::config::{ConfigManager, PromptFormat};
use crate::dataprep;
use crate::evaluation::{self, EvaluationOptions};
use crate::runtime::{
    create_engine, CandleEngine, ChatEngine, ChatOptions, GenerationParams, ModelManager,
    OpenAiEngine,
};
use crate::server;
use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

/// Bind address from CLI overrides and `server.*`
pub fn listen_addr(config: &ConfigManager, cmd: &ServeCommand) -> Result<SocketAddr> {
    let server = config.server_config();
    let host = cmd.host.clone().unwrap_or_else(|| server.host.clone());
    let port = cmd.port.unwrap_or(server.port);
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))
}

/// Tokio worker threads for `serve`
pub fn worker_threads(config: &ConfigManager, cmd: &ServeCommand) -> usize {
    cmd.workers.unwrap_or(config.server_config().workers).max(1)
}

pub async fn handle_serve(config: ConfigManager, cmd: ServeCommand) -> Result<()> {
    let addr = listen_addr(&config, &cmd)?;
    server::run(Arc::new(config), addr)
        .await
        .context("server terminated with an error")
}

async fn loaded_manager(config: &ConfigManager) -> Result<ModelManager> {
    let engine = create_engine(config.settings())?;
    let manager = ModelManager::new(engine, config.model_config().clone(), config.system_prompt());
    manager.load_model().await.context("failed to load model")?;
    Ok(manager)
}

pub async fn handle_chat(config: ConfigManager, cmd: ChatCommand) -> Result<()> {
    let manager = loaded_manager(&config).await?;
    let options = ChatOptions {
        max_tokens: cmd.max_tokens,
        ..ChatOptions::default()
    };
    let generation = manager.chat(&cmd.message, &options).await?;
    println!("{}", generation.text);
    manager.unload_model().await?;
    Ok(())
}

pub async fn handle_status(config: ConfigManager) -> Result<()> {
    let manager = loaded_manager(&config).await?;
    println!("{}", serde_json::to_string_pretty(&manager.get_model_status())?);
    manager.unload_model().await?;
    Ok(())
}

pub async fn handle_prepare(config: ConfigManager, cmd: PrepareCommand) -> Result<()> {
    let settings = config.settings();
    let use_openai = if cmd.openai {
        true
    } else if cmd.local {
        false
    } else {
        settings.data.use_openai
    };

    let (generator, params): (Arc<dyn ChatEngine>, GenerationParams) = if use_openai {
        let params = GenerationParams {
            max_tokens: settings.openai.max_tokens,
            temperature: settings.openai.temperature,
            top_p: 1.0,
            do_sample: true,
        };
        (Arc::new(OpenAiEngine::new(settings.openai.clone())?), params)
    } else {
        let mut model = settings.model.clone();
        model.prompt_format = PromptFormat::Tagged;
        let params = GenerationParams {
            max_tokens: settings.data.max_tokens,
            temperature: model.temperature,
            top_p: model.top_p,
            do_sample: false,
        };
        (Arc::new(CandleEngine::new(model, settings.optimization.clone())?), params)
    };

    generator.load().await.context("failed to prepare the answer generator")?;
    let summary = dataprep::prepare_dataset(
        &cmd.docx,
        &cmd.output,
        &config.system_prompt(),
        &settings.data.level,
        generator.as_ref(),
        &params,
    )
    .await?;
    generator.unload().await?;

    info!(
        total_blocks = summary.total_blocks,
        valid_blocks = summary.valid_blocks,
        output = %cmd.output.display(),
        "Dataset prepared"
    );
    Ok(())
}

pub fn handle_export(config: ConfigManager, cmd: ExportCommand) -> Result<()> {
    let tokenizer = match &cmd.tokenizer {
        Some(path) => Some(
            Tokenizer::from_file(path)
                .map_err(|e| anyhow::anyhow!("cannot load tokenizer {}: {}", path.display(), e))?,
        ),
        None => None,
    };
    let max_length = cmd.max_length.unwrap_or(config.settings().data.export_max_length);

    let count = dataprep::export_training_file(&cmd.input, &cmd.output, tokenizer.as_ref(), max_length)?;
    println!("Exported {} records to {}", count, cmd.output.display());
    Ok(())
}

pub async fn handle_evaluate(mut config: ConfigManager, cmd: EvaluateCommand) -> Result<()> {
    if let Some(path) = &cmd.model_path {
        config.set("model.model_path", path.display().to_string())?;
    }

    let mut options = EvaluationOptions::from(&config.settings().evaluation);
    if let Some(path) = &cmd.prompts {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read prompts file {}", path.display()))?;
        let prompts: Vec<String> =
            serde_json::from_str(&raw).context("prompts file must be a JSON array of strings")?;
        options.prompts = Some(prompts);
    }
    if let Some(max_new_tokens) = cmd.max_new_tokens {
        options.max_new_tokens = max_new_tokens;
    }
    if let Some(save_dir) = cmd.save_dir {
        options.save_dir = save_dir;
    }

    let engine = create_engine(config.settings())?;
    engine.load().await.context("failed to load model")?;
    let records = evaluation::evaluate_model(engine.as_ref(), &cmd.model_name, &options).await?;
    engine.unload().await?;

    for record in &records {
        println!("[{:.2}s] {}", record.time_sec, record.prompt.lines().next().unwrap_or_default());
    }
    Ok(())
}

pub fn handle_summarize(config: ConfigManager, cmd: SummarizeCommand) -> Result<()> {
    let dir = cmd
        .dir
        .unwrap_or_else(|| config.settings().evaluation.save_dir.clone());
    let rows = evaluation::summarize_all_results(&dir)?;

    println!("{:<40} {:>12} {:>8}", "model", "avg_time_sec", "prompts");
    for row in rows {
        println!("{:<40} {:>12.2} {:>8}", row.model, row.avg_time_sec, row.prompt_count);
    }
    Ok(())
}

pub fn handle_config(config: &ConfigManager, cmd: ConfigCommand) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => {
            print!("{}", config.to_yaml()?);
        }
        ConfigAction::Get { key } => match config.get::<serde_json::Value>(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => bail!("configuration key '{}' is not set", key),
        },
    }
    Ok(())
}

pub fn handle_info(config: &ConfigManager) -> Result<()> {
    let settings = config.settings();
    println!("{} {}", settings.app.name, env!("CARGO_PKG_VERSION"));
    println!("CUDA available: {}", candle_core::utils::cuda_is_available());
    println!("Device preference: {:?}", settings.optimization.device);
    println!("Backend: {:?}", settings.model.backend);
    println!("Base model: {}", settings.model.base_model);
    println!("Weights: {}/{}", settings.model.gguf_repo, settings.model.gguf_file);
    println!("Config dir: {}", config.config_dir().display());
    Ok(())
}
