//! Checkpoint evaluation against a fixed prompt set
//!
//! Each run writes `<save_dir>/<model>.json` and `<save_dir>/<model>.csv`.
//! [`summarize_all_results`] folds every result file of a directory into
//! `summary.csv` with the mean generation time per model.

use crate::error::Result;
use crate::runtime::{ChatEngine, ChatMessage, GenerationParams};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub const SUMMARY_FILE: &str = "summary.csv";

/// Prompts used when none are supplied
pub const DEFAULT_PROMPTS: [&str; 5] = [
    "Q: Кто такой Альберт Эйнштейн?\nA:",
    "Q: Объясни, как работает градиентный спуск простыми словами\nA:",
    "Q: Придумай короткий диалог между учителем и учеником на тему экологии\nA:",
    "Q: Переведи: 'I am testing a language model' и объясни перевод.\nA:",
    "Q: Придумай фантастическое животное и опиши, где оно живёт\nA:",
];

/// One evaluated prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub time_sec: f64,
}

/// One row of `summary.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub model: String,
    pub avg_time_sec: f64,
    pub prompt_count: u64,
}

#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    pub prompts: Option<Vec<String>>,
    pub max_new_tokens: usize,
    pub save_dir: PathBuf,
    pub do_sample: bool,
    pub temperature: f64,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            prompts: None,
            max_new_tokens: 100,
            save_dir: PathBuf::from("results"),
            do_sample: false,
            temperature: 0.2,
        }
    }
}

impl From<&crate::config::EvaluationConfig> for EvaluationOptions {
    fn from(config: &crate::config::EvaluationConfig) -> Self {
        Self {
            prompts: (!config.prompts.is_empty()).then(|| config.prompts.clone()),
            max_new_tokens: config.max_new_tokens,
            save_dir: config.save_dir.clone(),
            do_sample: config.do_sample,
            temperature: config.temperature,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn records_frame(records: &[EvalRecord]) -> PolarsResult<DataFrame> {
    df!(
        "model" => records.iter().map(|r| r.model.as_str()).collect::<Vec<_>>(),
        "prompt" => records.iter().map(|r| r.prompt.as_str()).collect::<Vec<_>>(),
        "response" => records.iter().map(|r| r.response.as_str()).collect::<Vec<_>>(),
        "time_sec" => records.iter().map(|r| r.time_sec).collect::<Vec<_>>(),
    )
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Run every prompt through `engine`, then save JSON and CSV results
pub async fn evaluate_model(
    engine: &dyn ChatEngine,
    model_name: &str,
    options: &EvaluationOptions,
) -> Result<Vec<EvalRecord>> {
    let prompts: Vec<String> = options
        .prompts
        .clone()
        .unwrap_or_else(|| DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect());

    let params = GenerationParams {
        max_tokens: options.max_new_tokens,
        temperature: options.temperature,
        top_p: 1.0,
        do_sample: options.do_sample,
    };

    let mut records = Vec::with_capacity(prompts.len());
    for prompt in prompts {
        let preview: String = prompt.chars().take(60).collect();
        info!(model = %model_name, prompt = %preview, "Evaluating prompt");

        let start = Instant::now();
        let generation = engine.generate(&[ChatMessage::user(prompt.clone())], &params).await?;
        let elapsed = round2(start.elapsed().as_secs_f64());

        records.push(EvalRecord {
            model: model_name.to_string(),
            prompt,
            response: generation.text.trim().to_string(),
            time_sec: elapsed,
        });
    }

    fs::create_dir_all(&options.save_dir)?;
    let json_path = options.save_dir.join(format!("{}.json", model_name));
    let csv_path = options.save_dir.join(format!("{}.csv", model_name));

    fs::write(&json_path, serde_json::to_string_pretty(&records)?)?;
    write_csv(&mut records_frame(&records)?, &csv_path)?;

    info!(json = %json_path.display(), csv = %csv_path.display(), "Evaluation results saved");
    Ok(records)
}

/// Non-recursive list of `*.json` files, sorted by name
fn result_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Aggregate all result files in `dir` into `summary.csv`, fastest model first
pub fn summarize_all_results(dir: &Path) -> Result<Vec<SummaryRow>> {
    let mut records: Vec<EvalRecord> = Vec::new();
    for path in result_files(dir)? {
        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str::<Vec<EvalRecord>>(&raw) {
            Ok(mut entries) => records.append(&mut entries),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable result file"),
        }
    }

    let mut summary = records_frame(&records)?
        .lazy()
        .group_by_stable([col("model")])
        .agg([
            col("time_sec").mean().alias("avg_time_sec"),
            col("prompt").count().cast(DataType::UInt64).alias("prompt_count"),
        ])
        .sort(
            ["avg_time_sec"],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    write_csv(&mut summary, &dir.join(SUMMARY_FILE))?;

    let models = summary.column("model")?.as_materialized_series().str()?;
    let averages = summary.column("avg_time_sec")?.as_materialized_series().f64()?;
    let counts = summary.column("prompt_count")?.as_materialized_series().u64()?;

    let rows = models
        .into_iter()
        .zip(averages)
        .zip(counts)
        .map(|((model, avg), count)| SummaryRow {
            model: model.unwrap_or_default().to_string(),
            avg_time_sec: avg.unwrap_or_default(),
            prompt_count: count.unwrap_or_default(),
        })
        .collect::<Vec<_>>();

    info!(dir = %dir.display(), models = rows.len(), "Evaluation summary written");
    Ok(rows)
}
