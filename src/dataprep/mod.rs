//! Offline dataset preparation
//!
//! Word documents are split into dialog blocks, turned into instruction
//! samples, answered by a [`ChatEngine`], and written as JSON Lines. A second
//! step exports the samples as chat-formatted training records.

pub mod docx;
pub mod samples;

pub use self::docx::{extract_blocks_from_docx, split_blocks};
pub use samples::{
    block_to_sample, format_to_messages, is_valid_block, render_training_text, MessagesRecord,
    Sample, SampleMetadata, TaskType, TrainingRecord, DEFAULT_LEVEL,
};

use crate::error::{Error, Result};
use crate::runtime::{ChatEngine, ChatMessage, GenerationParams};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

/// Counts reported by [`prepare_dataset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSummary {
    pub total_blocks: usize,
    pub valid_blocks: usize,
}

/// Write items as JSON Lines; non-ASCII text is kept as is
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read JSON Lines, skipping blank lines
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .map_err(|e| Error::Serialization(format!("{} line {}: {}", path.display(), index + 1, e)))?;
        items.push(item);
    }
    Ok(items)
}

/// Full cycle from a `.docx` file to an answered `.jsonl` dataset
pub async fn prepare_dataset(
    docx_path: &Path,
    output_path: &Path,
    system_prompt: &str,
    level: &str,
    generator: &dyn ChatEngine,
    params: &GenerationParams,
) -> Result<PrepareSummary> {
    info!(path = %docx_path.display(), "Reading and filtering blocks");
    let blocks = extract_blocks_from_docx(docx_path)?;
    let valid: Vec<&String> = blocks.iter().filter(|b| is_valid_block(b)).collect();
    info!(total_blocks = blocks.len(), valid_blocks = valid.len(), "Blocks filtered");

    let mut samples: Vec<Sample> = valid
        .iter()
        .map(|b| block_to_sample(b, system_prompt, level))
        .collect();

    let total = samples.len();
    info!(generator = generator.name(), samples = total, "Generating answers");
    for (index, sample) in samples.iter_mut().enumerate() {
        let messages = [
            ChatMessage::system(sample.system.clone()),
            ChatMessage::user(sample.instruction.clone()),
        ];
        let generation = generator.generate(&messages, params).await?;
        sample.response = generation.text;
        info!(
            sample = index + 1,
            total,
            task_type = %sample.metadata.task_type,
            "Generated answer"
        );
    }

    info!(path = %output_path.display(), "Saving dataset");
    write_jsonl(output_path, &samples)?;

    Ok(PrepareSummary {
        total_blocks: blocks.len(),
        valid_blocks: total,
    })
}

/// Chat-format a sample; with a tokenizer the token count (capped at
/// `max_length`) is recorded as well
pub fn to_training_record(sample: &Sample, tokenizer: Option<&Tokenizer>, max_length: usize) -> Result<TrainingRecord> {
    let messages = format_to_messages(sample).messages;
    let text = render_training_text(&messages);

    let num_tokens = match tokenizer {
        Some(tokenizer) => {
            let encoding = tokenizer
                .encode(text.as_str(), false)
                .map_err(|e| Error::Tokenizer(e.to_string()))?;
            Some(encoding.get_ids().len().min(max_length))
        }
        None => None,
    };

    Ok(TrainingRecord {
        messages,
        text,
        num_tokens,
    })
}

/// Convert a prepared dataset into training records
pub fn export_training_file(
    input: &Path,
    output: &Path,
    tokenizer: Option<&Tokenizer>,
    max_length: usize,
) -> Result<usize> {
    let samples: Vec<Sample> = read_jsonl(input)?;
    let records = samples
        .iter()
        .map(|s| to_training_record(s, tokenizer, max_length))
        .collect::<Result<Vec<_>>>()?;

    write_jsonl(output, &records)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        records = records.len(),
        tokenized = tokenizer.is_some(),
        "Training file exported"
    );
    Ok(records.len())
}
