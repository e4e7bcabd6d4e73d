use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct PrepareCommand {
    /// Word document with the dialogs
    pub docx: PathBuf,

    /// Output JSON Lines file
    pub output: PathBuf,

    /// Generate answers with OpenAI (overrides data.use_openai)
    #[arg(long, conflicts_with = "local")]
    pub openai: bool,

    /// Generate answers with the local model (overrides data.use_openai)
    #[arg(long)]
    pub local: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportCommand {
    /// Prepared dataset (JSON Lines)
    pub input: PathBuf,

    /// Training records output (JSON Lines)
    pub output: PathBuf,

    /// tokenizer.json used to record token counts
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Token count cap (defaults to data.export_max_length)
    #[arg(long)]
    pub max_length: Option<usize>,
}
