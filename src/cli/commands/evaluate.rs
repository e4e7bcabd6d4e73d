use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct EvaluateCommand {
    /// Name the results are saved under
    pub model_name: String,

    /// Checkpoint to evaluate: a .gguf file or a directory holding one
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// JSON file with an array of prompts
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    #[arg(long)]
    pub max_new_tokens: Option<usize>,

    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeCommand {
    /// Directory with evaluation results (defaults to evaluation.save_dir)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}
