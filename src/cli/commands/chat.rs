use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ChatCommand {
    /// Message to send to the tutor
    pub message: String,

    /// Maximum tokens to generate (defaults to model.max_tokens)
    #[arg(long)]
    pub max_tokens: Option<usize>,
}
