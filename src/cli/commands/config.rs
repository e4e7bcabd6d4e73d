use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the merged configuration as YAML
    Show,
    /// Print one value by dotted key, e.g. `model.max_tokens`
    Get { key: String },
}
