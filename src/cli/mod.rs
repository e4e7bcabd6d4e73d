//! Command line interface

pub mod commands;
pub mod handlers;

use clap::Parser;
use commands::Commands;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "German language tutor chat service", long_about = None)]
pub struct Cli {
    /// Directory holding model_config.yaml and app_config.yaml
    #[arg(long, global = true, env = "LEHRBOT_CONFIG_DIR", default_value = crate::config::DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::ConfigAction;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["lehrbot", "--config-dir", "conf", "serve", "--port", "9000", "-w", "4"]);
        assert_eq!(cli.config_dir, PathBuf::from("conf"));
        match cli.command {
            Commands::Serve(cmd) => {
                assert_eq!(cmd.port, Some(9000));
                assert_eq!(cmd.workers, Some(4));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_get() {
        let cli = Cli::parse_from(["lehrbot", "config", "get", "model.max_tokens"]);
        match cli.command {
            Commands::Config(cmd) => match cmd.action {
                ConfigAction::Get { key } => assert_eq!(key, "model.max_tokens"),
                ConfigAction::Show => panic!("expected get"),
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_prepare_flags_conflict() {
        let result = Cli::try_parse_from(["lehrbot", "prepare", "a.docx", "out.jsonl", "--openai", "--local"]);
        assert!(result.is_err());
    }
}
