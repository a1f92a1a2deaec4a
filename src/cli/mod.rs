//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sleuth",
    version,
    author = "neur0map",
    about = "Slack inquiry assistant backed by past discussions and documentation",
    long_about = "Sleuth answers team questions inside Slack. React to a message with the trigger \
                  emoji and Sleuth searches past Slack discussions and Confluence pages, asks a \
                  language model for an answer, and replies in thread."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/sleuth/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the webhook server until interrupted
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List recent inquiries
    Status {
        /// Number of inquiries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show one inquiry with every search result considered for it
    Show {
        /// Slack timestamp of the triggering message
        message_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["sleuth", "show", "1700000000.000100", "--json"]).unwrap();
        match cli.command {
            Commands::Show { message_id, json } => {
                assert_eq!(message_id, "1700000000.000100");
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_status_default_limit() {
        let cli = Cli::try_parse_from(["sleuth", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { limit: 10 }));
    }
}
