//! CLI argument parsing for the stream indexer.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stream indexer
///
/// Applies change-stream batches to a shared full-text index and queries it.
#[derive(Parser, Debug)]
#[command(name = "stream-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/stream-indexer/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a change-event batch ({"Records": [...]}) to the index
    Index {
        /// Batch file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Override the storage mount path
        #[arg(long)]
        mount_path: Option<String>,
    },

    /// Run a ranked full-text query
    Search {
        /// Query string
        #[arg(short, long)]
        query: String,

        /// Maximum results (default from config)
        #[arg(short = 'n', long)]
        limit: Option<i64>,

        /// Override the storage mount path
        #[arg(long)]
        mount_path: Option<String>,
    },

    /// Show document count and the last commit
    Stats {
        /// Override the storage mount path
        #[arg(long)]
        mount_path: Option<String>,
    },
}

impl Commands {
    pub fn mount_path(&self) -> Option<&str> {
        match self {
            Commands::Index { mount_path, .. }
            | Commands::Search { mount_path, .. }
            | Commands::Stats { mount_path } => mount_path.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_index() {
        let cli = Cli::parse_from([
            "stream-daemon",
            "index",
            "--input",
            "batch.json",
            "--mount-path",
            "/mnt/efs",
        ]);
        match &cli.command {
            Commands::Index { input, .. } => {
                assert_eq!(input.as_deref(), Some(std::path::Path::new("batch.json")));
            }
            _ => panic!("Expected Index command"),
        }
        assert_eq!(cli.command.mount_path(), Some("/mnt/efs"));
    }

    #[test]
    fn test_parse_search_with_globals() {
        let cli = Cli::parse_from([
            "stream-daemon",
            "search",
            "-q",
            "red fox",
            "-n",
            "5",
            "--log-level",
            "debug",
            "--config",
            "/etc/indexer.toml",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config.as_deref(), Some("/etc/indexer.toml"));
        match cli.command {
            Commands::Search { query, limit, .. } => {
                assert_eq!(query, "red fox");
                assert_eq!(limit, Some(5));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::parse_from(["stream-daemon", "stats"]);
        assert!(matches!(cli.command, Commands::Stats { mount_path: None }));
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Cli::try_parse_from(["stream-daemon", "search"]).is_err());
    }
}
