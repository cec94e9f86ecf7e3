//! Stream Indexer Daemon
//!
//! Applies change-stream batches to a full-text index on shared storage and
//! serves ranked queries over it.
//!
//! # Usage
//!
//! ```bash
//! stream-daemon index [--input BATCH.json] [--mount-path PATH]
//! stream-daemon search --query QUERY [--limit N] [--mount-path PATH]
//! stream-daemon stats [--mount-path PATH]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/stream-indexer/config.toml)
//! 3. Environment variables (INDEXER_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use stream_daemon::{
    handle_index, handle_search, init_logging, load_settings, show_stats, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.command.mount_path(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Index { input, .. } => {
            handle_index(settings, input).await?;
        }
        Commands::Search { query, limit, .. } => {
            handle_search(settings, query, limit).await?;
        }
        Commands::Stats { .. } => {
            show_stats(&settings)?;
        }
    }

    Ok(())
}
