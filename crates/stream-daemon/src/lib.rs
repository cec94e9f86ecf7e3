//! Stream indexer daemon library exports.
//!
//! This crate provides the CLI binary that applies change-stream batches to
//! the shared index and answers queries against it.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (index, search, stats)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    handle_index, handle_search, index_batch, index_stats, init_logging, load_settings,
    search_index, show_stats, IndexStats,
};
