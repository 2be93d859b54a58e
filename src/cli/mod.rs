//! Command-line interface, parsed with clap.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AniList watch-list ETL
/// Loads a user's anime list into an analytical store
#[derive(Parser)]
#[command(name = "anime-data-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once and exit
    #[command(alias = "-r", alias = "--run")]
    Run,

    /// Run as background daemon with scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Check a saved raw payload and show what each table stage would produce
    Validate {
        /// Path to a raw AniList JSON response
        file: PathBuf,
    },

    /// Print messages published to topics
    Consume {
        /// Topics to read (defaults to the configured user and media topics)
        #[arg(short, long = "topic")]
        topics: Vec<String>,
    },

    /// Show recent pipeline runs
    #[command(alias = "h")]
    History {
        /// Number of runs to show
        #[arg(default_value = "10")]
        limit: u64,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
