// src/cli/mod.rs
//! CLI definitions for debtrack
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `init` - Create the database
//! - `repo` / `arch` - Manage tracked repositories and architectures
//! - `run` / `run-all` - Run recurring tasks
//! - `cache` - Drive the archive cache directly

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cache;
mod repo;

pub use cache::CacheCommands;
pub use repo::{ArchCommands, RepoCommands};

#[derive(Parser)]
#[command(name = "debtrack")]
#[command(version)]
#[command(about = "Incremental tracker for Debian package archives", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/debtrack/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the debtrack database
    Init,

    /// Repository management
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Architecture management
    #[command(subcommand)]
    Arch(ArchCommands),

    /// Run one task now, regardless of its schedule
    Run {
        /// Task name (see `debtrack run --help` for the list)
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(debtrack::jobs::TASK_NAMES))]
        task: String,

        /// Reprocess every item, not only new ones
        #[arg(long)]
        force_update: bool,

        /// Mark pending items processed without doing any work
        #[arg(long)]
        fake_update: bool,
    },

    /// Run every task that is due
    RunAll {
        /// Reprocess every item, not only new ones
        #[arg(long)]
        force_update: bool,
    },

    /// Archive cache operations
    #[command(subcommand)]
    Cache(CacheCommands),
}
