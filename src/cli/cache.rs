// src/cli/cache.rs
//! Archive cache commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Sync repository indexes and list the ones that changed
    Update {
        /// Wipe the cache first
        #[arg(long)]
        force: bool,
    },

    /// Download and extract one source package version
    Retrieve {
        /// Source package name
        name: String,

        /// Exact version
        version: String,

        /// Only fetch and unpack the debian/ directory when possible
        #[arg(long)]
        debian_only: bool,
    },

    /// Remove cached files
    Clear {
        /// Keep indexes and configuration, drop extracted sources only
        #[arg(long)]
        sources_only: bool,
    },

    /// Show the size of extracted sources against the budget
    Size,
}
