// src/cli/repo.rs
//! Repository and architecture management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Add a repository
    Add {
        /// Display name, e.g. "Debian Unstable"
        name: String,

        /// Short name used in news and listings, e.g. "unstable"
        shorthand: String,

        /// Archive URI, e.g. http://deb.debian.org/debian
        uri: String,

        /// Suite, e.g. sid
        suite: String,

        /// Components to track
        #[arg(required = true)]
        components: Vec<String>,

        /// Codename of the suite
        #[arg(long)]
        codename: Option<String>,

        /// URI shown to users when it differs from the mirror URI
        #[arg(long)]
        public_uri: Option<String>,

        /// Entries of default repositories win main-entry selection
        #[arg(long)]
        default: bool,

        /// Tie-break order between repositories (higher wins)
        #[arg(short, long, default_value = "0")]
        position: i32,

        /// Only track source indexes
        #[arg(long)]
        no_binary: bool,

        /// Architectures to fetch binary indexes for
        #[arg(short, long = "arch", value_delimiter = ',')]
        architectures: Vec<String>,
    },

    /// List tracked repositories
    List,

    /// Remove a repository and its entries
    Remove {
        /// Repository name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ArchCommands {
    /// Attach an architecture to a repository
    Add {
        /// Repository name
        repository: String,

        /// Architecture name, e.g. amd64
        architecture: String,
    },
}
