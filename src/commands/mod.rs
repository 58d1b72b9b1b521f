// src/commands/mod.rs
//! Command handlers for the debtrack CLI

mod cache;
mod repo;
mod task;

pub use cache::{cmd_cache_clear, cmd_cache_retrieve, cmd_cache_size, cmd_cache_update};
pub use repo::{cmd_arch_add, cmd_repo_add, cmd_repo_list, cmd_repo_remove, RepoOptions};
pub use task::{cmd_run, cmd_run_all};

use anyhow::Result;
use debtrack::Config;
use rusqlite::Connection;
use tracing::info;

/// Initialize the database at the configured location
pub fn cmd_init(config: &Config) -> Result<()> {
    let db_path = config.database_path();
    info!("Initializing debtrack database at: {}", db_path);
    debtrack::db::init(&db_path)?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}

/// Open the configured database
pub(crate) fn open_db(config: &Config) -> Result<Connection> {
    Ok(debtrack::db::open(&config.database_path())?)
}

/// Human-readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GiB");
    }
}
