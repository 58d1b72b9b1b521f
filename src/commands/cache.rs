// src/commands/cache.rs
//! Archive cache commands

use super::{format_bytes, open_db};
use anyhow::Result;
use debtrack::{ArchiveCache, Config};
use tracing::info;

/// Sync indexes and print the changed ones
pub fn cmd_cache_update(config: &Config, force: bool) -> Result<()> {
    let conn = open_db(config)?;
    let mut cache = ArchiveCache::from_config(config)?;
    let updated = cache.update_repositories(&conn, force)?;

    if updated.is_empty() {
        println!("All indexes are up to date");
        return Ok(());
    }
    for index in &updated.sources {
        println!(
            "Sources  {} ({}): {}",
            index.repository.shorthand,
            index.component,
            index.path.display()
        );
    }
    for index in &updated.packages {
        println!(
            "Packages {} ({}): {}",
            index.repository.shorthand,
            index.component,
            index.path.display()
        );
    }
    Ok(())
}

/// Retrieve one source package version
pub fn cmd_cache_retrieve(config: &Config, name: &str, version: &str, debian_only: bool) -> Result<()> {
    info!("Retrieving {} {}", name, version);
    let conn = open_db(config)?;
    let mut cache = ArchiveCache::from_config(config)?;
    cache.refresh_configuration(&conn)?;
    let path = cache.retrieve_source(name, version, debian_only)?;
    println!("{}", path.display());
    Ok(())
}

/// Clear the whole cache or only extracted sources
pub fn cmd_cache_clear(config: &Config, sources_only: bool) -> Result<()> {
    let mut cache = ArchiveCache::from_config(config)?;
    if sources_only {
        cache.clear_sources()?;
        println!("Removed extracted sources under {}", cache.layout().packages_dir().display());
    } else {
        cache.clear()?;
        println!("Cleared {}", cache.layout().root().display());
    }
    Ok(())
}

/// Print the extracted-sources size and the budget
pub fn cmd_cache_size(config: &Config) -> Result<()> {
    let mut cache = ArchiveCache::from_config(config)?;
    let size = cache.cache_size()?;
    println!(
        "{} used of {} ({})",
        format_bytes(size),
        format_bytes(cache.max_size()),
        cache.layout().packages_dir().display()
    );
    Ok(())
}
