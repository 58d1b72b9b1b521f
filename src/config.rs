// src/config.rs
//! Configuration file parsing for debtrack
//!
//! Supports TOML configuration files with the following sections:
//! - [storage] - Database file and archive cache root
//! - [cache] - Extracted-sources budget and trusted keyring
//!
//! Every field has a default, so a missing file is equivalent to an empty
//! one. `DEBTRACK_DB`, `DEBTRACK_CACHE_DIR` and `DEBTRACK_CACHE_MAX_SIZE`
//! override the file.

use crate::db::paths;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default extracted-sources budget (1 GiB)
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Archive cache root (defaults to `apt-cache` next to the database)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: default_database(),
            cache_dir: None,
        }
    }
}

fn default_database() -> PathBuf {
    paths::default_db_path()
}

/// Cache configuration section
#[derive(Debug, Deserialize)]
pub struct CacheSection {
    /// Ceiling for extracted sources, e.g. "1GB", "500MB" or plain bytes
    #[serde(default = "default_max_size")]
    pub max_size: String,

    /// Keyring written into the generated apt.conf
    #[serde(default)]
    pub trusted_keyring: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            trusted_keyring: None,
        }
    }
}

fn default_max_size() -> String {
    "1GB".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration
    ///
    /// An explicit path must exist; otherwise the per-user default location
    /// is read when present. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("DEBTRACK_DB") {
            debug!("database overridden from environment: {}", db);
            self.storage.database = PathBuf::from(db);
        }
        if let Some(dir) = lookup("DEBTRACK_CACHE_DIR") {
            debug!("cache directory overridden from environment: {}", dir);
            self.storage.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = lookup("DEBTRACK_CACHE_MAX_SIZE") {
            self.cache.max_size = size;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        parse_size(&self.cache.max_size)?;
        if self.storage.database.as_os_str().is_empty() {
            return Err(Error::ConfigError("storage.database must not be empty".into()));
        }
        Ok(())
    }

    /// Database path as the string form the db layer takes
    pub fn database_path(&self) -> String {
        self.storage.database.to_string_lossy().into_owned()
    }

    /// Effective archive cache root
    pub fn cache_root(&self) -> PathBuf {
        self.storage
            .cache_dir
            .clone()
            .unwrap_or_else(|| paths::cache_root(&self.database_path()))
    }

    /// Extracted-sources budget in bytes
    pub fn max_cache_size(&self) -> Result<u64> {
        parse_size(&self.cache.max_size)
    }
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("debtrack").join("config.toml"))
}

/// Parse a human size such as "1GB", "512MB", "10KB" or "4096"
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("TB") {
        (n, 1024u64 * 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("GB") {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024u64 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("Invalid size: {}", s)))?;
    if num < 0.0 {
        return Err(Error::ConfigError(format!("Negative size: {}", s)));
    }

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.max_cache_size().unwrap(), DEFAULT_MAX_CACHE_SIZE);
        assert!(config.cache.trusted_keyring.is_none());
        assert!(config.cache_root().ends_with("apt-cache"));
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
            [storage]
            database = "/srv/debtrack/db.sqlite"
            cache_dir = "/srv/cache"

            [cache]
            max_size = "512MB"
            trusted_keyring = "/usr/share/keyrings/debian-archive-keyring.gpg"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path(), "/srv/debtrack/db.sqlite");
        assert_eq!(config.cache_root(), PathBuf::from("/srv/cache"));
        assert_eq!(config.max_cache_size().unwrap(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_cache_root_follows_database() {
        let config = Config::parse("[storage]\ndatabase = \"/data/t.db\"\n").unwrap();
        assert_eq!(config.cache_root(), PathBuf::from("/data/apt-cache"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEBTRACK_DB", "/tmp/x.db"),
            ("DEBTRACK_CACHE_MAX_SIZE", "2048"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database_path(), "/tmp/x.db");
        assert_eq!(config.max_cache_size().unwrap(), 2048);
    }

    #[test]
    fn test_invalid_size_rejected() {
        assert!(Config::parse("[cache]\nmax_size = \"lots\"\n").is_err());
        assert!(parse_size("-1GB").is_err());
        assert_eq!(parse_size("1.5KB").unwrap(), 1536);
    }
}
