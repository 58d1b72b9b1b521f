// src/db/paths.rs
//! Centralized path derivation for debtrack directories

use std::path::{Path, PathBuf};

/// Default directory holding the database and the archive cache
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("debtrack")
}

/// Default database location
pub fn default_db_path() -> PathBuf {
    default_data_dir().join("debtrack.db")
}

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .unwrap_or(Path::new("/var/lib/debtrack"))
        .to_path_buf()
}

/// Get the archive cache root next to the database
pub fn cache_root(db_path: &str) -> PathBuf {
    db_dir(db_path).join("apt-cache")
}
