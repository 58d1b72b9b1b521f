// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! This module defines the SQLite schema for all tracker tables and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// - repositories / architectures: what the mirror is configured to fetch
/// - source_packages / source_repository_entries: what the archive contains
/// - task_data: JSON state per recurring task (the processed set lives here)
/// - package_data / extracted_source_files / news: job outputs
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE architectures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            shorthand TEXT NOT NULL UNIQUE,
            uri TEXT NOT NULL,
            public_uri TEXT,
            suite TEXT NOT NULL,
            codename TEXT,
            components TEXT NOT NULL DEFAULT '',
            is_default INTEGER NOT NULL DEFAULT 0,
            optional INTEGER NOT NULL DEFAULT 1,
            binary INTEGER NOT NULL DEFAULT 1,
            source INTEGER NOT NULL DEFAULT 1,
            position INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE repository_architectures (
            repository_id INTEGER NOT NULL,
            architecture_id INTEGER NOT NULL,
            PRIMARY KEY (repository_id, architecture_id),
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE,
            FOREIGN KEY (architecture_id) REFERENCES architectures(id) ON DELETE CASCADE
        );

        CREATE TABLE source_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            maintainer TEXT,
            format TEXT,
            directory TEXT,
            dsc_file_name TEXT,
            standards_version TEXT,
            UNIQUE(name, version)
        );

        CREATE INDEX idx_source_packages_name ON source_packages(name);

        CREATE TABLE source_repository_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_package_id INTEGER NOT NULL,
            repository_id INTEGER NOT NULL,
            component TEXT NOT NULL DEFAULT '',
            priority TEXT,
            section TEXT,
            UNIQUE(source_package_id, repository_id),
            FOREIGN KEY (source_package_id) REFERENCES source_packages(id) ON DELETE CASCADE,
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_entries_repository ON source_repository_entries(repository_id);

        CREATE TABLE task_data (
            task_name TEXT PRIMARY KEY,
            data TEXT NOT NULL DEFAULT '{}',
            data_version INTEGER NOT NULL DEFAULT 0,
            last_attempted_run TEXT,
            last_completed_run TEXT
        );

        CREATE TABLE package_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_name TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE(package_name, key)
        );

        CREATE TABLE extracted_source_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_package_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            content BLOB NOT NULL,
            UNIQUE(source_package_id, name),
            FOREIGN KEY (source_package_id) REFERENCES source_packages(id) ON DELETE CASCADE
        );

        CREATE TABLE news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_name TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_news_package ON news(package_name);
        ",
    )?;

    Ok(())
}

/// Version 2: binary packages from `Packages` indexes
///
/// A binary package version belongs to the source package version it was
/// built from and goes away with it.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE binary_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            source_package_id INTEGER NOT NULL,
            short_description TEXT,
            UNIQUE(name, version, source_package_id),
            FOREIGN KEY (source_package_id) REFERENCES source_packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_binary_packages_source ON binary_packages(source_package_id);

        CREATE TABLE binary_repository_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            binary_package_id INTEGER NOT NULL,
            repository_id INTEGER NOT NULL,
            architecture TEXT NOT NULL,
            priority TEXT,
            section TEXT,
            UNIQUE(binary_package_id, repository_id, architecture),
            FOREIGN KEY (binary_package_id) REFERENCES binary_packages(id) ON DELETE CASCADE,
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_binary_entries_repository ON binary_repository_entries(repository_id);
        ",
    )?;

    Ok(())
}
