// src/db/models/source_package.rs

//! SourcePackage and RepositoryEntry models - what the mirrored archive lists

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const SP_COLUMNS: &str =
    "id, name, version, maintainer, format, directory, dsc_file_name, standards_version";

/// One version of a source package, unique on (name, version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub maintainer: Option<String>,
    pub format: Option<String>,
    pub directory: Option<String>,
    pub dsc_file_name: Option<String>,
    pub standards_version: Option<String>,
}

impl SourcePackage {
    pub fn new(name: String, version: String) -> Self {
        Self {
            id: None,
            name,
            version,
            maintainer: None,
            format: None,
            directory: None,
            dsc_file_name: None,
            standards_version: None,
        }
    }

    /// Insert or refresh this package, keyed on (name, version)
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO source_packages (name, version, maintainer, format, directory,
                                          dsc_file_name, standards_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name, version) DO UPDATE SET
                maintainer = excluded.maintainer,
                format = excluded.format,
                directory = excluded.directory,
                dsc_file_name = excluded.dsc_file_name,
                standards_version = excluded.standards_version",
            params![
                &self.name,
                &self.version,
                &self.maintainer,
                &self.format,
                &self.directory,
                &self.dsc_file_name,
                &self.standards_version,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM source_packages WHERE name = ?1 AND version = ?2",
            params![&self.name, &self.version],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    /// ID of (name, version), inserting a bare row when absent
    ///
    /// Unlike [`Self::upsert`] an existing row is left untouched.
    pub fn find_or_create(conn: &Connection, name: &str, version: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO source_packages (name, version) VALUES (?1, ?2)
             ON CONFLICT(name, version) DO NOTHING",
            params![name, version],
        )?;
        let id = conn.query_row(
            "SELECT id FROM source_packages WHERE name = ?1 AND version = ?2",
            params![name, version],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM source_packages WHERE id = ?1", SP_COLUMNS);
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn find(conn: &Connection, name: &str, version: &str) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {} FROM source_packages WHERE name = ?1 AND version = ?2",
            SP_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![name, version], Self::from_row)
            .optional()?)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let sql = format!("SELECT {} FROM source_packages ORDER BY id", SP_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let pkgs = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pkgs)
    }

    /// Packages whose ID (as a string key) is not in `excluded`
    ///
    /// `excluded` is bound as one JSON array so the filter runs in SQLite.
    pub fn list_excluding(conn: &Connection, excluded: &[&str]) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM source_packages
             WHERE CAST(id AS TEXT) NOT IN (SELECT value FROM json_each(?1))
             ORDER BY id",
            SP_COLUMNS
        );
        let excluded = serde_json::to_string(excluded)?;
        let mut stmt = conn.prepare(&sql)?;
        let pkgs = stmt
            .query_map([excluded], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pkgs)
    }

    pub fn list_ids(conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT id FROM source_packages")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Delete packages no repository lists any more
    pub fn delete_orphaned(conn: &Connection) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM source_packages WHERE id NOT IN
                (SELECT DISTINCT source_package_id FROM source_repository_entries)",
            [],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            maintainer: row.get(3)?,
            format: row.get(4)?,
            directory: row.get(5)?,
            dsc_file_name: row.get(6)?,
            standards_version: row.get(7)?,
        })
    }
}

const ENTRY_SELECT: &str = "SELECT e.id, e.source_package_id, e.repository_id, sp.name, sp.version,
        e.component, e.priority, e.section, r.shorthand, r.position, r.is_default
     FROM source_repository_entries e
     JOIN source_packages sp ON sp.id = e.source_package_id
     JOIN repositories r ON r.id = e.repository_id";

/// A source package version present in a repository
///
/// Carries the owning repository's shorthand, position and default flag so
/// selection never needs a second lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    pub id: i64,
    pub source_package_id: i64,
    pub repository_id: i64,
    pub name: String,
    pub version: String,
    pub component: String,
    pub priority: Option<String>,
    pub section: Option<String>,
    pub repository_shorthand: String,
    pub repository_position: i32,
    pub repository_is_default: bool,
}

impl RepositoryEntry {
    /// Insert or refresh the entry of a package in a repository
    pub fn upsert(
        conn: &Connection,
        source_package_id: i64,
        repository_id: i64,
        component: &str,
        priority: Option<&str>,
        section: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO source_repository_entries
                (source_package_id, repository_id, component, priority, section)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_package_id, repository_id) DO UPDATE SET
                component = excluded.component,
                priority = excluded.priority,
                section = excluded.section",
            params![source_package_id, repository_id, component, priority, section],
        )?;

        let id = conn.query_row(
            "SELECT id FROM source_repository_entries
             WHERE source_package_id = ?1 AND repository_id = ?2",
            params![source_package_id, repository_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let sql = format!("{} WHERE e.id = ?1", ENTRY_SELECT);
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let sql = format!("{} ORDER BY e.id", ENTRY_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries whose ID (as a string key) is not in `excluded`
    pub fn list_excluding(conn: &Connection, excluded: &[&str]) -> Result<Vec<Self>> {
        let sql = format!(
            "{} WHERE CAST(e.id AS TEXT) NOT IN (SELECT value FROM json_each(?1)) ORDER BY e.id",
            ENTRY_SELECT
        );
        let excluded = serde_json::to_string(excluded)?;
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([excluded], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn list_for_repository(conn: &Connection, repository_id: i64) -> Result<Vec<Self>> {
        let sql = format!("{} WHERE e.repository_id = ?1 ORDER BY e.id", ENTRY_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([repository_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Every entry of one package name, by repository position then id
    pub fn list_for_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let sql = format!("{} WHERE sp.name = ?1 ORDER BY r.position, e.id", ENTRY_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn list_ids(conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT id FROM source_repository_entries")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Delete the entries of a repository except those in `keep`
    pub fn delete_for_repository_except(
        conn: &Connection,
        repository_id: i64,
        keep: &[i64],
    ) -> Result<usize> {
        let keep = serde_json::to_string(keep)?;
        let removed = conn.execute(
            "DELETE FROM source_repository_entries
             WHERE repository_id = ?1 AND id NOT IN (SELECT value FROM json_each(?2))",
            params![repository_id, keep],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_package_id: row.get(1)?,
            repository_id: row.get(2)?,
            name: row.get(3)?,
            version: row.get(4)?,
            component: row.get(5)?,
            priority: row.get(6)?,
            section: row.get(7)?,
            repository_shorthand: row.get(8)?,
            repository_position: row.get(9)?,
            repository_is_default: row.get(10)?,
        })
    }
}
