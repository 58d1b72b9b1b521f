// src/db/models/binary_package.rs

//! BinaryPackage and BinaryRepositoryEntry models - what `Packages` indexes list

use crate::error::Result;
use rusqlite::{Connection, Row, params};

/// One version of a binary package, tied to the source version it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPackage {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub source_package_id: i64,
    pub short_description: Option<String>,
}

impl BinaryPackage {
    pub fn new(name: String, version: String, source_package_id: i64) -> Self {
        Self {
            id: None,
            name,
            version,
            source_package_id,
            short_description: None,
        }
    }

    /// Insert or refresh this package, keyed on (name, version, source)
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO binary_packages (name, version, source_package_id, short_description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name, version, source_package_id) DO UPDATE SET
                short_description = excluded.short_description",
            params![
                &self.name,
                &self.version,
                self.source_package_id,
                &self.short_description
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM binary_packages
             WHERE name = ?1 AND version = ?2 AND source_package_id = ?3",
            params![&self.name, &self.version, self.source_package_id],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    /// Binaries built from one source package version, by name
    pub fn list_for_source(conn: &Connection, source_package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, source_package_id, short_description
             FROM binary_packages WHERE source_package_id = ?1 ORDER BY name, version",
        )?;
        let pkgs = stmt
            .query_map([source_package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pkgs)
    }

    /// Delete binaries no repository lists any more
    pub fn delete_orphaned(conn: &Connection) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM binary_packages WHERE id NOT IN
                (SELECT DISTINCT binary_package_id FROM binary_repository_entries)",
            [],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            source_package_id: row.get(3)?,
            short_description: row.get(4)?,
        })
    }
}

/// A binary package version present in a repository for one architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRepositoryEntry {
    pub id: i64,
    pub binary_package_id: i64,
    pub repository_id: i64,
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub priority: Option<String>,
    pub section: Option<String>,
}

impl BinaryRepositoryEntry {
    pub fn upsert(
        conn: &Connection,
        binary_package_id: i64,
        repository_id: i64,
        architecture: &str,
        priority: Option<&str>,
        section: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO binary_repository_entries
                (binary_package_id, repository_id, architecture, priority, section)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(binary_package_id, repository_id, architecture) DO UPDATE SET
                priority = excluded.priority,
                section = excluded.section",
            params![binary_package_id, repository_id, architecture, priority, section],
        )?;

        let id = conn.query_row(
            "SELECT id FROM binary_repository_entries
             WHERE binary_package_id = ?1 AND repository_id = ?2 AND architecture = ?3",
            params![binary_package_id, repository_id, architecture],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_for_repository(conn: &Connection, repository_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT e.id, e.binary_package_id, e.repository_id, b.name, b.version,
                    e.architecture, e.priority, e.section
             FROM binary_repository_entries e
             JOIN binary_packages b ON b.id = e.binary_package_id
             WHERE e.repository_id = ?1
             ORDER BY e.id",
        )?;
        let entries = stmt
            .query_map([repository_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Delete the entries of a repository except those in `keep`
    pub fn delete_for_repository_except(
        conn: &Connection,
        repository_id: i64,
        keep: &[i64],
    ) -> Result<usize> {
        let keep = serde_json::to_string(keep)?;
        let removed = conn.execute(
            "DELETE FROM binary_repository_entries
             WHERE repository_id = ?1 AND id NOT IN (SELECT value FROM json_each(?2))",
            params![repository_id, keep],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            binary_package_id: row.get(1)?,
            repository_id: row.get(2)?,
            name: row.get(3)?,
            version: row.get(4)?,
            architecture: row.get(5)?,
            priority: row.get(6)?,
            section: row.get(7)?,
        })
    }
}
