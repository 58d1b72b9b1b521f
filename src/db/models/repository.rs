// src/db/models/repository.rs

//! Repository model - a Debian archive suite the mirror tracks

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

const COLUMNS: &str = "id, name, shorthand, uri, public_uri, suite, codename, components, \
                       is_default, optional, binary, source, position";

/// Repository represents one suite of a remote Debian archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: Option<i64>,
    pub name: String,
    pub shorthand: String,
    pub uri: String,
    pub public_uri: Option<String>,
    pub suite: String,
    pub codename: Option<String>,
    pub components: Vec<String>,
    /// Entries of default repositories win main-entry selection
    pub is_default: bool,
    pub optional: bool,
    pub binary: bool,
    pub source: bool,
    /// Tie-break order between repositories, higher wins
    pub position: i32,
}

impl Repository {
    pub fn new(
        name: String,
        shorthand: String,
        uri: String,
        suite: String,
        components: Vec<String>,
    ) -> Self {
        Self {
            id: None,
            name,
            shorthand,
            uri,
            public_uri: None,
            suite,
            codename: None,
            components,
            is_default: false,
            optional: true,
            binary: true,
            source: true,
            position: 0,
        }
    }

    /// Insert this repository into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (name, shorthand, uri, public_uri, suite, codename, components,
                                       is_default, optional, binary, source, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &self.name,
                &self.shorthand,
                &self.uri,
                &self.public_uri,
                &self.suite,
                &self.codename,
                self.components.join(" "),
                self.is_default,
                self.optional,
                self.binary,
                self.source,
                self.position,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Update repository definition
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE repositories SET name = ?1, shorthand = ?2, uri = ?3, public_uri = ?4,
             suite = ?5, codename = ?6, components = ?7, is_default = ?8, optional = ?9,
             binary = ?10, source = ?11, position = ?12 WHERE id = ?13",
            params![
                &self.name,
                &self.shorthand,
                &self.uri,
                &self.public_uri,
                &self.suite,
                &self.codename,
                self.components.join(" "),
                self.is_default,
                self.optional,
                self.binary,
                self.source,
                self.position,
                id,
            ],
        )?;

        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM repositories WHERE id = ?1", COLUMNS);
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM repositories WHERE name = ?1", COLUMNS);
        Ok(conn.query_row(&sql, [name], Self::from_row).optional()?)
    }

    /// List all repositories in position order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let sql = format!("SELECT {} FROM repositories ORDER BY position, id", COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Delete a repository by ID (its entries go with it)
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Architectures the repository publishes binary indexes for
    pub fn architectures(&self, conn: &Connection) -> Result<Vec<String>> {
        let id = self.require_id()?;
        let mut stmt = conn.prepare(
            "SELECT a.name FROM architectures a
             JOIN repository_architectures ra ON ra.architecture_id = a.id
             WHERE ra.repository_id = ?1 ORDER BY a.name",
        )?;
        let names = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Attach an architecture, creating its record when needed
    pub fn add_architecture(&self, conn: &Connection, name: &str) -> Result<()> {
        let id = self.require_id()?;
        let arch_id = super::Architecture::find_or_create(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO repository_architectures (repository_id, architecture_id)
             VALUES (?1, ?2)",
            params![id, arch_id],
        )?;
        Ok(())
    }

    /// Names of the source packages currently listed in this repository
    pub fn source_package_names(&self, conn: &Connection) -> Result<HashSet<String>> {
        let id = self.require_id()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT sp.name FROM source_packages sp
             JOIN source_repository_entries e ON e.source_package_id = sp.id
             WHERE e.repository_id = ?1",
        )?;
        let names = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;
        Ok(names)
    }

    /// The sources.list lines describing this repository
    ///
    /// Always a `deb-src` line; a `deb [arch=...]` line follows for
    /// repositories that also publish binaries.
    pub fn sources_list_entry(&self, architectures: &[String]) -> String {
        let common = format!("{} {} {}", self.uri, self.suite, self.components.join(" "));
        let src_entry = format!("deb-src {}", common);
        if !self.binary {
            return src_entry;
        }
        format!("{}\ndeb [arch={}] {}", src_entry, architectures.join(","), common)
    }

    /// Full URLs of every component, `<uri>/<suite>/<component>`
    pub fn component_urls(&self) -> Vec<String> {
        let base = self.uri.trim_end_matches('/');
        self.components
            .iter()
            .map(|component| format!("{}/{}/{}", base, self.suite, component))
            .collect()
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("Repository {} has no ID", self.name)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let components: String = row.get(7)?;
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            shorthand: row.get(2)?,
            uri: row.get(3)?,
            public_uri: row.get(4)?,
            suite: row.get(5)?,
            codename: row.get(6)?,
            components: components.split_whitespace().map(str::to_string).collect(),
            is_default: row.get(8)?,
            optional: row.get(9)?,
            binary: row.get(10)?,
            source: row.get(11)?,
            position: row.get(12)?,
        })
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
