// src/db/models/extracted_file.rs

//! ExtractedSourceFile model - debian/ files copied out of source trees

use crate::error::Result;
use rusqlite::{Connection, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSourceFile {
    pub source_package_id: i64,
    pub name: String,
    pub content: Vec<u8>,
}

impl ExtractedSourceFile {
    /// Store a file, replacing a previous copy with the same name
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO extracted_source_files (source_package_id, name, content)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source_package_id, name) DO UPDATE SET content = excluded.content",
            params![self.source_package_id, &self.name, &self.content],
        )?;
        Ok(())
    }

    pub fn list_for_package(conn: &Connection, source_package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT source_package_id, name, content FROM extracted_source_files
             WHERE source_package_id = ?1 ORDER BY name",
        )?;
        let files = stmt
            .query_map([source_package_id], |row| {
                Ok(Self {
                    source_package_id: row.get(0)?,
                    name: row.get(1)?,
                    content: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }
}
