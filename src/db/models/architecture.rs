// src/db/models/architecture.rs

//! Architecture model

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    pub id: i64,
    pub name: String,
}

impl Architecture {
    /// Return the ID of the named architecture, inserting it when missing
    pub fn find_or_create(conn: &Connection, name: &str) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO architectures (name) VALUES (?1)",
            params![name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM architectures WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        Ok(conn
            .query_row(
                "SELECT id, name FROM architectures WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Self {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, name FROM architectures ORDER BY name")?;
        let archs = stmt
            .query_map([], |row| {
                Ok(Self {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(archs)
    }
}
