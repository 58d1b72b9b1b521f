// src/db/models/news.rs

//! News model - repository change announcements

use crate::error::Result;
use rusqlite::{Connection, Row, params};

#[derive(Debug, Clone)]
pub struct News {
    pub id: Option<i64>,
    pub package_name: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: Option<String>,
}

impl News {
    pub fn new(package_name: String, title: String) -> Self {
        Self {
            id: None,
            package_name,
            title,
            content: None,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO news (package_name, title, content) VALUES (?1, ?2, ?3)",
            params![&self.package_name, &self.title, &self.content],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_package(conn: &Connection, package_name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_name, title, content, created_at FROM news
             WHERE package_name = ?1 ORDER BY id",
        )?;
        let news = stmt
            .query_map([package_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(news)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_name, title, content, created_at FROM news ORDER BY id",
        )?;
        let news = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(news)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_name: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
