// src/db/models/package_data.rs

//! PackageData model - derived per-package JSON written by jobs

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

pub struct PackageData;

impl PackageData {
    /// Store `value` under (package, key), replacing any previous value
    pub fn put(conn: &Connection, package_name: &str, key: &str, value: &Value) -> Result<()> {
        conn.execute(
            "INSERT INTO package_data (package_name, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(package_name, key) DO UPDATE SET value = excluded.value",
            params![package_name, key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, package_name: &str, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM package_data WHERE package_name = ?1 AND key = ?2",
                params![package_name, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    /// Returns whether a row was removed
    pub fn delete(conn: &Connection, package_name: &str, key: &str) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM package_data WHERE package_name = ?1 AND key = ?2",
            params![package_name, key],
        )?;
        Ok(removed > 0)
    }

    /// Delete every `key` row whose package is not in `live_names`
    pub fn delete_missing(conn: &Connection, key: &str, live_names: &[&str]) -> Result<usize> {
        let names = serde_json::to_string(live_names)?;
        let removed = conn.execute(
            "DELETE FROM package_data
             WHERE key = ?1 AND package_name NOT IN (SELECT value FROM json_each(?2))",
            params![key, names],
        )?;
        Ok(removed)
    }
}
