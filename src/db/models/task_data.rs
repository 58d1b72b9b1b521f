// src/db/models/task_data.rs

//! TaskData model - durable JSON state of one recurring task

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};

/// Stored state of a task
///
/// `data_version` grows on every save; a save whose expected version no
/// longer matches fails with `ConcurrentDataUpdate`.
#[derive(Debug, Clone)]
pub struct TaskData {
    pub task_name: String,
    pub data: Map<String, Value>,
    pub data_version: i64,
    pub last_attempted_run: Option<DateTime<Utc>>,
    pub last_completed_run: Option<DateTime<Utc>>,
}

impl TaskData {
    /// Load the state of a task, creating an empty record on first use
    pub fn load_or_create(conn: &Connection, task_name: &str) -> Result<Self> {
        conn.execute(
            "INSERT OR IGNORE INTO task_data (task_name) VALUES (?1)",
            params![task_name],
        )?;
        Self::find(conn, task_name)?.ok_or_else(|| {
            Error::InitError(format!("task data for {} vanished after insert", task_name))
        })
    }

    pub fn find(conn: &Connection, task_name: &str) -> Result<Option<Self>> {
        let row = conn
            .query_row(
                "SELECT task_name, data, data_version, last_attempted_run, last_completed_run
                 FROM task_data WHERE task_name = ?1",
                params![task_name],
                Self::raw_from_row,
            )
            .optional()?;

        row.map(|(task_name, data, data_version, attempted, completed)| {
            let data = match serde_json::from_str::<Value>(&data)? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(Error::ParseError(format!(
                        "task data of {} is not a JSON object: {}",
                        task_name, other
                    )));
                }
            };
            Ok(Self {
                task_name,
                data,
                data_version,
                last_attempted_run: parse_timestamp(attempted)?,
                last_completed_run: parse_timestamp(completed)?,
            })
        })
        .transpose()
    }

    /// Store `data`, requiring the stored version to still be `self.data_version`
    pub fn versioned_update(&mut self, conn: &Connection, data: &Map<String, Value>) -> Result<()> {
        let blob = serde_json::to_string(data)?;
        let updated = conn.execute(
            "UPDATE task_data SET data = ?1, data_version = data_version + 1
             WHERE task_name = ?2 AND data_version = ?3",
            params![blob, &self.task_name, self.data_version],
        )?;

        if updated == 0 {
            return Err(Error::ConcurrentDataUpdate(self.task_name.clone()));
        }

        self.data = data.clone();
        self.data_version += 1;
        Ok(())
    }

    pub fn set_last_attempted_run(&mut self, conn: &Connection, at: DateTime<Utc>) -> Result<()> {
        conn.execute(
            "UPDATE task_data SET last_attempted_run = ?1 WHERE task_name = ?2",
            params![at.to_rfc3339(), &self.task_name],
        )?;
        self.last_attempted_run = Some(at);
        Ok(())
    }

    pub fn set_last_completed_run(&mut self, conn: &Connection, at: DateTime<Utc>) -> Result<()> {
        conn.execute(
            "UPDATE task_data SET last_completed_run = ?1 WHERE task_name = ?2",
            params![at.to_rfc3339(), &self.task_name],
        )?;
        self.last_completed_run = Some(at);
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn raw_from_row(
        row: &Row,
    ) -> rusqlite::Result<(String, String, i64, Option<String>, Option<String>)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::ParseError(format!("invalid timestamp '{}': {}", s, e)))
        })
        .transpose()
}
