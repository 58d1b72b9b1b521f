// src/tasks/state.rs
//! In-memory view of a task's persisted data
//!
//! The stored JSON object has a `processed` map from item key to a small
//! description. Other top-level fields are kept as-is so jobs can stash
//! their own values next to it.

use crate::db::models::TaskData;
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field-value summary of a processed item
pub type Description = Map<String, Value>;

const PROCESSED_KEY: &str = "processed";

/// Loaded task data plus a dirty flag
#[derive(Debug, Clone)]
pub struct TaskState {
    record: TaskData,
    processed: BTreeMap<String, Description>,
    extra: Map<String, Value>,
    dirty: bool,
}

impl TaskState {
    /// Load (or create) the state stored for `task_name`
    pub fn load(conn: &Connection, task_name: &str) -> Result<Self> {
        Self::from_record(TaskData::load_or_create(conn, task_name)?)
    }

    pub fn from_record(record: TaskData) -> Result<Self> {
        let mut extra = record.data.clone();
        let processed = match extra.remove(PROCESSED_KEY) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => {
                let mut processed = BTreeMap::new();
                for (key, value) in map {
                    let Value::Object(description) = value else {
                        return Err(Error::ParseError(format!(
                            "task {}: description of item {} is not an object",
                            record.task_name, key
                        )));
                    };
                    processed.insert(key, description);
                }
                processed
            }
            Some(other) => {
                return Err(Error::ParseError(format!(
                    "task {}: processed items are not an object: {}",
                    record.task_name, other
                )));
            }
        };

        Ok(Self {
            record,
            processed,
            extra,
            dirty: false,
        })
    }

    pub fn task_name(&self) -> &str {
        &self.record.task_name
    }

    pub fn record(&self) -> &TaskData {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut TaskData {
        &mut self.record
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed.contains_key(key)
    }

    pub fn processed(&self) -> &BTreeMap<String, Description> {
        &self.processed
    }

    pub fn insert_processed(&mut self, key: String, description: Description) {
        self.processed.insert(key, description);
        self.dirty = true;
    }

    pub fn remove_processed(&mut self, key: &str) -> Option<Description> {
        let removed = self.processed.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// A job-specific top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serialize back into the JSON object shape that is stored
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = self.extra.clone();
        let processed: Map<String, Value> = self
            .processed
            .iter()
            .map(|(key, description)| (key.clone(), Value::Object(description.clone())))
            .collect();
        data.insert(PROCESSED_KEY.to_string(), Value::Object(processed));
        data
    }

    /// Persist through an optimistic versioned update
    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        let data = self.to_data();
        self.record.versioned_update(conn, &data)?;
        self.dirty = false;
        Ok(())
    }
}
