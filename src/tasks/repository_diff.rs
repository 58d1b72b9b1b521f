// src/tasks/repository_diff.rs

//! What changed in the repositories since the last run
//!
//! The tracker's processed map remembers every repository entry seen so far,
//! with enough of a description (name, version, repository id) to answer
//! "was this version seen before" and "which names vanished from which
//! repository" after the entries themselves are gone.

use super::state::Description;
use super::tracker::ItemSource;
use crate::db::models::{Repository, RepositoryEntry};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

/// Names and versions recorded by previous runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPackages {
    pub names: BTreeSet<String>,
    pub names_by_repository: BTreeMap<i64, BTreeSet<String>>,
    pub versions: HashSet<(String, String)>,
    pub versions_by_repository: BTreeMap<i64, HashSet<(String, String)>>,
}

impl KnownPackages {
    /// Rebuild from stored descriptions
    pub fn from_processed(processed: &BTreeMap<String, Description>) -> Result<Self> {
        let mut known = Self::default();
        for (key, description) in processed {
            let name = string_field(key, description, "name")?;
            let version = string_field(key, description, "version")?;
            let repository_id = description
                .get("repository_id")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    Error::ParseError(format!("processed entry {} has no repository_id", key))
                })?;

            known.names.insert(name.clone());
            known
                .names_by_repository
                .entry(repository_id)
                .or_default()
                .insert(name.clone());
            known.versions.insert((name.clone(), version.clone()));
            known
                .versions_by_repository
                .entry(repository_id)
                .or_default()
                .insert((name, version));
        }
        Ok(known)
    }
}

fn string_field(key: &str, description: &Description, field: &str) -> Result<String> {
    description
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::ParseError(format!("processed entry {} has no {}", key, field)))
}

/// Item source over all repository entries, with cross-run diff queries
#[derive(Debug, Default)]
pub struct RepositoryDiffEngine {
    known: Option<KnownPackages>,
}

impl RepositoryDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the previous runs' knowledge; call before any query
    pub fn compute_known(&mut self, processed: &BTreeMap<String, Description>) -> Result<()> {
        self.known = Some(KnownPackages::from_processed(processed)?);
        Ok(())
    }

    pub fn known(&self) -> Result<&KnownPackages> {
        self.known.as_ref().ok_or_else(|| {
            Error::OrderingError("compute_known must run before querying the diff".to_string())
        })
    }

    /// Whether this name and version was never seen in any repository
    pub fn is_new_source_package(&self, name: &str, version: &str) -> Result<bool> {
        let known = self.known()?;
        Ok(!known
            .versions
            .contains(&(name.to_string(), version.to_string())))
    }

    /// Whether this name and version was never seen in that repository
    pub fn is_new_in_repository(&self, name: &str, version: &str, repository_id: i64) -> Result<bool> {
        let known = self.known()?;
        Ok(!known
            .versions_by_repository
            .get(&repository_id)
            .is_some_and(|versions| versions.contains(&(name.to_string(), version.to_string()))))
    }

    /// Previously tracked names a repository no longer lists
    ///
    /// Each (name, repository) pair appears once, ordered by repository id
    /// then name. Repositories without tracked entries are skipped, as are
    /// tracked repositories that were deleted since.
    pub fn removals_by_repository(&self, conn: &Connection) -> Result<Vec<(String, Repository)>> {
        let known = self.known()?;
        let mut removals = Vec::new();

        for (&repository_id, names) in &known.names_by_repository {
            let Some(repository) = Repository::find_by_id(conn, repository_id)? else {
                warn!(
                    "Repository {} vanished; skipping its removals",
                    repository_id
                );
                continue;
            };
            let live = repository.source_package_names(conn)?;
            for name in names {
                if !live.contains(name) {
                    removals.push((name.clone(), repository.clone()));
                }
            }
        }
        Ok(removals)
    }
}

impl ItemSource for RepositoryDiffEngine {
    type Item = RepositoryEntry;

    fn key_of(&self, item: &RepositoryEntry) -> String {
        item.id.to_string()
    }

    fn describe(&self, item: &RepositoryEntry) -> Result<Description> {
        let mut description = Description::new();
        description.insert("name".into(), Value::from(item.name.as_str()));
        description.insert("version".into(), Value::from(item.version.as_str()));
        description.insert(
            "repository".into(),
            Value::from(item.repository_shorthand.as_str()),
        );
        description.insert("repository_id".into(), Value::from(item.repository_id));
        Ok(description)
    }

    fn enumerate_all(&self, conn: &Connection) -> Result<Vec<RepositoryEntry>> {
        RepositoryEntry::list_all(conn)
    }

    fn enumerate_all_keys(&self, conn: &Connection) -> Result<BTreeSet<String>> {
        Ok(RepositoryEntry::list_ids(conn)?
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }

    fn enumerate_unprocessed(
        &self,
        conn: &Connection,
        processed: &BTreeMap<String, Description>,
    ) -> Result<Vec<RepositoryEntry>> {
        let keys: Vec<&str> = processed.keys().map(String::as_str).collect();
        RepositoryEntry::list_excluding(conn, &keys)
    }
}
