// src/jobs/version_information.rs

//! Which version of each source package every repository carries

use crate::db::models::{PackageData, Repository, RepositoryEntry, SourcePackage};
use crate::error::Result;
use crate::tasks::{
    self, ChangeTracker, Description, FieldAccessor, ItemSource, Lifecycle, Scheduler, Task,
    TaskContext, TrackedTask, describe_fields, select_main_entries,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

pub const NAME: &str = "update-version-information";

/// PackageData key the version list is stored under
pub const VERSIONS_KEY: &str = "versions";

const FIELDS: &[FieldAccessor<RepositoryEntry>] = &[
    FieldAccessor::new("name", |e: &RepositoryEntry| Value::from(e.name.as_str())),
    FieldAccessor::new("version", |e: &RepositoryEntry| Value::from(e.version.as_str())),
    FieldAccessor::new("repository", |e: &RepositoryEntry| {
        Value::from(e.repository_shorthand.as_str())
    }),
];

/// Every source repository entry in the store
#[derive(Debug, Default)]
pub struct RepositoryEntries;

impl ItemSource for RepositoryEntries {
    type Item = RepositoryEntry;

    fn key_of(&self, item: &RepositoryEntry) -> String {
        item.id.to_string()
    }

    fn describe(&self, item: &RepositoryEntry) -> Result<Description> {
        Ok(describe_fields(item, FIELDS))
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

/// Repository fields shown next to a version
pub(crate) fn repository_summary(repository: &Repository) -> Value {
    json!({
        "name": repository.name,
        "shorthand": repository.shorthand,
        "codename": repository.codename,
        "suite": repository.suite,
        "id": repository.id,
    })
}

/// Repositories by id
pub(crate) fn repositories_by_id(conn: &Connection) -> Result<BTreeMap<i64, Repository>> {
    Ok(Repository::list_all(conn)?
        .into_iter()
        .filter_map(|repository| repository.id.map(|id| (id, repository)))
        .collect())
}

/// Pool directory of the main entry, under the repository's public URI
fn pool_url(
    conn: &Connection,
    main: &RepositoryEntry,
    repositories: &BTreeMap<i64, Repository>,
) -> Result<Option<String>> {
    let Some(repository) = repositories.get(&main.repository_id) else {
        return Ok(None);
    };
    let directory = SourcePackage::find_by_id(conn, main.source_package_id)?
        .and_then(|package| package.directory)
        .filter(|directory| !directory.is_empty());
    let base = repository.public_uri.as_deref().unwrap_or(&repository.uri);
    Ok(directory.map(|directory| {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            directory.trim_start_matches('/')
        )
    }))
}

/// The `versions` value of a package, `None` once no repository lists it
fn versions(
    conn: &Connection,
    name: &str,
    repositories: &BTreeMap<i64, Repository>,
) -> Result<Option<Value>> {
    let entries = RepositoryEntry::list_for_name(conn, name)?;
    if entries.is_empty() {
        return Ok(None);
    }

    let version_list: Vec<Value> = entries
        .iter()
        .filter_map(|entry| {
            let repository = repositories.get(&entry.repository_id)?;
            Some(json!({
                "repository": repository_summary(repository),
                "version": entry.version,
            }))
        })
        .collect();

    let default_pool_url = match select_main_entries(entries).remove(name) {
        Some(main) => pool_url(conn, &main, repositories)?,
        None => None,
    };

    Ok(Some(json!({
        "version_list": version_list,
        "default_pool_url": default_pool_url,
    })))
}

fn refresh(conn: &Connection, name: &str, repositories: &BTreeMap<i64, Repository>) -> Result<()> {
    match versions(conn, name, repositories)? {
        Some(value) => PackageData::put(conn, name, VERSIONS_KEY, &value),
        None => {
            PackageData::delete(conn, name, VERSIONS_KEY)?;
            Ok(())
        }
    }
}

pub struct UpdateVersionInformation {
    tracker: ChangeTracker<RepositoryEntries>,
}

impl Default for UpdateVersionInformation {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateVersionInformation {
    pub fn new() -> Self {
        Self {
            tracker: ChangeTracker::new(RepositoryEntries),
        }
    }
}

impl Task for UpdateVersionInformation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::hours(4)
    }

    /// Obsolete keys name the packages that lost an entry, so they are only
    /// pruned once a run has refreshed those packages.
    fn lifecycle(&self) -> Lifecycle<Self> {
        Lifecycle::new()
            .before(tasks::fake_update::<Self>)
            .after(tasks::prune::<Self>)
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let conn = ctx.conn();
        let repositories = repositories_by_id(conn)?;
        let tx = conn.unchecked_transaction()?;

        let mut refreshed = BTreeSet::new();
        let mut handled = Vec::new();
        for entry in self.tracker.pending(ctx)? {
            if refreshed.insert(entry.name.clone()) {
                refresh(&tx, &entry.name, &repositories)?;
            }
            handled.push(entry);
        }

        for key in self.tracker.obsolete(ctx)? {
            let name = ctx
                .state()
                .processed()
                .get(&key)
                .and_then(|description| description.get("name"))
                .and_then(Value::as_str);
            let Some(name) = name else {
                continue;
            };
            if refreshed.insert(name.to_string()) {
                refresh(&tx, name, &repositories)?;
            }
        }

        tx.commit()?;
        self.tracker.mark_processed(ctx, &handled)?;
        info!("Version information refreshed for {} packages", refreshed.len());
        Ok(())
    }
}

impl TrackedTask for UpdateVersionInformation {
    type Source = RepositoryEntries;

    fn tracker(&self) -> &ChangeTracker<RepositoryEntries> {
        &self.tracker
    }
}
