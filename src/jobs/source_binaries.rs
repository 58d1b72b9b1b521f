// src/jobs/source_binaries.rs

//! Binary packages built from each package's main entry

use super::version_information::{repositories_by_id, repository_summary};
use crate::db::models::{BinaryPackage, PackageData, Repository, RepositoryEntry};
use crate::error::Result;
use crate::tasks::{
    self, ChangeTracker, Lifecycle, MainEntrySelector, Scheduler, Task, TaskContext, TrackedTask,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::info;

pub const NAME: &str = "update-source-to-binaries-information";

/// PackageData key the binary list is stored under
pub const BINARIES_KEY: &str = "binaries";

pub struct UpdateSourceToBinaries {
    tracker: ChangeTracker<MainEntrySelector>,
}

impl Default for UpdateSourceToBinaries {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSourceToBinaries {
    pub fn new() -> Self {
        Self {
            tracker: ChangeTracker::new(MainEntrySelector::new()),
        }
    }

    fn clear_main_entries(&mut self, _ctx: &mut TaskContext) -> Result<()> {
        self.tracker.source().clear();
        Ok(())
    }
}

fn binaries(
    conn: &Connection,
    entry: &RepositoryEntry,
    repositories: &BTreeMap<i64, Repository>,
) -> Result<Value> {
    let repository = repositories.get(&entry.repository_id).map(repository_summary);
    let list: Vec<Value> = BinaryPackage::list_for_source(conn, entry.source_package_id)?
        .into_iter()
        .map(|binary| json!({ "name": binary.name, "repository": repository }))
        .collect();
    Ok(Value::Array(list))
}

impl Task for UpdateSourceToBinaries {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::hours(4)
    }

    fn lifecycle(&self) -> Lifecycle<Self> {
        Lifecycle::new()
            .before(Self::clear_main_entries)
            .before(tasks::fake_update::<Self>)
            .finally(tasks::prune::<Self>)
            .finally(Self::clear_main_entries)
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let conn = ctx.conn();
        let repositories = repositories_by_id(conn)?;
        let tx = conn.unchecked_transaction()?;

        let mut handled = Vec::new();
        for entry in self.tracker.pending(ctx)? {
            let value = binaries(&tx, &entry, &repositories)?;
            PackageData::put(&tx, &entry.name, BINARIES_KEY, &value)?;
            handled.push(entry);
        }

        let main_entries = self.tracker.source().main_entries(&tx)?;
        let names: Vec<&str> = main_entries.keys().map(String::as_str).collect();
        let removed = PackageData::delete_missing(&tx, BINARIES_KEY, &names)?;
        tx.commit()?;
        self.tracker.mark_processed(ctx, &handled)?;

        info!(
            "Binary lists: {} packages updated, {} removed",
            handled.len(),
            removed
        );
        Ok(())
    }
}

impl TrackedTask for UpdateSourceToBinaries {
    type Source = MainEntrySelector;

    fn tracker(&self) -> &ChangeTracker<MainEntrySelector> {
        &self.tracker
    }
}
