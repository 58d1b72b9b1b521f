// src/jobs/general_information.rs

//! Per-package summary taken from each package's main entry

use crate::db::models::{PackageData, RepositoryEntry, SourcePackage};
use crate::error::Result;
use crate::tasks::{
    self, ChangeTracker, Lifecycle, MainEntrySelector, Scheduler, Task, TaskContext, TrackedTask,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use tracing::info;

pub const NAME: &str = "update-general-information";

/// PackageData key the summary is stored under
pub const GENERAL_KEY: &str = "general";

pub struct UpdateGeneralInformation {
    tracker: ChangeTracker<MainEntrySelector>,
}

impl Default for UpdateGeneralInformation {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateGeneralInformation {
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

/// Split `Name <email>` into its parts
fn contact(maintainer: &str) -> Value {
    match maintainer.split_once('<') {
        Some((name, rest)) => json!({
            "name": name.trim(),
            "email": rest.trim_end().trim_end_matches('>').trim(),
        }),
        None => json!({ "name": maintainer.trim(), "email": Value::Null }),
    }
}

fn general_information(conn: &Connection, entry: &RepositoryEntry) -> Result<Value> {
    let package = SourcePackage::find_by_id(conn, entry.source_package_id)?;
    let maintainer = package
        .as_ref()
        .and_then(|p| p.maintainer.as_deref())
        .map(contact)
        .unwrap_or(Value::Null);
    let standards_version = package.and_then(|p| p.standards_version);

    Ok(json!({
        "name": entry.name,
        "component": entry.component,
        "version": entry.version,
        "maintainer": maintainer,
        "standards_version": standards_version,
        "repository": entry.repository_shorthand,
    }))
}

impl Task for UpdateGeneralInformation {
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
        let tx = conn.unchecked_transaction()?;

        let mut handled = Vec::new();
        for entry in self.tracker.pending(ctx)? {
            let general = general_information(&tx, &entry)?;
            PackageData::put(&tx, &entry.name, GENERAL_KEY, &general)?;
            handled.push(entry);
        }

        let main_entries = self.tracker.source().main_entries(&tx)?;
        let names: Vec<&str> = main_entries.keys().map(String::as_str).collect();
        let removed = PackageData::delete_missing(&tx, GENERAL_KEY, &names)?;
        tx.commit()?;
        self.tracker.mark_processed(ctx, &handled)?;

        info!(
            "General information: {} packages updated, {} removed",
            handled.len(),
            removed
        );
        Ok(())
    }
}

impl TrackedTask for UpdateGeneralInformation {
    type Source = MainEntrySelector;

    fn tracker(&self) -> &ChangeTracker<MainEntrySelector> {
        &self.tracker
    }
}
