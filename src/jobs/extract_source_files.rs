// src/jobs/extract_source_files.rs

//! Copy interesting debian/ files out of every source package

use crate::archive::{ArchiveCache, Fetcher, HttpFetcher};
use crate::db::models::{ExtractedSourceFile, SourcePackage};
use crate::error::{Error, Result};
use crate::tasks::{
    self, ChangeTracker, Description, FieldAccessor, ItemSource, Lifecycle, Scheduler, Task,
    TaskContext, TrackedTask, describe_fields,
};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use tracing::{debug, info};

pub const NAME: &str = "extract-source-files";

/// Files kept from each package's debian/ directory
pub const EXTRACTED_FILES: [&str; 5] = ["changelog", "copyright", "rules", "control", "watch"];

/// Processed marks are flushed to the store this often
const SAVE_EVERY: usize = 50;

const FIELDS: &[FieldAccessor<SourcePackage>] = &[
    FieldAccessor::new("name", |p: &SourcePackage| Value::from(p.name.as_str())),
    FieldAccessor::new("version", |p: &SourcePackage| Value::from(p.version.as_str())),
];

/// Every source package version in the store
#[derive(Debug, Default)]
pub struct SourcePackages;

impl ItemSource for SourcePackages {
    type Item = SourcePackage;

    fn key_of(&self, item: &SourcePackage) -> String {
        item.id.map(|id| id.to_string()).unwrap_or_default()
    }

    fn describe(&self, item: &SourcePackage) -> Result<Description> {
        Ok(describe_fields(item, FIELDS))
    }

    fn enumerate_all(&self, conn: &Connection) -> Result<Vec<SourcePackage>> {
        SourcePackage::list_all(conn)
    }

    fn enumerate_all_keys(&self, conn: &Connection) -> Result<BTreeSet<String>> {
        Ok(SourcePackage::list_ids(conn)?
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }

    fn enumerate_unprocessed(
        &self,
        conn: &Connection,
        processed: &BTreeMap<String, Description>,
    ) -> Result<Vec<SourcePackage>> {
        let keys: Vec<&str> = processed.keys().map(String::as_str).collect();
        SourcePackage::list_excluding(conn, &keys)
    }
}

pub struct ExtractSourceFiles<F: Fetcher = HttpFetcher> {
    cache: ArchiveCache<F>,
    tracker: ChangeTracker<SourcePackages>,
}

impl<F: Fetcher> ExtractSourceFiles<F> {
    pub fn new(cache: ArchiveCache<F>) -> Self {
        Self {
            cache,
            tracker: ChangeTracker::new(SourcePackages),
        }
    }

    fn extract(&mut self, conn: &Connection, package: &SourcePackage) -> Result<usize> {
        let package_id = package
            .id
            .ok_or_else(|| Error::InitError(format!("source package {} has no id", package.name)))?;
        let outdir = self
            .cache
            .retrieve_source(&package.name, &package.version, true)?;
        let debian_dir = outdir.join("debian");

        let mut stored = 0;
        for name in EXTRACTED_FILES {
            let path = debian_dir.join(name);
            let content = match fs::read(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} {} has no debian/{}", package.name, package.version, name);
                    continue;
                }
                Err(e) => {
                    return Err(Error::IoError(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )));
                }
            };
            ExtractedSourceFile {
                source_package_id: package_id,
                name: name.to_string(),
                content,
            }
            .save(conn)?;
            stored += 1;
        }
        Ok(stored)
    }
}

impl<F: Fetcher> Task for ExtractSourceFiles<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::hours(1)
    }

    fn lifecycle(&self) -> Lifecycle<Self> {
        Lifecycle::new()
            .before(tasks::fake_update::<Self>)
            .finally(tasks::prune::<Self>)
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let conn = ctx.conn();
        let mut extracted = 0;

        for (done, package) in self.tracker.pending(ctx)?.enumerate() {
            match self.extract(conn, &package) {
                Ok(_) => {
                    self.tracker.mark_processed(ctx, [&package])?;
                    extracted += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => ctx.record_failure(self.tracker.key_of(&package), &e),
            }
            if (done + 1) % SAVE_EVERY == 0 {
                ctx.save_data()?;
            }
        }

        info!("Extracted debian/ files of {} source packages", extracted);
        Ok(())
    }
}

impl<F: Fetcher> TrackedTask for ExtractSourceFiles<F> {
    type Source = SourcePackages;

    fn tracker(&self) -> &ChangeTracker<SourcePackages> {
        &self.tracker
    }
}
