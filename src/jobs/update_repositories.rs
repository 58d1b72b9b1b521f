// src/jobs/update_repositories.rs

//! Sync the mirror and load changed `Sources` and `Packages` indexes into
//! the store

use crate::archive::sources::{BinaryRecord, SourceRecord, package_versions, read_paragraphs};
use crate::archive::{ArchiveCache, ChangedIndex, Fetcher, HttpFetcher};
use crate::db::models::{
    BinaryPackage, BinaryRepositoryEntry, Repository, RepositoryEntry, SourcePackage,
};
use crate::error::{Error, Result};
use crate::tasks::{Scheduler, Task, TaskContext};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const NAME: &str = "update-repositories";

/// Refreshes repository entries from the archive indexes
pub struct UpdateRepositories<F: Fetcher = HttpFetcher> {
    cache: ArchiveCache<F>,
}

impl<F: Fetcher> UpdateRepositories<F> {
    pub fn new(cache: ArchiveCache<F>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ArchiveCache<F> {
        &self.cache
    }

    /// Replace the entries of one repository with what its indexes list
    ///
    /// Entries from changed files are upserted; entries still listed in the
    /// repository's unchanged cached files are kept; everything else the
    /// repository had is deleted.
    fn update_repository(
        &self,
        conn: &Connection,
        repository: &Repository,
        changed: &[ChangedIndex],
    ) -> Result<()> {
        let repository_id = repository
            .id
            .ok_or_else(|| Error::InitError(format!("repository {} has no id", repository)))?;

        let mut keep = Vec::new();
        for index in changed {
            for paragraph in read_paragraphs(&index.path)? {
                let record = match SourceRecord::from_paragraph(&paragraph) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Skipping stanza in {}: {}", index.path.display(), e);
                        continue;
                    }
                };
                keep.push(store_record(conn, repository_id, &index.component, &record)?);
            }
        }

        let cached = self.cache.sources_files_for_repository(conn, repository)?;
        let still_listed = listed_in_unchanged(&cached, changed)?;
        if !still_listed.is_empty() {
            for entry in RepositoryEntry::list_for_repository(conn, repository_id)? {
                if still_listed.contains(&(entry.name.clone(), entry.version.clone())) {
                    keep.push(entry.id);
                }
            }
        }

        let removed = RepositoryEntry::delete_for_repository_except(conn, repository_id, &keep)?;
        info!(
            "{}: {} entries updated, {} removed",
            repository.shorthand,
            keep.len(),
            removed
        );
        Ok(())
    }

    /// Replace the binary entries of one repository, like [`Self::update_repository`]
    fn update_binaries(
        &self,
        conn: &Connection,
        repository: &Repository,
        changed: &[ChangedIndex],
    ) -> Result<()> {
        let repository_id = repository
            .id
            .ok_or_else(|| Error::InitError(format!("repository {} has no id", repository)))?;

        let mut keep = Vec::new();
        for index in changed {
            for paragraph in read_paragraphs(&index.path)? {
                let record = match BinaryRecord::from_paragraph(&paragraph) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Skipping stanza in {}: {}", index.path.display(), e);
                        continue;
                    }
                };
                keep.push(store_binary(conn, repository_id, &record)?);
            }
        }

        let cached = self.cache.packages_files_for_repository(conn, repository)?;
        let still_listed = listed_in_unchanged(&cached, changed)?;
        if !still_listed.is_empty() {
            for entry in BinaryRepositoryEntry::list_for_repository(conn, repository_id)? {
                if still_listed.contains(&(entry.name.clone(), entry.version.clone())) {
                    keep.push(entry.id);
                }
            }
        }

        let removed = BinaryRepositoryEntry::delete_for_repository_except(conn, repository_id, &keep)?;
        info!(
            "{}: {} binary entries updated, {} removed",
            repository.shorthand,
            keep.len(),
            removed
        );
        Ok(())
    }
}

/// (name, version) pairs of the cached index files that did not change
fn listed_in_unchanged(
    cached: &[PathBuf],
    changed: &[ChangedIndex],
) -> Result<HashSet<(String, String)>> {
    let changed_paths: HashSet<&Path> = changed.iter().map(|c| c.path.as_path()).collect();
    let mut listed = HashSet::new();
    for path in cached {
        if !changed_paths.contains(path.as_path()) {
            listed.extend(package_versions(path)?);
        }
    }
    Ok(listed)
}

/// Changed index files grouped by owning repository
fn group_by_repository(indexes: Vec<ChangedIndex>) -> BTreeMap<i64, (Repository, Vec<ChangedIndex>)> {
    let mut grouped: BTreeMap<i64, (Repository, Vec<ChangedIndex>)> = BTreeMap::new();
    for index in indexes {
        let Some(id) = index.repository.id else {
            continue;
        };
        grouped
            .entry(id)
            .or_insert_with(|| (index.repository.clone(), Vec::new()))
            .1
            .push(index);
    }
    grouped
}

/// Upsert a binary, the source version it comes from and its entry
fn store_binary(conn: &Connection, repository_id: i64, record: &BinaryRecord) -> Result<i64> {
    let source_package_id = SourcePackage::find_or_create(conn, &record.source, &record.source_version)?;
    let mut binary = BinaryPackage::new(record.package.clone(), record.version.clone(), source_package_id);
    binary.short_description = record.short_description.clone();
    let binary_id = binary.upsert(conn)?;

    BinaryRepositoryEntry::upsert(
        conn,
        binary_id,
        repository_id,
        &record.architecture,
        record.priority.as_deref(),
        record.section.as_deref(),
    )
}

/// Upsert the package of a stanza and its entry in the repository
fn store_record(
    conn: &Connection,
    repository_id: i64,
    component: &str,
    record: &SourceRecord,
) -> Result<i64> {
    let mut package = SourcePackage::new(record.package.clone(), record.version.clone());
    package.maintainer = record.maintainer.clone();
    package.format = Some(record.format.clone());
    package.directory = Some(record.directory.clone());
    package.dsc_file_name = record.dsc_file_name().map(str::to_string);
    package.standards_version = record.standards_version.clone();
    let package_id = package.upsert(conn)?;

    RepositoryEntry::upsert(
        conn,
        package_id,
        repository_id,
        component,
        record.priority.as_deref(),
        record.section.as_deref(),
    )
}

impl<F: Fetcher> Task for UpdateRepositories<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::hours(4)
    }

    fn execute(&mut self, ctx: &mut TaskContext) -> Result<()> {
        let conn = ctx.conn();
        let updated = self
            .cache
            .update_repositories(conn, ctx.params().force_update)?;

        for (repository, changed) in group_by_repository(updated.sources).values() {
            let tx = conn.unchecked_transaction()?;
            self.update_repository(&tx, repository, changed)?;
            tx.commit()?;
        }

        for (repository, changed) in group_by_repository(updated.packages).values() {
            let tx = conn.unchecked_transaction()?;
            self.update_binaries(&tx, repository, changed)?;
            tx.commit()?;
        }

        let orphaned = BinaryPackage::delete_orphaned(conn)?;
        if orphaned > 0 {
            info!("Deleted {} binary packages no repository lists", orphaned);
        }
        // Binaries go with their source
        let orphaned = SourcePackage::delete_orphaned(conn)?;
        if orphaned > 0 {
            info!("Deleted {} source packages no repository lists", orphaned);
        }
        Ok(())
    }
}
