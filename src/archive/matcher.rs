// src/archive/matcher.rs
//! Map cached index files back to the repository they were fetched for

use super::mirror::{IndexTarget, MirrorLayout, parse_apt_conf_architectures, parse_sources_list};
use crate::db::models::Repository;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;

/// Resolves `lists/` file names to index targets and repositories
///
/// Attribution goes through the generated repository list, never through
/// guesses on the file name: the target whose list-file name equals the
/// file's base name gives a component URL, and the repository owning that
/// component URL is the match.
#[derive(Debug, Clone)]
pub struct RepositoryIndexMatcher {
    targets: Vec<IndexTarget>,
    repositories: Vec<Repository>,
}

impl RepositoryIndexMatcher {
    pub fn new(targets: Vec<IndexTarget>, repositories: Vec<Repository>) -> Self {
        Self {
            targets,
            repositories,
        }
    }

    /// Build from the generated configuration under `layout` and the live
    /// repository records
    pub fn load(layout: &MirrorLayout, conn: &Connection) -> Result<Self> {
        let targets = read_index_targets(layout)?;
        let repositories = Repository::list_all(conn)?;
        Ok(Self::new(targets, repositories))
    }

    pub fn targets(&self) -> &[IndexTarget] {
        &self.targets
    }

    /// The index target a cached file was fetched for
    pub fn target_for(&self, file: &Path) -> Option<&IndexTarget> {
        let base = file.file_name()?;
        self.targets
            .iter()
            .find(|target| base == target.list_file_name().as_str())
    }

    /// The repository owning a cached file, if any
    pub fn match_file(&self, file: &Path) -> Option<&Repository> {
        let component_url = self.target_for(file)?.component_url();
        self.repositories
            .iter()
            .find(|repo| repo.component_urls().contains(&component_url))
    }
}

/// Expand the generated sources.list into its index targets
///
/// Duplicate targets (two repositories sharing a suite) appear once.
pub fn read_index_targets(layout: &MirrorLayout) -> Result<Vec<IndexTarget>> {
    let sources_list = match std::fs::read_to_string(layout.sources_list_path()) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::IoError(format!(
                "Failed to read {}: {}",
                layout.sources_list_path().display(),
                e
            )));
        }
    };
    let architectures = std::fs::read_to_string(layout.apt_conf_path())
        .map(|conf| parse_apt_conf_architectures(&conf))
        .unwrap_or_default();

    let mut targets: Vec<IndexTarget> = Vec::new();
    for entry in parse_sources_list(&sources_list)? {
        for target in entry.index_targets(&architectures) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    Ok(targets)
}
