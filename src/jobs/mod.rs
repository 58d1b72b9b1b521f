// src/jobs/mod.rs
//! The recurring tasks debtrack ships with
//!
//! Registry order is run order: the store is refreshed from the archive
//! before anything derived from it is computed.

mod extract_source_files;
mod general_information;
mod repository_news;
mod source_binaries;
mod update_repositories;
mod version_information;

pub use extract_source_files::{EXTRACTED_FILES, ExtractSourceFiles, SourcePackages};
pub use general_information::{GENERAL_KEY, UpdateGeneralInformation};
pub use repository_news::RepositoryNews;
pub use source_binaries::{BINARIES_KEY, UpdateSourceToBinaries};
pub use update_repositories::UpdateRepositories;
pub use version_information::{RepositoryEntries, UpdateVersionInformation, VERSIONS_KEY};

use crate::archive::ArchiveCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tasks::Runnable;

/// Names of every registered task, in run order
pub const TASK_NAMES: [&str; 6] = [
    update_repositories::NAME,
    extract_source_files::NAME,
    general_information::NAME,
    version_information::NAME,
    source_binaries::NAME,
    repository_news::NAME,
];

/// Instantiate one task by name
pub fn create(config: &Config, name: &str) -> Result<Box<dyn Runnable>> {
    let task: Box<dyn Runnable> = match name {
        update_repositories::NAME => {
            Box::new(UpdateRepositories::new(ArchiveCache::from_config(config)?))
        }
        extract_source_files::NAME => {
            Box::new(ExtractSourceFiles::new(ArchiveCache::from_config(config)?))
        }
        general_information::NAME => Box::new(UpdateGeneralInformation::new()),
        version_information::NAME => Box::new(UpdateVersionInformation::new()),
        source_binaries::NAME => Box::new(UpdateSourceToBinaries::new()),
        repository_news::NAME => Box::new(RepositoryNews::new()),
        other => {
            return Err(Error::NotFoundError(format!(
                "unknown task '{}' (known: {})",
                other,
                TASK_NAMES.join(", ")
            )));
        }
    };
    Ok(task)
}

/// Instantiate every task, in run order
pub fn registry(config: &Config) -> Result<Vec<Box<dyn Runnable>>> {
    TASK_NAMES.iter().map(|name| create(config, name)).collect()
}
