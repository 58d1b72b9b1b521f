// src/archive/mod.rs
//! Bounded local mirror of Debian archive indexes and source packages
//!
//! [`ArchiveCache`] owns one cache root. It regenerates the mirror
//! configuration from the database, syncs `Sources`/`Packages` indexes and
//! reports which ones changed, and retrieves individual source package
//! versions into per-version directories. Extracted sources are kept under
//! a byte budget; once the budget is exceeded the next retrieval purges
//! every extracted source before proceeding. Index files never count
//! against the budget.

pub mod fetch;
pub mod matcher;
pub mod mirror;
mod retrieve;
pub mod sources;

pub use fetch::{Fetcher, HttpFetcher};
pub use matcher::RepositoryIndexMatcher;
pub use mirror::{IndexKind, IndexTarget, MirrorLayout};

use crate::compression::{self, CompressionFormat};
use crate::config::Config;
use crate::db::models::{Architecture, Repository};
use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, hash_file};
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default extracted-sources budget
pub const DEFAULT_MAX_SIZE: u64 = crate::config::DEFAULT_MAX_CACHE_SIZE;

/// Index compressions tried in order; a 404 moves on to the next one
const INDEX_COMPRESSIONS: [CompressionFormat; 2] = [CompressionFormat::Xz, CompressionFormat::Gzip];

/// An index file whose content changed during an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedIndex {
    pub repository: Repository,
    pub component: String,
    pub path: PathBuf,
}

/// Result of [`ArchiveCache::update_repositories`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatedIndexes {
    pub sources: Vec<ChangedIndex>,
    pub packages: Vec<ChangedIndex>,
}

impl UpdatedIndexes {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.packages.is_empty()
    }
}

/// Size-bounded mirror rooted at one directory
pub struct ArchiveCache<F: Fetcher = HttpFetcher> {
    layout: MirrorLayout,
    max_size: u64,
    trusted_keyring: Option<PathBuf>,
    fetcher: F,
    /// Extracted-sources size, computed lazily
    cached_size: Option<u64>,
}

impl ArchiveCache<HttpFetcher> {
    /// Build the cache described by the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut cache = Self::new(config.cache_root(), config.max_cache_size()?, HttpFetcher::new()?);
        cache.trusted_keyring = config.cache.trusted_keyring.clone();
        Ok(cache)
    }
}

impl<F: Fetcher> ArchiveCache<F> {
    pub fn new(root: impl Into<PathBuf>, max_size: u64, fetcher: F) -> Self {
        Self {
            layout: MirrorLayout::new(root),
            max_size,
            trusted_keyring: None,
            fetcher,
            cached_size: None,
        }
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Regenerate sources.list and apt.conf from the live records
    ///
    /// Idempotent; every network operation calls it first.
    pub fn refresh_configuration(&self, conn: &Connection) -> Result<()> {
        let etc = self.layout.etc_dir();
        fs::create_dir_all(&etc).map_err(|e| io_error("create", &etc, e))?;
        fs::create_dir_all(self.layout.lists_dir().join("partial"))?;

        let mut sources_list = String::new();
        for repo in Repository::list_all(conn)? {
            let archs = repo.architectures(conn)?;
            sources_list.push_str(&repo.sources_list_entry(&archs));
            sources_list.push('\n');
        }
        write_if_changed(&self.layout.sources_list_path(), sources_list.as_bytes())?;

        let architectures: Vec<String> = Architecture::list_all(conn)?
            .into_iter()
            .map(|a| a.name)
            .collect();
        let conf = mirror::render_apt_conf(
            &self.layout,
            &architectures,
            self.trusted_keyring.as_deref(),
        );
        write_if_changed(&self.layout.apt_conf_path(), conf.as_bytes())?;

        debug!("Mirror configuration refreshed in {}", etc.display());
        Ok(())
    }

    /// Matcher over the current generated configuration
    pub fn matcher(&self, conn: &Connection) -> Result<RepositoryIndexMatcher> {
        RepositoryIndexMatcher::load(&self.layout, conn)
    }

    /// Sync every configured index file
    ///
    /// With `force` the whole cache root is wiped first, so every index is
    /// reported as changed. Only files whose decompressed content differs
    /// from the cached copy are returned.
    pub fn update_repositories(&mut self, conn: &Connection, force: bool) -> Result<UpdatedIndexes> {
        if force {
            info!("Forced update: clearing {}", self.layout.root().display());
            self.clear()?;
        }

        self.refresh_configuration(conn)?;
        let matcher = self.matcher(conn)?;
        let lists_dir = self.layout.lists_dir();

        let mut updated = UpdatedIndexes::default();
        for target in matcher.targets() {
            let list_path = lists_dir.join(target.list_file_name());
            if !self.sync_index(target, &list_path)? {
                continue;
            }

            let Some(repository) = matcher.match_file(&list_path) else {
                warn!("No repository owns {}", list_path.display());
                continue;
            };
            let changed = ChangedIndex {
                repository: repository.clone(),
                component: target.component.clone(),
                path: list_path,
            };
            if target.is_sources() {
                updated.sources.push(changed);
            } else {
                updated.packages.push(changed);
            }
        }

        self.remove_unreferenced_lists(matcher.targets())?;

        info!(
            "Repository update finished: {} Sources and {} Packages files changed",
            updated.sources.len(),
            updated.packages.len()
        );
        Ok(updated)
    }

    /// Fetch one index; returns whether the cached copy changed
    fn sync_index(&self, target: &IndexTarget, list_path: &Path) -> Result<bool> {
        let partial_dir = self.layout.lists_dir().join("partial");
        let base_url = target.url();

        for format in INDEX_COMPRESSIONS {
            let url = format!("{}{}", base_url, format.extension());
            let download = partial_dir.join(format!("{}{}", target.list_file_name(), format.extension()));

            if self.fetcher.fetch_to(&url, &download)?.is_none() {
                debug!("{} not found, trying next compression", url);
                continue;
            }

            let changed = self.install_index(&download, list_path)?;
            fs::remove_file(&download).map_err(|e| io_error("remove", &download, e))?;
            if changed {
                info!("Updated {}", target);
            } else {
                debug!("Unchanged {}", target);
            }
            return Ok(changed);
        }

        warn!("No index found for {}", target);
        Ok(false)
    }

    /// Decompress a download next to the cached copy and swap it in if different
    fn install_index(&self, download: &Path, list_path: &Path) -> Result<bool> {
        let lists_dir = self.layout.lists_dir();
        let mut temp = tempfile::NamedTempFile::new_in(&lists_dir)?;
        let mut decoder = compression::open_decoded(download)?;
        io::copy(&mut decoder, temp.as_file_mut()).map_err(|e| {
            Error::ParseError(format!("Failed to decompress {}: {}", download.display(), e))
        })?;

        if list_path.exists() {
            let new_hash = hash_file(HashAlgorithm::Sha256, temp.path())?;
            let old_hash = hash_file(HashAlgorithm::Sha256, list_path)?;
            if new_hash == old_hash {
                return Ok(false);
            }
        }

        temp.persist(list_path)
            .map_err(|e| Error::IoError(format!("Failed to install {}: {}", list_path.display(), e)))?;
        Ok(true)
    }

    /// Drop index files that no configured target produces any more
    fn remove_unreferenced_lists(&self, targets: &[IndexTarget]) -> Result<()> {
        let wanted: HashSet<String> = targets.iter().map(|t| t.list_file_name()).collect();
        for path in self.cached_index_files()? {
            let keep = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| wanted.contains(n));
            if !keep {
                debug!("Removing stale index {}", path.display());
                fs::remove_file(&path).map_err(|e| io_error("remove", &path, e))?;
            }
        }
        Ok(())
    }

    /// All cached index files
    pub fn cached_index_files(&self) -> Result<Vec<PathBuf>> {
        let lists_dir = self.layout.lists_dir();
        let entries = match fs::read_dir(&lists_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read", &lists_dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Cached `Sources` files attributed to `repository`
    pub fn sources_files_for_repository(
        &self,
        conn: &Connection,
        repository: &Repository,
    ) -> Result<Vec<PathBuf>> {
        self.index_files_for_repository(conn, repository, b"Sources")
    }

    /// Cached `Packages` files attributed to `repository`
    pub fn packages_files_for_repository(
        &self,
        conn: &Connection,
        repository: &Repository,
    ) -> Result<Vec<PathBuf>> {
        self.index_files_for_repository(conn, repository, b"Packages")
    }

    fn index_files_for_repository(
        &self,
        conn: &Connection,
        repository: &Repository,
        suffix: &[u8],
    ) -> Result<Vec<PathBuf>> {
        let matcher = self.matcher(conn)?;
        Ok(self
            .cached_index_files()?
            .into_iter()
            .filter(|path| path.as_os_str().as_encoded_bytes().ends_with(suffix))
            .filter(|path| matcher.match_file(path).is_some_and(|r| r.id == repository.id))
            .collect())
    }

    /// Size in bytes of the extracted-sources subtree, computed on first use
    pub fn cache_size(&mut self) -> Result<u64> {
        match self.cached_size {
            Some(size) => Ok(size),
            None => {
                let size = directory_size(&self.layout.packages_dir())?;
                self.cached_size = Some(size);
                Ok(size)
            }
        }
    }

    /// Remove the whole mirror, configuration and indexes included
    pub fn clear(&mut self) -> Result<()> {
        remove_dir(self.layout.root())?;
        fs::create_dir_all(self.layout.root()).map_err(|e| io_error("create", self.layout.root(), e))?;
        self.cached_size = None;
        Ok(())
    }

    /// Remove every downloaded and extracted source package
    pub fn clear_sources(&mut self) -> Result<()> {
        let packages_dir = self.layout.packages_dir();
        info!("Clearing cached sources in {}", packages_dir.display());
        remove_dir(&packages_dir)?;
        self.cached_size = Some(directory_size(&packages_dir)?);
        Ok(())
    }

    /// Directory holding the downloaded files of a source package
    pub fn package_directory(&self, package_name: &str) -> PathBuf {
        self.layout
            .packages_dir()
            .join(package_hashdir(package_name))
            .join(package_name)
    }

    /// Directory a source package version is extracted into
    pub fn version_directory(&self, package_name: &str, version: &str) -> PathBuf {
        self.package_directory(package_name)
            .join(format!("{}-{}", package_name, version))
    }
}

/// Fan-out bucket of a package: its first letter, or four for `lib*`
pub fn package_hashdir(package_name: &str) -> &str {
    let len = if package_name.starts_with("lib") { 4 } else { 1 };
    package_name.get(..len).unwrap_or(package_name)
}

/// Total bytes of the files under `path` (symlinks counted, not followed)
pub fn directory_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }

    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", path.display(), e)))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| Error::IoError(format!("Failed to stat {}: {}", entry.path().display(), e)))?;
        total += metadata.len();
    }
    Ok(total)
}

/// Remove a directory tree if present
fn remove_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("remove", path, e)),
    }
}

fn write_if_changed(path: &Path, content: &[u8]) -> Result<()> {
    if fs::read(path).is_ok_and(|existing| existing == content) {
        return Ok(());
    }
    fs::write(path, content).map_err(|e| io_error("write", path, e))
}

fn io_error(action: &str, path: &Path, err: io::Error) -> Error {
    Error::IoError(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_hashdir() {
        assert_eq!(package_hashdir("dpkg"), "d");
        assert_eq!(package_hashdir("libc6"), "libc");
        assert_eq!(package_hashdir("lib"), "lib");
        assert_eq!(package_hashdir(""), "");
    }

    #[test]
    fn test_directory_size_counts_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/one"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("a/b/two"), vec![0u8; 23]).unwrap();

        assert_eq!(directory_size(dir.path()).unwrap(), 123);
        assert_eq!(directory_size(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn test_version_directory_layout() {
        let cache = ArchiveCache::new("/cache", DEFAULT_MAX_SIZE, HttpFetcher::new().unwrap());
        assert_eq!(
            cache.version_directory("libfoo", "1.0-1"),
            PathBuf::from("/cache/packages/libf/libfoo/libfoo-1.0-1")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_clear_sources_handles_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let mut cache = ArchiveCache::new(dir.path(), DEFAULT_MAX_SIZE, HttpFetcher::new().unwrap());
        let pkg_dir = cache.package_directory("foo");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join(OsStr::from_bytes(b"bad\xffname")), b"12345").unwrap();

        assert_eq!(cache.cache_size().unwrap(), 5);
        cache.clear_sources().unwrap();
        assert_eq!(cache.cache_size().unwrap(), 0);
        assert!(!pkg_dir.exists());
    }
}
