// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use debtrack::archive::Fetcher;
use debtrack::db;
use debtrack::db::models::{Repository, RepositoryEntry, SourcePackage};
use debtrack::hash::{HashAlgorithm, hash_bytes};
use debtrack::{HttpFetcher, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use rusqlite::Connection;
use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Create an initialized test database.
///
/// Returns (TempDir, Connection) - keep the TempDir alive to prevent cleanup.
pub fn setup_test_db() -> (TempDir, Connection) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();
    (temp_dir, conn)
}

/// Insert a repository tracking `main` of `suite` at `uri`
pub fn add_repository(
    conn: &Connection,
    shorthand: &str,
    uri: &str,
    suite: &str,
    is_default: bool,
    position: i32,
) -> Repository {
    let mut repo = Repository::new(
        format!("Debian {}", shorthand),
        shorthand.to_string(),
        uri.to_string(),
        suite.to_string(),
        vec!["main".to_string()],
    );
    repo.is_default = is_default;
    repo.position = position;
    repo.binary = false;
    repo.insert(conn).unwrap();
    repo
}

/// Insert a source package version and list it in `repo`; returns the entry id
pub fn add_entry(conn: &Connection, repo: &Repository, name: &str, version: &str) -> i64 {
    let mut package = SourcePackage::new(name.to_string(), version.to_string());
    let package_id = package.upsert(conn).unwrap();
    RepositoryEntry::upsert(conn, package_id, repo.id.unwrap(), "main", None, None).unwrap()
}

/// A gzip-compressed tarball with the given (path, content) members
pub fn tarball(members: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// The debian/ overlay of a package with a changelog and a control file
pub fn debian_tarball(name: &str, version: &str) -> Vec<u8> {
    let changelog = format!(
        "{} ({}) unstable; urgency=medium\n\n  * Release.\n\n -- Jane Doe <jane@example.org>  Mon, 01 Jan 2024 00:00:00 +0000\n",
        name, version
    );
    let control = format!("Source: {}\nMaintainer: Jane Doe <jane@example.org>\n", name);
    tarball(&[
        ("debian/changelog", changelog.as_bytes()),
        ("debian/control", control.as_bytes()),
        ("debian/source/format", &b"3.0 (quilt)\n"[..]),
    ])
}

/// A source package published in a [`LocalMirror`]
pub struct PublishedSource {
    pub name: String,
    pub version: String,
    pub files: Vec<(String, Vec<u8>)>,
}

impl PublishedSource {
    /// A `3.0 (quilt)` package with a dsc, an orig tarball and a debian tarball
    pub fn quilt(name: &str, version: &str) -> Self {
        let upstream = version.split('-').next().unwrap_or(version);
        let dsc = format!("Format: 3.0 (quilt)\nSource: {}\nVersion: {}\n", name, version);
        Self {
            name: name.to_string(),
            version: version.to_string(),
            files: vec![
                (format!("{}_{}.dsc", name, version), dsc.into_bytes()),
                (
                    format!("{}_{}.orig.tar.gz", name, upstream),
                    tarball(&[("README", &b"upstream"[..])]),
                ),
                (
                    format!("{}_{}.debian.tar.gz", name, version),
                    debian_tarball(name, version),
                ),
            ],
        }
    }

    pub fn directory(&self) -> String {
        format!("pool/main/{}/{}", &self.name[..1], self.name)
    }

    pub fn debian_tarball_name(&self) -> String {
        format!("{}_{}.debian.tar.gz", self.name, self.version)
    }

    /// The `Sources` stanza listing this package
    pub fn stanza(&self) -> String {
        let mut stanza = format!(
            "Package: {}\nVersion: {}\nMaintainer: Jane Doe <jane@example.org>\n\
             Standards-Version: 4.6.2\nFormat: 3.0 (quilt)\nDirectory: {}\n\
             Priority: optional\nSection: misc\nFiles:\n",
            self.name,
            self.version,
            self.directory()
        );
        for (name, content) in &self.files {
            stanza.push_str(&format!(
                " {} {} {}\n",
                hash_bytes(HashAlgorithm::Md5, content),
                content.len(),
                name
            ));
        }
        stanza.push_str("Checksums-Sha256:\n");
        for (name, content) in &self.files {
            stanza.push_str(&format!(
                " {} {} {}\n",
                hash_bytes(HashAlgorithm::Sha256, content),
                content.len(),
                name
            ));
        }
        stanza
    }
}

/// A Debian archive on the local filesystem, served through `file://`
pub struct LocalMirror {
    pub dir: TempDir,
}

impl LocalMirror {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Repository URI of the mirror
    pub fn uri(&self) -> String {
        url::Url::from_directory_path(self.dir.path())
            .unwrap()
            .to_string()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Replace the `main` Sources index of `suite` and publish the pool files
    pub fn publish(&self, suite: &str, packages: &[PublishedSource]) {
        let mut sources = String::new();
        for package in packages {
            sources.push_str(&package.stanza());
            sources.push('\n');

            let pool = self.path().join(package.directory());
            fs::create_dir_all(&pool).unwrap();
            for (name, content) in &package.files {
                fs::write(pool.join(name), content).unwrap();
            }
        }
        self.write_gz(&format!("dists/{}/main/source/Sources.gz", suite), sources.as_bytes());
    }

    /// Publish a `Packages` index for one architecture
    pub fn publish_binaries(&self, suite: &str, arch: &str, content: &str) {
        self.write_gz(
            &format!("dists/{}/main/binary-{}/Packages.gz", suite, arch),
            content.as_bytes(),
        );
    }

    fn write_gz(&self, relative: &str, content: &[u8]) {
        let path = self.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }
}

/// Fetcher that records every URL it is asked for
#[derive(Clone)]
pub struct CountingFetcher {
    inner: Rc<HttpFetcher>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HttpFetcher::new().unwrap()),
            requests: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Requests whose URL ends with `suffix`
    pub fn count_ending_with(&self, suffix: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|url| url.ends_with(suffix))
            .count()
    }
}

impl Fetcher for CountingFetcher {
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<Option<u64>> {
        self.requests.borrow_mut().push(url.to_string());
        self.inner.fetch_to(url, dest)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Cache root inside a fresh temporary directory
pub fn cache_root() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("apt-cache");
    (dir, root)
}
