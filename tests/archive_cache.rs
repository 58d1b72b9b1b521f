// tests/archive_cache.rs

//! Archive cache against a local `file://` mirror

mod common;

use common::{CountingFetcher, LocalMirror, PublishedSource, add_repository, cache_root, setup_test_db};
use debtrack::archive::DEFAULT_MAX_SIZE;
use debtrack::{ArchiveCache, Error};
use std::fs;

#[test]
fn test_update_reports_only_changed_indexes() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-1")]);
    mirror.publish_binaries("sid", "amd64", "Package: foo\nVersion: 1.0-1\n");

    let mut repo = add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);
    repo.binary = true;
    repo.update(&conn).unwrap();
    repo.add_architecture(&conn, "amd64").unwrap();

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());

    let first = cache.update_repositories(&conn, false).unwrap();
    assert_eq!(first.sources.len(), 1);
    assert_eq!(first.packages.len(), 1);
    assert_eq!(first.sources[0].repository.shorthand, "unstable");
    assert_eq!(first.sources[0].component, "main");
    assert!(first.sources[0].path.exists());

    // xz is tried first; the mirror only has gzip
    assert!(cache.fetcher().count_ending_with("Sources.xz") >= 1);
    assert!(cache.fetcher().count_ending_with("Sources.gz") >= 1);

    let second = cache.update_repositories(&conn, false).unwrap();
    assert!(second.is_empty());

    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-2")]);
    let third = cache.update_repositories(&conn, false).unwrap();
    assert_eq!(third.sources.len(), 1);
    assert!(third.packages.is_empty());

    let forced = cache.update_repositories(&conn, true).unwrap();
    assert_eq!(forced.sources.len(), 1);
    assert_eq!(forced.packages.len(), 1);
}

#[test]
fn test_index_files_map_to_their_repository() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-2")]);
    mirror.publish("trixie", &[PublishedSource::quilt("foo", "1.0-1")]);

    let unstable = add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);
    let testing = add_repository(&conn, "testing", &mirror.uri(), "trixie", false, 1);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    let updated = cache.update_repositories(&conn, false).unwrap();
    assert_eq!(updated.sources.len(), 2);

    let matcher = cache.matcher(&conn).unwrap();
    for index in &updated.sources {
        let owner = matcher.match_file(&index.path).unwrap();
        assert_eq!(owner.id, index.repository.id);
    }

    let unstable_files = cache.sources_files_for_repository(&conn, &unstable).unwrap();
    let testing_files = cache.sources_files_for_repository(&conn, &testing).unwrap();
    assert_eq!(unstable_files.len(), 1);
    assert_eq!(testing_files.len(), 1);
    assert_ne!(unstable_files, testing_files);
    assert!(cache.packages_files_for_repository(&conn, &unstable).unwrap().is_empty());

    let unrelated = root.join("lists").join("deb.example.org_debian_dists_sid_main_source_Sources");
    assert!(matcher.match_file(&unrelated).is_none());
}

#[test]
fn test_removed_repository_drops_its_indexes() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-2")]);
    mirror.publish("trixie", &[PublishedSource::quilt("foo", "1.0-1")]);

    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);
    let testing = add_repository(&conn, "testing", &mirror.uri(), "trixie", false, 1);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();
    assert_eq!(cache.cached_index_files().unwrap().len(), 2);

    debtrack::db::models::Repository::delete(&conn, testing.id.unwrap()).unwrap();
    let updated = cache.update_repositories(&conn, false).unwrap();
    assert!(updated.is_empty());
    assert_eq!(cache.cached_index_files().unwrap().len(), 1);
}

#[test]
fn test_retrieve_debian_only_is_cached() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    let foo = PublishedSource::quilt("foo", "1.0-1");
    let tarball_name = foo.debian_tarball_name();
    mirror.publish("sid", &[foo]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    let first = cache.retrieve_source("foo", "1.0-1", true).unwrap();
    assert_eq!(first, cache.version_directory("foo", "1.0-1"));
    let changelog = fs::read_to_string(first.join("debian/changelog")).unwrap();
    assert!(changelog.starts_with("foo (1.0-1)"));

    let second = cache.retrieve_source("foo", "1.0-1", true).unwrap();
    assert_eq!(first, second);
    assert!(second.join("debian/control").exists());

    assert_eq!(cache.fetcher().count_ending_with(&tarball_name), 1);
    assert_eq!(cache.fetcher().count_ending_with(".orig.tar.gz"), 0);
    assert_eq!(cache.fetcher().count_ending_with(".dsc"), 0);
    assert!(cache.cache_size().unwrap() > 0);
}

#[test]
fn test_over_budget_purges_before_next_retrieval() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish(
        "sid",
        &[
            PublishedSource::quilt("foo", "1.0-1"),
            PublishedSource::quilt("bar", "2.0-1"),
        ],
    );
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, 1, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    let foo = cache.retrieve_source("foo", "1.0-1", true).unwrap();
    assert!(foo.exists());
    assert!(cache.cache_size().unwrap() > 1);

    let bar = cache.retrieve_source("bar", "2.0-1", true).unwrap();
    assert!(bar.exists());
    assert!(!foo.exists());
    assert!(!cache.package_directory("foo").exists());

    // Index files are not part of the budget
    assert_eq!(cache.cached_index_files().unwrap().len(), 1);
}

#[test]
fn test_unknown_version_is_not_found() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-1")]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    let err = cache.retrieve_source("foo", "9.9-1", true).unwrap_err();
    assert!(matches!(err, Error::NotFoundError(_)));
    let err = cache.retrieve_source("missing", "1.0-1", false).unwrap_err();
    assert!(matches!(err, Error::NotFoundError(_)));
}

#[test]
fn test_tampered_file_fails_checksum() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    let foo = PublishedSource::quilt("foo", "1.0-1");
    let pool_file = mirror
        .path()
        .join(foo.directory())
        .join(foo.debian_tarball_name());
    let tarball_name = foo.debian_tarball_name();
    mirror.publish("sid", &[foo]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    // Same length, different bytes
    let mut content = fs::read(&pool_file).unwrap();
    for byte in content.iter_mut() {
        *byte = byte.wrapping_add(1);
    }
    fs::write(&pool_file, &content).unwrap();

    let err = cache.retrieve_source("foo", "1.0-1", true).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(!cache.package_directory("foo").join(&tarball_name).exists());
    assert!(!cache.version_directory("foo", "1.0-1").exists());
}

#[test]
fn test_traversing_file_name_is_rejected() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    let mut foo = PublishedSource::quilt("foo", "1.0-1");
    for (name, _) in foo.files.iter_mut() {
        if name.ends_with(".debian.tar.gz") {
            *name = "../escaped.debian.tar.gz".to_string();
        }
    }
    mirror.publish("sid", &[foo]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    let err = cache.retrieve_source("foo", "1.0-1", true).unwrap_err();
    assert!(matches!(err, Error::ParseError(_)));
    assert!(cache.fetcher().requests().iter().all(|url| !url.contains("escaped")));
    let escaped = walkdir::WalkDir::new(root_dir.path())
        .into_iter()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name() == "escaped.debian.tar.gz");
    assert!(!escaped);
}

#[test]
fn test_shrinking_extraction_lowers_cache_size() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-1")]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut cache = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    cache.update_repositories(&conn, false).unwrap();

    // A leftover from an earlier, larger extraction of the same version
    let outdir = cache.version_directory("foo", "1.0-1");
    fs::create_dir_all(&outdir).unwrap();
    fs::write(outdir.join("stale"), vec![0u8; 100_000]).unwrap();
    assert!(cache.cache_size().unwrap() >= 100_000);

    cache.retrieve_source("foo", "1.0-1", true).unwrap();
    assert!(!outdir.join("stale").exists());

    let mut fresh = ArchiveCache::new(&root, DEFAULT_MAX_SIZE, CountingFetcher::new());
    let on_disk = fresh.cache_size().unwrap();
    assert!(on_disk < 100_000);
    assert_eq!(cache.cache_size().unwrap(), on_disk);
}
