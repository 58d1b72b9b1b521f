// tests/jobs.rs

//! The shipped tasks run end to end against a local mirror

mod common;

use common::{LocalMirror, PublishedSource, add_repository, cache_root, setup_test_db};
use debtrack::archive::DEFAULT_MAX_SIZE;
use debtrack::db::models::{
    BinaryPackage, BinaryRepositoryEntry, ExtractedSourceFile, News, PackageData, RepositoryEntry,
    SourcePackage,
};
use debtrack::jobs::{
    BINARIES_KEY, ExtractSourceFiles, GENERAL_KEY, RepositoryNews, UpdateGeneralInformation,
    UpdateRepositories, UpdateSourceToBinaries, UpdateVersionInformation, VERSIONS_KEY,
};
use debtrack::tasks::{RunParameters, TaskOutcome, TaskState, run_task};
use debtrack::{ArchiveCache, HttpFetcher};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;

const FAKE: RunParameters = RunParameters {
    force_update: false,
    fake_update: true,
};

fn cache(root: &Path) -> ArchiveCache {
    ArchiveCache::new(root, DEFAULT_MAX_SIZE, HttpFetcher::new().unwrap())
}

fn news_titles(conn: &Connection) -> BTreeSet<String> {
    News::list_all(conn)
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect()
}

fn entries(conn: &Connection) -> BTreeSet<(String, String, String)> {
    RepositoryEntry::list_all(conn)
        .unwrap()
        .into_iter()
        .map(|e| (e.repository_shorthand, e.name, e.version))
        .collect()
}

fn entry(repo: &str, name: &str, version: &str) -> (String, String, String) {
    (repo.to_string(), name.to_string(), version.to_string())
}

#[test]
fn test_repository_lifecycle() {
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
    let mut update = UpdateRepositories::new(cache(&root));
    assert_eq!(
        run_task(&mut update, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert_eq!(
        entries(&conn),
        BTreeSet::from([
            entry("unstable", "foo", "1.0-1"),
            entry("unstable", "bar", "2.0-1"),
        ])
    );

    // Bootstrap: everything already present is known, no news
    let mut news = RepositoryNews::new();
    assert_eq!(run_task(&mut news, &conn, FAKE), TaskOutcome::Completed);
    assert!(news_titles(&conn).is_empty());

    mirror.publish(
        "sid",
        &[
            PublishedSource::quilt("foo", "1.0-2"),
            PublishedSource::quilt("baz", "0.1-1"),
        ],
    );
    mirror.publish("trixie", &[PublishedSource::quilt("foo", "1.0-1")]);
    add_repository(&conn, "testing", &mirror.uri(), "trixie", false, 1);

    assert_eq!(
        run_task(&mut update, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert_eq!(
        entries(&conn),
        BTreeSet::from([
            entry("unstable", "foo", "1.0-2"),
            entry("unstable", "baz", "0.1-1"),
            entry("testing", "foo", "1.0-1"),
        ])
    );
    assert!(SourcePackage::find(&conn, "bar", "2.0-1").unwrap().is_none());

    let mut news = RepositoryNews::new();
    assert_eq!(
        run_task(&mut news, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert_eq!(
        news_titles(&conn),
        BTreeSet::from([
            "foo 1.0-2 has been added to unstable".to_string(),
            "baz 0.1-1 has been added to unstable".to_string(),
            "foo 1.0-1 migrated to testing".to_string(),
            "bar has been removed from unstable".to_string(),
        ])
    );

    // Nothing changed since, so a second run publishes nothing new
    let mut news = RepositoryNews::new();
    run_task(&mut news, &conn, RunParameters::default());
    assert_eq!(News::list_all(&conn).unwrap().len(), 4);
    assert_eq!(News::list_for_package(&conn, "bar").unwrap().len(), 1);
}

#[test]
fn test_extract_and_general_information() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish(
        "sid",
        &[
            PublishedSource::quilt("foo", "1.0-2"),
            PublishedSource::quilt("baz", "0.1-1"),
        ],
    );
    mirror.publish("trixie", &[PublishedSource::quilt("foo", "1.0-1")]);
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);
    add_repository(&conn, "testing", &mirror.uri(), "trixie", false, 1);

    let (_root_dir, root) = cache_root();
    let mut update = UpdateRepositories::new(cache(&root));
    assert_eq!(
        run_task(&mut update, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );

    let mut extract = ExtractSourceFiles::new(cache(&root));
    assert_eq!(
        run_task(&mut extract, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );

    let foo = SourcePackage::find(&conn, "foo", "1.0-2").unwrap().unwrap();
    let files = ExtractedSourceFile::list_for_package(&conn, foo.id.unwrap()).unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["changelog", "control"]);
    assert!(files[0].content.starts_with(b"foo (1.0-2)"));

    let state = TaskState::load(&conn, "extract-source-files").unwrap();
    assert_eq!(state.processed().len(), 3);

    let mut general = UpdateGeneralInformation::new();
    assert_eq!(
        run_task(&mut general, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );

    let info = PackageData::get(&conn, "foo", GENERAL_KEY).unwrap().unwrap();
    assert_eq!(info["version"], "1.0-2");
    assert_eq!(info["repository"], "unstable");
    assert_eq!(info["component"], "main");
    assert_eq!(info["standards_version"], "4.6.2");
    assert_eq!(info["maintainer"]["name"], "Jane Doe");
    assert_eq!(info["maintainer"]["email"], "jane@example.org");
    assert!(PackageData::get(&conn, "baz", GENERAL_KEY).unwrap().is_some());

    // baz leaves the archive: its general data goes with it
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-2")]);
    run_task(&mut update, &conn, RunParameters::default());
    run_task(&mut general, &conn, RunParameters::default());
    assert!(PackageData::get(&conn, "baz", GENERAL_KEY).unwrap().is_none());
    assert!(PackageData::get(&conn, "foo", GENERAL_KEY).unwrap().is_some());
}

#[test]
fn test_extract_failure_is_per_item() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    let broken = PublishedSource::quilt("broken", "1.0-1");
    let broken_pool = mirror
        .path()
        .join(broken.directory())
        .join(broken.debian_tarball_name());
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-1"), broken]);
    std::fs::remove_file(&broken_pool).unwrap();
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut update = UpdateRepositories::new(cache(&root));
    run_task(&mut update, &conn, RunParameters::default());

    let mut extract = ExtractSourceFiles::new(cache(&root));
    let outcome = run_task(&mut extract, &conn, RunParameters::default());
    let failures = match outcome {
        TaskOutcome::CompletedWithFailures(failures) => failures,
        other => panic!("expected item failures, got {:?}", other),
    };
    assert_eq!(failures.len(), 1);
    let broken_id = SourcePackage::find(&conn, "broken", "1.0-1")
        .unwrap()
        .unwrap()
        .id
        .unwrap();
    assert_eq!(failures[0].key, broken_id.to_string());

    // The failed package stays pending for the next run
    let state = TaskState::load(&conn, "extract-source-files").unwrap();
    assert_eq!(state.processed().len(), 1);
    assert!(!state.is_processed(&broken_id.to_string()));
}

#[test]
fn test_failed_news_run_is_retried_in_full() {
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
    let mut update = UpdateRepositories::new(cache(&root));
    run_task(&mut update, &conn, RunParameters::default());
    let mut news = RepositoryNews::new();
    assert_eq!(
        run_task(&mut news, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert_eq!(news_titles(&conn).len(), 2);

    mirror.publish(
        "sid",
        &[
            PublishedSource::quilt("foo", "1.0-1"),
            PublishedSource::quilt("baz", "0.1-1"),
        ],
    );
    run_task(&mut update, &conn, RunParameters::default());

    // The removal news fails after baz was already handled
    conn.execute_batch(
        "CREATE TRIGGER reject_removal_news BEFORE INSERT ON news
         WHEN NEW.title LIKE '%removed%'
         BEGIN SELECT RAISE(ABORT, 'news rejected'); END;",
    )
    .unwrap();
    let mut news = RepositoryNews::new();
    let outcome = run_task(&mut news, &conn, RunParameters::default());
    assert!(matches!(outcome, TaskOutcome::Failed(ref e) if e.contains("news rejected")));
    assert_eq!(news_titles(&conn).len(), 2);

    conn.execute_batch("DROP TRIGGER reject_removal_news").unwrap();
    let mut news = RepositoryNews::new();
    assert_eq!(
        run_task(&mut news, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert_eq!(
        news_titles(&conn),
        BTreeSet::from([
            "foo 1.0-1 has been added to unstable".to_string(),
            "bar 2.0-1 has been added to unstable".to_string(),
            "baz 0.1-1 has been added to unstable".to_string(),
            "bar has been removed from unstable".to_string(),
        ])
    );
}

#[test]
fn test_failed_general_run_marks_nothing() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish(
        "sid",
        &[
            PublishedSource::quilt("foo", "1.0-1"),
            PublishedSource::quilt("baz", "0.1-1"),
        ],
    );
    add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);

    let (_root_dir, root) = cache_root();
    let mut update = UpdateRepositories::new(cache(&root));
    run_task(&mut update, &conn, RunParameters::default());

    // baz is written first, then foo fails
    conn.execute_batch(
        "CREATE TRIGGER reject_foo BEFORE INSERT ON package_data
         WHEN NEW.package_name = 'foo'
         BEGIN SELECT RAISE(ABORT, 'general rejected'); END;",
    )
    .unwrap();
    let mut general = UpdateGeneralInformation::new();
    let outcome = run_task(&mut general, &conn, RunParameters::default());
    assert!(outcome.is_failed());
    assert!(PackageData::get(&conn, "baz", GENERAL_KEY).unwrap().is_none());
    let state = TaskState::load(&conn, "update-general-information").unwrap();
    assert!(state.processed().is_empty());

    conn.execute_batch("DROP TRIGGER reject_foo").unwrap();
    assert_eq!(
        run_task(&mut general, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    assert!(PackageData::get(&conn, "baz", GENERAL_KEY).unwrap().is_some());
    assert!(PackageData::get(&conn, "foo", GENERAL_KEY).unwrap().is_some());
}

const BINARIES: &str = "\
Package: foo-bin
Version: 1.0-2
Source: foo
Architecture: amd64
Description: foo command line tools

Package: libfoo1
Version: 1.0-2+b1
Source: foo (1.0-2)
Architecture: amd64
";

fn binary_names(value: &serde_json::Value) -> Vec<&str> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect()
}

#[test]
fn test_binaries_and_versions() {
    let (_dir, conn) = setup_test_db();
    let mirror = LocalMirror::new();
    mirror.publish("sid", &[PublishedSource::quilt("foo", "1.0-2")]);
    mirror.publish_binaries("sid", "amd64", BINARIES);
    mirror.publish("trixie", &[PublishedSource::quilt("foo", "1.0-1")]);

    let mut unstable = add_repository(&conn, "unstable", &mirror.uri(), "sid", true, 0);
    unstable.binary = true;
    unstable.update(&conn).unwrap();
    unstable.add_architecture(&conn, "amd64").unwrap();
    add_repository(&conn, "testing", &mirror.uri(), "trixie", false, 1);

    let (_root_dir, root) = cache_root();
    let mut update = UpdateRepositories::new(cache(&root));
    assert_eq!(
        run_task(&mut update, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );

    let unstable_id = unstable.id.unwrap();
    let foo = SourcePackage::find(&conn, "foo", "1.0-2").unwrap().unwrap();
    assert_eq!(foo.format.as_deref(), Some("3.0 (quilt)"));
    let entries = BinaryRepositoryEntry::list_for_repository(&conn, unstable_id).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.architecture == "amd64"));
    let built: Vec<String> = BinaryPackage::list_for_source(&conn, foo.id.unwrap())
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(built, vec!["foo-bin", "libfoo1"]);

    let mut versions = UpdateVersionInformation::new();
    assert_eq!(
        run_task(&mut versions, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    let info = PackageData::get(&conn, "foo", VERSIONS_KEY).unwrap().unwrap();
    let list = info["version_list"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["repository"]["shorthand"], "unstable");
    assert_eq!(list[0]["version"], "1.0-2");
    assert_eq!(list[1]["repository"]["shorthand"], "testing");
    assert_eq!(list[1]["version"], "1.0-1");
    assert_eq!(
        info["default_pool_url"],
        format!("{}/pool/main/f/foo", mirror.uri().trim_end_matches('/'))
    );

    let mut binaries = UpdateSourceToBinaries::new();
    assert_eq!(
        run_task(&mut binaries, &conn, RunParameters::default()),
        TaskOutcome::Completed
    );
    let value = PackageData::get(&conn, "foo", BINARIES_KEY).unwrap().unwrap();
    assert_eq!(binary_names(&value), vec!["foo-bin", "libfoo1"]);
    assert_eq!(value[0]["repository"]["shorthand"], "unstable");

    // libfoo1 leaves unstable and foo leaves testing
    mirror.publish_binaries("sid", "amd64", BINARIES.split("\n\n").next().unwrap());
    mirror.publish("trixie", &[]);
    run_task(&mut update, &conn, RunParameters::default());
    assert_eq!(
        BinaryRepositoryEntry::list_for_repository(&conn, unstable_id)
            .unwrap()
            .len(),
        1
    );
    assert!(SourcePackage::find(&conn, "foo", "1.0-1").unwrap().is_none());

    run_task(&mut versions, &conn, RunParameters::default());
    let info = PackageData::get(&conn, "foo", VERSIONS_KEY).unwrap().unwrap();
    assert_eq!(info["version_list"].as_array().unwrap().len(), 1);

    // The main entry did not change, so only a forced run rebuilds the list
    let forced = RunParameters {
        force_update: true,
        fake_update: false,
    };
    run_task(&mut binaries, &conn, forced);
    let value = PackageData::get(&conn, "foo", BINARIES_KEY).unwrap().unwrap();
    assert_eq!(binary_names(&value), vec!["foo-bin"]);
}
