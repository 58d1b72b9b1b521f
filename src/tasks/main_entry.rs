// src/tasks/main_entry.rs

//! Selection of the main repository entry of each source package
//!
//! A package usually appears in several repositories. Its main entry is
//! chosen in two passes:
//!
//! 1. Entries of default repositories: the highest Debian version wins, and
//!    on an exact version tie the repository with the higher position wins.
//! 2. Entries of every other repository, by the same rule, for names that
//!    pass 1 did not resolve.
//!
//! A default repository therefore always beats a higher version elsewhere.

use super::state::Description;
use super::tracker::ItemSource;
use crate::db::models::RepositoryEntry;
use crate::error::Result;
use crate::version;
use rusqlite::Connection;
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::debug;

/// Winning entry per package name
pub type MainEntries = BTreeMap<String, RepositoryEntry>;

/// Pick the main entry of every package name in `entries`
pub fn select_main_entries(entries: impl IntoIterator<Item = RepositoryEntry>) -> MainEntries {
    let (defaults, others): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|entry| entry.repository_is_default);

    let mut winners = MainEntries::new();
    select_pass(&mut winners, defaults, |_| true);

    let resolved: BTreeSet<String> = winners.keys().cloned().collect();
    select_pass(&mut winners, others, |name| !resolved.contains(name));
    winners
}

fn select_pass<F>(winners: &mut MainEntries, entries: Vec<RepositoryEntry>, eligible: F)
where
    F: Fn(&str) -> bool,
{
    for entry in entries {
        if !eligible(&entry.name) {
            continue;
        }
        match winners.get(&entry.name) {
            Some(current) if !beats(&entry, current) => {}
            _ => {
                winners.insert(entry.name.clone(), entry);
            }
        }
    }
}

/// Whether `candidate` should replace `current`
fn beats(candidate: &RepositoryEntry, current: &RepositoryEntry) -> bool {
    match compare_versions(&candidate.version, &current.version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.repository_position > current.repository_position,
    }
}

/// Debian ordering, falling back to byte order for unparsable versions
fn compare_versions(a: &str, b: &str) -> Ordering {
    version::compare_versions(a, b).unwrap_or_else(|_| {
        debug!("Comparing unparsable versions {} and {} as strings", a, b);
        a.cmp(b)
    })
}

/// Item source over main entries, memoized for the duration of a run
///
/// The memo is filled on first enumeration; tasks clear it at the start and
/// end of each run through their lifecycle hooks.
#[derive(Debug, Default)]
pub struct MainEntrySelector {
    memo: RefCell<Option<Rc<MainEntries>>>,
}

impl MainEntrySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Main entries of the current store content
    pub fn main_entries(&self, conn: &Connection) -> Result<Rc<MainEntries>> {
        if let Some(entries) = self.memo.borrow().as_ref() {
            return Ok(Rc::clone(entries));
        }

        let entries = Rc::new(select_main_entries(RepositoryEntry::list_all(conn)?));
        debug!("Selected {} main entries", entries.len());
        *self.memo.borrow_mut() = Some(Rc::clone(&entries));
        Ok(entries)
    }

    pub fn clear(&self) {
        self.memo.borrow_mut().take();
    }

    pub fn is_memoized(&self) -> bool {
        self.memo.borrow().is_some()
    }
}

impl ItemSource for MainEntrySelector {
    type Item = RepositoryEntry;

    fn key_of(&self, item: &RepositoryEntry) -> String {
        item.id.to_string()
    }

    fn describe(&self, item: &RepositoryEntry) -> Result<Description> {
        let mut description = Description::new();
        description.insert("name".into(), Value::from(item.name.as_str()));
        description.insert("version".into(), Value::from(item.version.as_str()));
        description.insert(
            "repository".into(),
            Value::from(item.repository_shorthand.as_str()),
        );
        Ok(description)
    }

    fn enumerate_all(&self, conn: &Connection) -> Result<Vec<RepositoryEntry>> {
        Ok(self.main_entries(conn)?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str, version: &str, position: i32, is_default: bool) -> RepositoryEntry {
        RepositoryEntry {
            id,
            source_package_id: id,
            repository_id: position as i64,
            name: name.to_string(),
            version: version.to_string(),
            component: "main".to_string(),
            priority: None,
            section: None,
            repository_shorthand: format!("repo{}", position),
            repository_position: position,
            repository_is_default: is_default,
        }
    }

    #[test]
    fn test_default_repository_beats_higher_version() {
        let winners = select_main_entries(vec![
            entry(1, "foo", "2.0-1", 1, false),
            entry(2, "foo", "1.0-1", 2, true),
        ]);
        assert_eq!(winners["foo"].id, 2);
    }

    #[test]
    fn test_equal_versions_prefer_higher_position() {
        let winners = select_main_entries(vec![
            entry(1, "foo", "1.0-1", 3, true),
            entry(2, "foo", "1.0-1", 7, true),
            entry(3, "foo", "1.0-1", 5, true),
        ]);
        assert_eq!(winners["foo"].repository_position, 7);
    }

    #[test]
    fn test_debian_ordering_not_lexical() {
        let winners = select_main_entries(vec![
            entry(1, "foo", "1.10-1", 1, false),
            entry(2, "foo", "1.9-1", 2, false),
            entry(3, "bar", "1.0~rc1-1", 1, false),
            entry(4, "bar", "1.0-1", 2, false),
        ]);
        assert_eq!(winners["foo"].id, 1);
        assert_eq!(winners["bar"].id, 4);
    }

    #[test]
    fn test_two_default_repositories_use_version_rule() {
        let winners = select_main_entries(vec![
            entry(1, "foo", "3.0-1", 1, true),
            entry(2, "foo", "2.0-1", 9, true),
        ]);
        assert_eq!(winners["foo"].id, 1);
    }

    #[test]
    fn test_every_name_gets_one_winner() {
        let winners = select_main_entries(vec![
            entry(1, "foo", "1.0", 1, true),
            entry(2, "bar", "1.0", 2, false),
            entry(3, "bar", "0.9", 3, false),
        ]);
        assert_eq!(winners.len(), 2);
        assert!(select_main_entries(Vec::new()).is_empty());
    }

    #[test]
    fn test_unparsable_versions_compare_as_strings() {
        assert_eq!(compare_versions("", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_describe() {
        let selector = MainEntrySelector::new();
        let item = entry(5, "foo", "1.0-1", 2, true);
        assert_eq!(selector.key_of(&item), "5");
        let description = selector.describe(&item).unwrap();
        assert_eq!(description["name"], "foo");
        assert_eq!(description["version"], "1.0-1");
        assert_eq!(description["repository"], "repo2");
    }
}
