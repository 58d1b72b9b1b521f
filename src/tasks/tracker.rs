// src/tasks/tracker.rs
//! Tracking of already-handled items across runs
//!
//! A [`ChangeTracker`] pairs an [`ItemSource`] (the live universe of items)
//! with the `processed` map of the running task's state. Items whose key is
//! in the map are considered handled; keys whose item vanished from the
//! universe are pruned at the end of each run.

use super::TaskContext;
use super::state::Description;
use crate::error::Result;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The universe a tracker enumerates
///
/// Only `key_of` and `enumerate_all` are required. Sources backed by a
/// table should override `enumerate_all_keys` and `enumerate_unprocessed`
/// with queries that do the projection and filtering in SQLite.
pub trait ItemSource {
    type Item;

    /// Stable identity of an item
    fn key_of(&self, item: &Self::Item) -> String;

    /// Summary kept in the processed map after the item is handled
    fn describe(&self, _item: &Self::Item) -> Result<Description> {
        Ok(Description::new())
    }

    fn enumerate_all(&self, conn: &Connection) -> Result<Vec<Self::Item>>;

    fn enumerate_all_keys(&self, conn: &Connection) -> Result<BTreeSet<String>> {
        Ok(self
            .enumerate_all(conn)?
            .iter()
            .map(|item| self.key_of(item))
            .collect())
    }

    /// Items whose key is not in `processed`
    fn enumerate_unprocessed(
        &self,
        conn: &Connection,
        processed: &BTreeMap<String, Description>,
    ) -> Result<Vec<Self::Item>> {
        Ok(self
            .enumerate_all(conn)?
            .into_iter()
            .filter(|item| !processed.contains_key(&self.key_of(item)))
            .collect())
    }
}

/// A named attribute read off an item for its description
pub struct FieldAccessor<T> {
    pub name: &'static str,
    pub get: fn(&T) -> Value,
}

impl<T> FieldAccessor<T> {
    pub const fn new(name: &'static str, get: fn(&T) -> Value) -> Self {
        Self { name, get }
    }
}

/// Build a description from a list of accessors
pub fn describe_fields<T>(item: &T, fields: &[FieldAccessor<T>]) -> Description {
    fields
        .iter()
        .map(|field| (field.name.to_string(), (field.get)(item)))
        .collect()
}

/// Owned snapshot of pending items; callers may mark while iterating
pub type Pending<T> = std::vec::IntoIter<T>;

/// Decides what is left to do and records what was done
pub struct ChangeTracker<S> {
    source: S,
}

impl<S: ItemSource> ChangeTracker<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn key_of(&self, item: &S::Item) -> String {
        self.source.key_of(item)
    }

    pub fn describe(&self, item: &S::Item) -> Result<Description> {
        self.source.describe(item)
    }

    /// Whether `item` still has to be handled in this run
    pub fn needs_processing(&self, ctx: &TaskContext, item: &S::Item) -> bool {
        ctx.params().force_update || !ctx.state().is_processed(&self.key_of(item))
    }

    /// Items left to handle, re-enumerated on every call
    ///
    /// Under `force_update` every item of the universe is pending.
    pub fn pending(&self, ctx: &TaskContext) -> Result<Pending<S::Item>> {
        let items = if ctx.params().force_update {
            self.source.enumerate_all(ctx.conn())?
        } else {
            self.source
                .enumerate_unprocessed(ctx.conn(), ctx.state().processed())?
        };
        Ok(items.into_iter())
    }

    /// Record items as handled
    pub fn mark_processed<'i, I>(&self, ctx: &mut TaskContext, items: I) -> Result<()>
    where
        I: IntoIterator<Item = &'i S::Item>,
        S::Item: 'i,
    {
        for item in items {
            let description = self.describe(item)?;
            ctx.state_mut()
                .insert_processed(self.key_of(item), description);
        }
        Ok(())
    }

    /// Keys of the live universe
    pub fn all_keys(&self, ctx: &TaskContext) -> Result<BTreeSet<String>> {
        self.source.enumerate_all_keys(ctx.conn())
    }

    /// Processed keys whose item no longer exists
    pub fn obsolete(&self, ctx: &TaskContext) -> Result<Vec<String>> {
        let live = self.all_keys(ctx)?;
        Ok(ctx
            .state()
            .processed()
            .keys()
            .filter(|key| !live.contains(*key))
            .cloned()
            .collect())
    }

    /// Forget obsolete keys; returns how many were dropped
    pub fn prune(&self, ctx: &mut TaskContext) -> Result<usize> {
        let obsolete = self.obsolete(ctx)?;
        for key in &obsolete {
            ctx.state_mut().remove_processed(key);
        }
        Ok(obsolete.len())
    }

    /// Mark every pending item handled without doing any work
    pub fn fake_process_all(&self, ctx: &mut TaskContext) -> Result<usize> {
        let pending: Vec<S::Item> = self.pending(ctx)?.collect();
        self.mark_processed(ctx, &pending)?;
        Ok(pending.len())
    }
}
