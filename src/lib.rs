// src/lib.rs

//! debtrack - Debian archive tracker
//!
//! Mirrors Debian-family archive indexes into a local cache, loads them into
//! SQLite and runs recurring tasks that only look at what changed since
//! their previous run.
//!
//! # Architecture
//!
//! - Database-first: repositories, packages and task state all live in SQLite
//! - Archive cache: apt-shaped mirror with a byte budget on extracted sources
//! - Change tracking: each task remembers the keys of the items it handled
//! - Tasks: explicit lifecycle hooks, interval scheduling, per-item failures

pub mod archive;
pub mod compression;
pub mod config;
pub mod db;
mod error;
pub mod hash;
pub mod jobs;
pub mod tasks;
pub mod version;

pub use archive::{ArchiveCache, Fetcher, HttpFetcher, RepositoryIndexMatcher};
pub use config::Config;
pub use error::{Error, Result};
pub use hash::{HashAlgorithm, Hasher};
pub use tasks::{
    ChangeTracker, ItemSource, MainEntrySelector, RepositoryDiffEngine, RunParameters, Task,
    TaskContext, TaskOutcome,
};
pub use version::DebianVersion;
