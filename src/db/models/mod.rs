// src/db/models/mod.rs

//! Data models for debtrack database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod architecture;
mod binary_package;
mod extracted_file;
mod news;
mod package_data;
mod repository;
mod source_package;
mod task_data;

pub use architecture::Architecture;
pub use binary_package::{BinaryPackage, BinaryRepositoryEntry};
pub use extracted_file::ExtractedSourceFile;
pub use news::News;
pub use package_data::PackageData;
pub use repository::Repository;
pub use source_package::{RepositoryEntry, SourcePackage};
pub use task_data::TaskData;
