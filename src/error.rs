// src/error.rs

//! Error types shared by the whole crate

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tracker, the archive cache and the task runner
#[derive(Error, Debug)]
pub enum Error {
    /// Initialization or invariant failure (bad record, missing id, ...)
    #[error("initialization error: {0}")]
    InitError(String),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Malformed index, version string or state blob
    #[error("parse error: {0}")]
    ParseError(String),

    /// Requested name+version (or record) absent
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Network or HTTP failure while syncing or acquiring files
    #[error("transport error: {0}")]
    TransportError(String),

    /// The unpacking tool failed; `output` holds what it printed
    #[error("extraction failed: {message}\n{output}")]
    ExtractionError { message: String, output: String },

    /// A downloaded file does not match the checksum from the index
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// An operation was called before its required precondition call
    #[error("ordering error: {0}")]
    OrderingError(String),

    /// Task data changed underneath us between load and save
    #[error("task data of {0} has been updated in parallel")]
    ConcurrentDataUpdate(String),

    /// Underlying SQLite failure
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error invalidates the whole run rather than one item.
    ///
    /// Store and configuration failures abort the task; everything else is
    /// recorded against the item being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DatabaseError(_)
                | Error::ConfigError(_)
                | Error::InitError(_)
                | Error::ConcurrentDataUpdate(_)
                | Error::OrderingError(_)
                | Error::Json(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::TransportError(err.to_string())
    }
}
