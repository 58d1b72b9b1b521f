// src/archive/fetch.rs
//! Transport for mirrored files
//!
//! The cache never talks to the network directly; every index and source
//! file goes through a [`Fetcher`]. [`HttpFetcher`] serves `http(s)://`
//! repositories with a blocking reqwest client and `file://` repositories
//! from the local filesystem. There is no retry: failures surface to the
//! caller as `TransportError`.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for downloading archive files
pub trait Fetcher {
    /// Download `url` into `dest`, replacing it atomically
    ///
    /// Returns the number of bytes written, or `None` when the remote side
    /// reports the file as missing (HTTP 404, absent local file).
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<Option<u64>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Blocking HTTP fetcher with `file://` support
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("debtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn fetch_http(&self, url: &str, dest: &Path) -> Result<Option<u64>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::TransportError(format!("Failed to fetch {}: {}", url, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::TransportError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let written = write_atomically(dest, |file| {
            io::copy(&mut response, file)
                .map_err(|e| Error::TransportError(format!("Failed to read {}: {}", url, e)))
        })?;
        Ok(Some(written))
    }

    fn fetch_file(&self, url: &Url, dest: &Path) -> Result<Option<u64>> {
        let source = url
            .to_file_path()
            .map_err(|_| Error::TransportError(format!("Invalid file URL: {}", url)))?;
        let mut input = match fs::File::open(&source) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::TransportError(format!(
                    "Failed to open {}: {}",
                    source.display(),
                    e
                )));
            }
        };

        let written = write_atomically(dest, |file| Ok(io::copy(&mut input, file)?))?;
        Ok(Some(written))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<Option<u64>> {
        debug!("Fetching {} to {}", url, dest.display());
        let parsed = Url::parse(url)
            .map_err(|e| Error::TransportError(format!("Invalid URL {}: {}", url, e)))?;
        match parsed.scheme() {
            "http" | "https" => self.fetch_http(url, dest),
            "file" => self.fetch_file(&parsed, dest),
            other => Err(Error::TransportError(format!(
                "Unsupported URL scheme '{}' in {}",
                other, url
            ))),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Write through a temporary file in the destination directory, then rename
pub(crate) fn write_atomically<F>(dest: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut fs::File) -> Result<u64>,
{
    let parent = dest
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(parent).map_err(|e| {
        Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    let written = write(temp.as_file_mut())?;
    temp.persist(dest).map_err(|e| {
        Error::IoError(format!("Failed to move download to {}: {}", dest.display(), e))
    })?;
    Ok(written)
}
