// src/compression/mod.rs
//! Decompression for repository indexes and source tarballs
//!
//! Archives publish `Sources`/`Packages` indexes as `.xz` or `.gz`, and
//! Debian source packages ship `.debian.tar.{xz,gz,bz2}` overlays, so the
//! three formats below cover everything the mirror reads.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Bzip2 compression (.bz2)
    Bzip2,
}

impl CompressionFormat {
    /// Detect compression format from a file name
    ///
    /// Works on raw `OsStr` bytes so file names that are not valid UTF-8
    /// still resolve.
    pub fn from_file_name(name: &OsStr) -> Self {
        let bytes = name.as_encoded_bytes();
        if bytes.ends_with(b".gz") || bytes.ends_with(b".tgz") {
            Self::Gzip
        } else if bytes.ends_with(b".xz") {
            Self::Xz
        } else if bytes.ends_with(b".bz2") {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Bzip2: `42 5a 68` ("BZh")
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(b"BZh") {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Xz => ".xz",
            Self::Bzip2 => ".bz2",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Bzip2 => "bzip2",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
    }
}

/// Decompress a byte slice using the specified format
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>> {
    let mut decoder = create_decoder(data, format);
    let mut output = Vec::new();
    decoder.read_to_end(&mut output).map_err(|e| {
        Error::ParseError(format!("failed to decompress {} data: {}", format.name(), e))
    })?;
    Ok(output)
}

/// Open a file and wrap it in the decoder matching its name
pub fn open_decoded(path: &Path) -> Result<Box<dyn Read>> {
    let format = path
        .file_name()
        .map(CompressionFormat::from_file_name)
        .unwrap_or(CompressionFormat::None);
    let file = std::fs::File::open(path)
        .map_err(|e| Error::IoError(format!("failed to open {}: {}", path.display(), e)))?;
    Ok(create_decoder(file, format))
}
