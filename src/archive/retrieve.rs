// src/archive/retrieve.rs
//! Source package retrieval: locate, acquire, verify and unpack

use super::fetch::Fetcher;
use super::matcher::read_index_targets;
use super::sources::{SourceFile, SourceFileType, SourceRecord, read_paragraphs};
use super::{ArchiveCache, directory_size};
use crate::compression;
use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, hash_file, verify_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Format whose debian/ directory ships as a separate tarball
const QUILT_FORMAT: &str = "3.0 (quilt)";

/// A source record together with the repository base it was listed under
struct Located {
    base_uri: String,
    record: SourceRecord,
}

impl<F: Fetcher> ArchiveCache<F> {
    /// Make a source package version available as an extracted directory
    ///
    /// With `debian_only` and a `3.0 (quilt)` package only the debian
    /// tarball is fetched and unpacked; otherwise every listed file is
    /// fetched and `dpkg-source -x` unpacks the full tree. Files already
    /// present with the right size and checksum are not downloaded again.
    ///
    /// If the extracted-sources size is over budget when this is called,
    /// everything under the packages directory is purged first.
    pub fn retrieve_source(&mut self, name: &str, version: &str, debian_only: bool) -> Result<PathBuf> {
        if self.cache_size()? > self.max_size {
            info!(
                "Source cache over budget ({} > {} bytes), purging",
                self.cache_size()?,
                self.max_size
            );
            self.clear_sources()?;
        }

        let located = self.locate_source(name, version)?;
        let package_dir = self.package_directory(name);
        fs::create_dir_all(&package_dir).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {}", package_dir.display(), e))
        })?;
        let old_size = directory_size(&package_dir)?;

        let quilt_debian_only = debian_only && located.record.format == QUILT_FORMAT;
        let wanted: Vec<&SourceFile> = if quilt_debian_only {
            located
                .record
                .files
                .iter()
                .filter(|f| f.file_type == SourceFileType::Diff)
                .collect()
        } else {
            located.record.files.iter().collect()
        };
        if wanted.is_empty() {
            return Err(Error::ExtractionError {
                message: format!("{} {} lists no files to retrieve", name, version),
                output: String::new(),
            });
        }

        for file in &wanted {
            self.acquire_file(&located, file, &package_dir)?;
        }

        let outdir = self.version_directory(name, version);
        match fs::remove_dir_all(&outdir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to remove {}: {}",
                    outdir.display(),
                    e
                )));
            }
        }

        if quilt_debian_only {
            unpack_tarball(&package_dir.join(&wanted[0].name), &outdir)?;
        } else {
            let dsc = located.record.dsc_file_name().ok_or_else(|| Error::ExtractionError {
                message: format!("{} {} has no .dsc file", name, version),
                output: String::new(),
            })?;
            dpkg_source_extract(&package_dir.join(dsc), &outdir)?;
        }

        // Re-extraction can shrink the tree, so the delta is signed
        let delta = i128::from(directory_size(&package_dir)?) - i128::from(old_size);
        let size = (i128::from(self.cache_size()?) + delta).max(0);
        self.cached_size = Some(u64::try_from(size).unwrap_or(u64::MAX));

        info!("Retrieved {} {} into {}", name, version, outdir.display());
        Ok(outdir)
    }

    /// Find the `Sources` stanza of a name and version in the cached indexes
    fn locate_source(&self, name: &str, version: &str) -> Result<Located> {
        let lists_dir = self.layout.lists_dir();
        for target in read_index_targets(&self.layout)?.iter().filter(|t| t.is_sources()) {
            let path = lists_dir.join(target.list_file_name());
            if !path.exists() {
                continue;
            }
            for paragraph in read_paragraphs(&path)? {
                if paragraph.get("Package") != Some(name) || paragraph.get("Version") != Some(version) {
                    continue;
                }
                return Ok(Located {
                    base_uri: target.uri.clone(),
                    record: SourceRecord::from_paragraph(&paragraph)?,
                });
            }
        }
        Err(Error::NotFoundError(format!("{} {}", name, version)))
    }

    /// Download one constituent file unless a verified copy is present
    fn acquire_file(&self, located: &Located, file: &SourceFile, package_dir: &Path) -> Result<()> {
        let dest = package_dir.join(&file.name);
        let (algorithm, expected) = match &file.sha256 {
            Some(sha256) => (HashAlgorithm::Sha256, sha256.as_str()),
            None => (HashAlgorithm::Md5, file.md5.as_str()),
        };

        if is_intact(&dest, file.size, algorithm, expected)? {
            debug!("{} already present", file.name);
            return Ok(());
        }

        let url = format!(
            "{}/{}/{}",
            located.base_uri.trim_end_matches('/'),
            located.record.directory,
            file.name
        );
        if self.fetcher.fetch_to(&url, &dest)?.is_none() {
            return Err(Error::TransportError(format!("{} not found", url)));
        }

        let size = fs::metadata(&dest)?.len();
        if size != file.size {
            fs::remove_file(&dest)?;
            return Err(Error::ChecksumMismatch {
                file: file.name.clone(),
                expected: format!("{} bytes", file.size),
                actual: format!("{} bytes", size),
            });
        }
        if let Err(e) = verify_file(&dest, expected, algorithm) {
            fs::remove_file(&dest)?;
            return Err(e);
        }
        Ok(())
    }
}

fn is_intact(path: &Path, size: u64, algorithm: HashAlgorithm, expected: &str) -> Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() && metadata.len() == size => {
            Ok(hash_file(algorithm, path)? == expected.to_lowercase())
        }
        _ => Ok(false),
    }
}

/// Unpack a (compressed) tarball into `outdir`
fn unpack_tarball(tarball: &Path, outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)?;
    let mut archive = tar::Archive::new(compression::open_decoded(tarball)?);
    archive.unpack(outdir).map_err(|e| Error::ExtractionError {
        message: format!("Failed to unpack {}", tarball.display()),
        output: e.to_string(),
    })
}

/// Run `dpkg-source -x` on a dsc, capturing its output on failure
fn dpkg_source_extract(dsc: &Path, outdir: &Path) -> Result<()> {
    let dsc = std::path::absolute(dsc)?;
    let outdir = std::path::absolute(outdir)?;

    let output = Command::new("dpkg-source")
        .arg("-x")
        .arg(&dsc)
        .arg(&outdir)
        .output()
        .map_err(|e| Error::ExtractionError {
            message: "Failed to run dpkg-source".to_string(),
            output: e.to_string(),
        })?;

    if !output.status.success() {
        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::ExtractionError {
            message: format!("dpkg-source -x {} exited with {}", dsc.display(), output.status),
            output: captured,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_is_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();
        let digest = sha256(b"abc");

        assert!(is_intact(&path, 3, HashAlgorithm::Sha256, &digest).unwrap());
        assert!(is_intact(&path, 3, HashAlgorithm::Sha256, &digest.to_uppercase()).unwrap());
        assert!(!is_intact(&path, 4, HashAlgorithm::Sha256, &digest).unwrap());
        assert!(!is_intact(&dir.path().join("missing"), 3, HashAlgorithm::Sha256, &digest).unwrap());
    }

    #[test]
    fn test_unpack_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("x.debian.tar.gz");
        {
            let file = fs::File::create(&tarball).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let data = b"3.0 (quilt)\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "debian/source/format", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let out = dir.path().join("out");
        unpack_tarball(&tarball, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("debian/source/format")).unwrap(),
            "3.0 (quilt)\n"
        );
    }

    #[test]
    fn test_unpack_garbage_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("x.debian.tar.gz");
        fs::write(&tarball, b"not a gzip stream at all").unwrap();
        let err = unpack_tarball(&tarball, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::ExtractionError { .. }));
    }
}
