// src/archive/sources.rs
//! deb822 parsing for `Sources` and `Packages` indexes
//!
//! Paragraphs are separated by blank lines; a field continues on lines that
//! start with whitespace. Field names compare case-insensitively.

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use std::ffi::OsStr;
use std::path::Path;

/// One deb822 paragraph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    fields: Vec<(String, String)>,
}

impl Paragraph {
    /// Value of a field, folded lines joined with `\n`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::ParseError(format!("paragraph without {} field", key)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split deb822 text into paragraphs
pub fn parse_paragraphs(content: &str) -> Result<Vec<Paragraph>> {
    let mut paragraphs = Vec::new();
    let mut current = Paragraph::default();

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let Some((_, value)) = current.fields.last_mut() else {
                return Err(Error::ParseError(format!(
                    "continuation line without a field at line {}",
                    lineno + 1
                )));
            };
            let text = line.trim();
            value.push('\n');
            if text != "." {
                value.push_str(text);
            }
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| {
            Error::ParseError(format!("malformed field at line {}: {}", lineno + 1, line))
        })?;
        current
            .fields
            .push((key.trim().to_string(), value.trim().to_string()));
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

/// Read and parse an index file; invalid UTF-8 is replaced, not rejected
pub fn read_paragraphs(path: &Path) -> Result<Vec<Paragraph>> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_paragraphs(&String::from_utf8_lossy(&bytes))
}

/// How a file participates in a source package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFileType {
    Dsc,
    Tar,
    /// `.diff.gz` or `.debian.tar.*` overlay
    Diff,
}

impl SourceFileType {
    pub fn classify(name: &str) -> Self {
        if name.ends_with(".dsc") {
            Self::Dsc
        } else if name.ends_with(".diff.gz") || name.contains(".debian.tar.") {
            Self::Diff
        } else {
            Self::Tar
        }
    }
}

/// A constituent file listed in a `Sources` stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub md5: String,
    pub sha256: Option<String>,
    pub file_type: SourceFileType,
}

/// The fields of a `Sources` stanza the tracker uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub package: String,
    pub version: String,
    pub format: String,
    pub directory: String,
    pub maintainer: Option<String>,
    pub standards_version: Option<String>,
    pub priority: Option<String>,
    pub section: Option<String>,
    pub files: Vec<SourceFile>,
}

impl SourceRecord {
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let package = paragraph.require("Package")?.to_string();
        let version = paragraph.require("Version")?.to_string();

        let mut files: Vec<SourceFile> = Vec::new();
        let listed = paragraph.get("Files").unwrap_or("");
        for (md5, size, name) in checksum_lines(listed, HashAlgorithm::Md5)? {
            files.push(SourceFile {
                file_type: SourceFileType::classify(&name),
                name,
                size,
                md5,
                sha256: None,
            });
        }
        let listed = paragraph.get("Checksums-Sha256").unwrap_or("");
        for (sha256, _, name) in checksum_lines(listed, HashAlgorithm::Sha256)? {
            if let Some(file) = files.iter_mut().find(|f| f.name == name) {
                file.sha256 = Some(sha256);
            }
        }

        Ok(Self {
            package,
            version,
            // dpkg treats a missing Format as 1.0
            format: paragraph.get("Format").unwrap_or("1.0").to_string(),
            directory: paragraph.get("Directory").unwrap_or("").to_string(),
            maintainer: paragraph.get("Maintainer").map(str::to_string),
            standards_version: paragraph.get("Standards-Version").map(str::to_string),
            priority: paragraph.get("Priority").map(str::to_string),
            section: paragraph.get("Section").map(str::to_string),
            files,
        })
    }

    pub fn dsc_file_name(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.file_type == SourceFileType::Dsc)
            .map(|f| f.name.as_str())
    }
}

/// Longest short description kept from a `Packages` stanza
const SHORT_DESCRIPTION_LEN: usize = 300;

/// The fields of a `Packages` stanza the tracker uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRecord {
    pub package: String,
    pub version: String,
    pub architecture: String,
    /// Source package the binary was built from
    pub source: String,
    pub source_version: String,
    pub priority: Option<String>,
    pub section: Option<String>,
    pub short_description: Option<String>,
}

impl BinaryRecord {
    /// A missing `Source` means the source has the binary's name and
    /// version; `Source: name (version)` covers binNMUs.
    pub fn from_paragraph(paragraph: &Paragraph) -> Result<Self> {
        let package = paragraph.require("Package")?.to_string();
        let version = paragraph.require("Version")?.to_string();
        let architecture = paragraph.require("Architecture")?.to_string();

        let (source, source_version) = match paragraph.get("Source") {
            None => (package.clone(), version.clone()),
            Some(field) => match field.split_once('(') {
                Some((name, rest)) => (
                    name.trim().to_string(),
                    rest.trim().trim_end_matches(')').trim().to_string(),
                ),
                None => (field.trim().to_string(), version.clone()),
            },
        };

        let short_description = paragraph
            .get("Description")
            .and_then(|d| d.lines().next())
            .map(|line| line.chars().take(SHORT_DESCRIPTION_LEN).collect());

        Ok(Self {
            package,
            version,
            architecture,
            source,
            source_version,
            priority: paragraph.get("Priority").map(str::to_string),
            section: paragraph.get("Section").map(str::to_string),
            short_description,
        })
    }
}

/// Parse the `<digest> <size> <name>` lines of a checksum field
///
/// Names are joined onto cache directories, so anything but a plain file
/// name (no separator, not `.` or `..`) is rejected.
fn checksum_lines(field: &str, algorithm: HashAlgorithm) -> Result<Vec<(String, u64, String)>> {
    let mut out = Vec::new();
    for line in field.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [digest, size, name] = parts[..] else {
            return Err(Error::ParseError(format!("malformed checksum line: {}", line)));
        };
        if digest.len() != algorithm.hex_len() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::ParseError(format!("invalid {} digest in: {}", algorithm, line)));
        }
        let size = size
            .parse::<u64>()
            .map_err(|_| Error::ParseError(format!("invalid size in: {}", line)))?;
        if Path::new(name).file_name() != Some(OsStr::new(name)) {
            return Err(Error::ParseError(format!("file name is not a plain name: {}", name)));
        }
        out.push((digest.to_lowercase(), size, name.to_string()));
    }
    Ok(out)
}

/// Package name to versions found in an index (`Sources` or `Packages`)
pub fn package_versions(path: &Path) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for paragraph in read_paragraphs(path)? {
        let name = paragraph.require("Package")?;
        let version = paragraph.require("Version")?;
        out.push((name.to_string(), version.to_string()));
    }
    Ok(out)
}
