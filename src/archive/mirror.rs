// src/archive/mirror.rs
//! Generated mirror configuration and index targets
//!
//! The cache keeps an apt-shaped tree so the files stay familiar to anyone
//! who has looked inside `/var/lib/apt`:
//!
//! ```text
//! <root>/etc/sources.list
//! <root>/etc/apt.conf
//! <root>/var/lib/apt/lists/<escaped uri>_dists_<suite>_<component>_source_Sources
//! <root>/var/lib/apt/lists/<escaped uri>_dists_<suite>_<component>_binary-<arch>_Packages
//! <root>/packages/<hash>/<name>/
//! ```
//!
//! Both configuration files are regenerated from the database before every
//! network operation and read back to decide which index files to fetch.

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Path layout of one cache root
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    root: PathBuf,
}

impl MirrorLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn sources_list_path(&self) -> PathBuf {
        self.etc_dir().join("sources.list")
    }

    pub fn apt_conf_path(&self) -> PathBuf {
        self.etc_dir().join("apt.conf")
    }

    pub fn lists_dir(&self) -> PathBuf {
        self.root.join("var/lib/apt/lists")
    }

    /// Root of downloaded and extracted source packages
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }
}

/// Line type of a sources.list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Deb,
    DebSrc,
}

/// One parsed sources.list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesListEntry {
    pub kind: EntryKind,
    pub architectures: Vec<String>,
    pub uri: String,
    pub suite: String,
    pub components: Vec<String>,
}

impl SourcesListEntry {
    /// Parse a one-line-style entry; blank lines and comments yield `None`
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (kind, mut rest) = if let Some(rest) = line.strip_prefix("deb-src ") {
            (EntryKind::DebSrc, rest.trim_start())
        } else if let Some(rest) = line.strip_prefix("deb ") {
            (EntryKind::Deb, rest.trim_start())
        } else {
            return Err(Error::ParseError(format!("unknown sources.list entry: {}", line)));
        };

        let mut architectures = Vec::new();
        if let Some(options) = rest.strip_prefix('[') {
            let end = options
                .find(']')
                .ok_or_else(|| Error::ParseError(format!("unterminated options in: {}", line)))?;
            for option in options[..end].split_whitespace() {
                if let Some(archs) = option.strip_prefix("arch=") {
                    architectures = archs
                        .split(',')
                        .filter(|a| !a.is_empty())
                        .map(str::to_string)
                        .collect();
                }
            }
            rest = options[end + 1..].trim_start();
        }

        let mut fields = rest.split_whitespace();
        let (Some(uri), Some(suite)) = (fields.next(), fields.next()) else {
            return Err(Error::ParseError(format!("incomplete sources.list entry: {}", line)));
        };
        let components: Vec<String> = fields.map(str::to_string).collect();
        if components.is_empty() {
            return Err(Error::ParseError(format!("entry without components: {}", line)));
        }

        Ok(Some(Self {
            kind,
            architectures,
            uri: uri.to_string(),
            suite: suite.to_string(),
            components,
        }))
    }

    /// Index files this entry asks for
    ///
    /// `fallback_architectures` applies to `deb` lines without `arch=`.
    pub fn index_targets(&self, fallback_architectures: &[String]) -> Vec<IndexTarget> {
        let mut targets = Vec::new();
        for component in &self.components {
            match self.kind {
                EntryKind::DebSrc => targets.push(IndexTarget {
                    uri: self.uri.clone(),
                    suite: self.suite.clone(),
                    component: component.clone(),
                    kind: IndexKind::Sources,
                }),
                EntryKind::Deb => {
                    let archs = if self.architectures.is_empty() {
                        fallback_architectures
                    } else {
                        &self.architectures
                    };
                    for arch in archs {
                        targets.push(IndexTarget {
                            uri: self.uri.clone(),
                            suite: self.suite.clone(),
                            component: component.clone(),
                            kind: IndexKind::Packages(arch.clone()),
                        });
                    }
                }
            }
        }
        targets
    }
}

/// Parse a whole sources.list
pub fn parse_sources_list(content: &str) -> Result<Vec<SourcesListEntry>> {
    let mut entries = Vec::new();
    for line in content.lines() {
        if let Some(entry) = SourcesListEntry::parse_line(line)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Which index a target refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    Sources,
    Packages(String),
}

/// One index file of one component of one suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub uri: String,
    pub suite: String,
    pub component: String,
    pub kind: IndexKind,
}

impl IndexTarget {
    /// Path of the index relative to the repository URI
    fn meta_key(&self) -> String {
        match &self.kind {
            IndexKind::Sources => format!("dists/{}/{}/source/Sources", self.suite, self.component),
            IndexKind::Packages(arch) => format!(
                "dists/{}/{}/binary-{}/Packages",
                self.suite, self.component, arch
            ),
        }
    }

    /// Uncompressed index URL; the fetch appends `.xz` or `.gz`
    pub fn url(&self) -> String {
        format!("{}/{}", self.uri.trim_end_matches('/'), self.meta_key())
    }

    /// Name of the decompressed copy under the lists directory
    pub fn list_file_name(&self) -> String {
        uri_to_file_name(&format!("{}/{}", self.uri.trim_end_matches('/'), self.meta_key()))
    }

    /// `<uri>/<suite>/<component>`, comparable with `Repository::component_urls`
    pub fn component_url(&self) -> String {
        format!("{}/{}/{}", self.uri.trim_end_matches('/'), self.suite, self.component)
    }

    pub fn is_sources(&self) -> bool {
        self.kind == IndexKind::Sources
    }
}

impl std::fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IndexKind::Sources => write!(f, "{} {}/{} Sources", self.uri, self.suite, self.component),
            IndexKind::Packages(arch) => write!(
                f,
                "{} {}/{} {} Packages",
                self.uri, self.suite, self.component, arch
            ),
        }
    }
}

/// Escape a URI into a flat file name the way apt names its lists
///
/// The scheme is dropped, reserved characters become `%xx` and `/` becomes
/// `_` (a literal `_` is escaped first so the mapping stays unambiguous).
pub fn uri_to_file_name(uri: &str) -> String {
    const RESERVED: &[u8] = b"\\|{}[]<>\"^~_=!@#$%&*";

    let without_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let mut out = String::with_capacity(without_scheme.len());
    for &b in without_scheme.as_bytes() {
        if b == b'/' {
            out.push('_');
        } else if RESERVED.contains(&b) || !b.is_ascii_graphic() {
            let _ = write!(out, "%{:02x}", b);
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Render the tool configuration
pub fn render_apt_conf(
    layout: &MirrorLayout,
    architectures: &[String],
    trusted_keyring: Option<&Path>,
) -> String {
    let mut conf = String::from("APT::Architectures { ");
    for arch in architectures {
        let _ = write!(conf, "\"{}\"; ", arch);
    }
    conf.push_str("};\n");
    let _ = writeln!(conf, "Dir \"{}/\";", layout.root().display());
    conf.push_str("Dir::State \"state/\";\n");
    conf.push_str("Dir::State::status \"dpkg-status\";\n");
    conf.push_str("Dir::Etc \"etc/\";\n");
    let _ = writeln!(
        conf,
        "Dir::Etc::sourcelist \"{}\";",
        layout.sources_list_path().display()
    );
    if let Some(keyring) = trusted_keyring {
        let _ = writeln!(conf, "Dir::Etc::Trusted \"{}\";", keyring.display());
    }
    conf
}

/// Read the architecture list back out of a rendered tool configuration
pub fn parse_apt_conf_architectures(content: &str) -> Vec<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("APT::Architectures"))
        .map(|rest| {
            rest.split('"')
                .skip(1)
                .step_by(2)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
