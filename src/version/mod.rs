// src/version/mod.rs

//! Debian version handling
//!
//! Versions have the form `[epoch:]upstream_version[-debian_revision]` and
//! are ordered the way dpkg orders them: epochs numerically, then the
//! upstream version and the revision with the dpkg segment comparison,
//! where `~` sorts before anything (even the end of the string) and letters
//! sort before other symbols. Lexical string order is never used.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed Debian version
#[derive(Debug, Clone, Eq)]
pub struct DebianVersion {
    pub epoch: u64,
    pub upstream: String,
    pub revision: Option<String>,
}

impl DebianVersion {
    /// Parse a Debian version string
    ///
    /// Examples:
    /// - "1.2.3" → epoch=0, upstream="1.2.3", revision=None
    /// - "2:1.2.3" → epoch=2, upstream="1.2.3", revision=None
    /// - "1.2.3-4" → epoch=0, upstream="1.2.3", revision=Some("4")
    /// - "1:2.3-4-1" → epoch=1, upstream="2.3-4", revision=Some("1")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("empty version string".to_string()));
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) => {
                let epoch = e.parse::<u64>().map_err(|err| {
                    Error::ParseError(format!("invalid epoch in version '{}': {}", s, err))
                })?;
                (epoch, rest)
            }
            None => (0, s),
        };

        // The revision is everything after the last hyphen
        let (upstream, revision) = match rest.rfind('-') {
            Some(pos) => (&rest[..pos], Some(rest[pos + 1..].to_string())),
            None => (rest, None),
        };

        if upstream.is_empty() {
            return Err(Error::ParseError(format!(
                "empty upstream version in '{}'",
                s
            )));
        }

        if let Some(c) = upstream
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::ParseError(format!(
                "invalid character {:?} in version '{}'",
                c, s
            )));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision,
        })
    }

    /// Compare two versions with dpkg semantics
    pub fn compare(&self, other: &DebianVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| verrevcmp(self.upstream.as_bytes(), other.upstream.as_bytes()))
            .then_with(|| {
                verrevcmp(
                    self.revision.as_deref().unwrap_or("").as_bytes(),
                    other.revision.as_deref().unwrap_or("").as_bytes(),
                )
            })
    }
}

/// Compare two version strings, parsing both
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    let a = DebianVersion::parse(a)?;
    let b = DebianVersion::parse(b)?;
    Ok(a.compare(&b))
}

/// Sort weight of a single character in a non-digit segment
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(b'~') => -1,
        Some(c) => c as i32 + 256,
    }
}

/// The dpkg upstream/revision comparison
fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0usize, 0usize);
    let at = |s: &[u8], k: usize| s.get(k).copied();
    let is_digit = |c: Option<u8>| c.is_some_and(|c| c.is_ascii_digit());

    while i < a.len() || j < b.len() {
        // Non-digit prefix
        while (i < a.len() && !is_digit(at(a, i))) || (j < b.len() && !is_digit(at(b, j))) {
            let ac = order(at(a, i));
            let bc = order(at(b, j));
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        // Numeric segment, leading zeros ignored
        while at(a, i) == Some(b'0') {
            i += 1;
        }
        while at(b, j) == Some(b'0') {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while is_digit(at(a, i)) && is_digit(at(b, j)) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }

        if is_digit(at(a, i)) {
            return Ordering::Greater;
        }
        if is_digit(at(b, j)) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

impl fmt::Display for DebianVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if let Some(ref revision) = self.revision {
            write!(f, "-{}", revision)?;
        }
        Ok(())
    }
}

impl FromStr for DebianVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for DebianVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Ord for DebianVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for DebianVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> DebianVersion {
        DebianVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let ver = v("1.2.3");
        assert_eq!(ver.epoch, 0);
        assert_eq!(ver.upstream, "1.2.3");
        assert_eq!(ver.revision, None);
    }

    #[test]
    fn test_parse_full() {
        let ver = v("1:2.30-4-1");
        assert_eq!(ver.epoch, 1);
        assert_eq!(ver.upstream, "2.30-4");
        assert_eq!(ver.revision.as_deref(), Some("1"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(DebianVersion::parse("").is_err());
        assert!(DebianVersion::parse("a:1.0").is_err());
        assert!(DebianVersion::parse("1:-1").is_err());
        assert!(DebianVersion::parse("1.0 beta").is_err());
    }

    #[test]
    fn test_epoch_beats_upstream() {
        assert!(v("1:0.9") > v("2.0"));
    }

    #[test]
    fn test_numeric_segments_not_lexical() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.0"));
        assert!(v("1.001") == v("1.1"));
    }

    #[test]
    fn test_tilde_sorts_first() {
        assert!(v("1.0~rc1") < v("1.0"));
        assert!(v("1.0~rc1") < v("1.0~rc2"));
        assert!(v("1.0~~") < v("1.0~"));
    }

    #[test]
    fn test_letters_before_symbols() {
        assert!(v("1.0a") > v("1.0"));
        assert!(v("1.0+b1") > v("1.0a"));
    }

    #[test]
    fn test_revision_ordering() {
        assert!(v("1.0-1") < v("1.0-2"));
        assert!(v("1.0-1") > v("1.0"));
        assert!(v("1.0-10") > v("1.0-9"));
        assert!(v("1.0-1ubuntu1") > v("1.0-1"));
    }

    #[test]
    fn test_documented_chain() {
        let chain = ["1.0~rc1", "1.0", "1.0-1", "1.0a", "1:0.9"];
        for pair in chain.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_compare_versions_helper() {
        assert_eq!(compare_versions("1.0", "1.0").unwrap(), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "2.0").unwrap(), Ordering::Less);
        assert!(compare_versions("", "1").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(v("2:1.2.3-4").to_string(), "2:1.2.3-4");
        assert_eq!(v("0:1.2").to_string(), "1.2");
    }
}
