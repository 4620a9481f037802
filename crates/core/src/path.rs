//! Lease path types and parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized lease path: `<repository>/<optional/sub/path>`.
///
/// The leading segment names a repository; the remainder is a
/// POSIX-style relative path. Normalization collapses duplicate
/// slashes and strips a trailing slash; `.` and `..` segments are
/// rejected outright.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeasePath(String);

impl LeasePath {
    /// Parse and normalize a lease path string.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidLeasePath(
                "lease path cannot be empty".to_string(),
            ));
        }

        if !trimmed.is_ascii() {
            return Err(crate::Error::InvalidLeasePath(
                "lease path contains non-ASCII characters".to_string(),
            ));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            // Collapsed duplicate slashes show up as empty segments.
            if segment.is_empty() {
                continue;
            }
            if segment == "." || segment == ".." {
                return Err(crate::Error::InvalidLeasePath(format!(
                    "relative segment not allowed: {segment}"
                )));
            }
            for c in segment.chars() {
                if !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '+' | '@') {
                    return Err(crate::Error::InvalidLeasePath(format!(
                        "invalid character in lease path: {c}"
                    )));
                }
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(crate::Error::InvalidLeasePath(
                "lease path cannot be empty".to_string(),
            ));
        }

        Ok(Self(segments.join("/")))
    }

    /// The repository name (leading segment).
    pub fn repository(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// The sub-path below the repository, empty for a whole-repository lease.
    pub fn subpath(&self) -> &str {
        match self.0.split_once('/') {
            Some((_, rest)) => rest,
            None => "",
        }
    }

    /// Get the full normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two lease paths overlap.
    ///
    /// Paths overlap iff they are equal or one is a prefix of the
    /// other at a path-segment boundary: `repo/a` overlaps `repo/a/b`
    /// but not `repo/ab`.
    pub fn overlaps(&self, other: &LeasePath) -> bool {
        self.is_under(other.as_str()) || other.is_under(self.as_str())
    }

    /// Whether this path is equal to `prefix` or sits below it.
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_matches('/');
        match self.0.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

impl fmt::Debug for LeasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeasePath({})", self.0)
    }
}

impl fmt::Display for LeasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(LeasePath::parse("repo/a/b").unwrap().as_str(), "repo/a/b");
        assert_eq!(LeasePath::parse("repo//a///b").unwrap().as_str(), "repo/a/b");
        assert_eq!(LeasePath::parse("repo/a/b/").unwrap().as_str(), "repo/a/b");
        assert_eq!(LeasePath::parse("/repo").unwrap().as_str(), "repo");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(LeasePath::parse("").is_err());
        assert!(LeasePath::parse("/").is_err());
        assert!(LeasePath::parse("repo/./a").is_err());
        assert!(LeasePath::parse("repo/../other").is_err());
        assert!(LeasePath::parse("repo/a b").is_err());
        assert!(LeasePath::parse("repo/\u{e9}t\u{e9}").is_err());
    }

    #[test]
    fn test_repository_and_subpath() {
        let path = LeasePath::parse("repo/a/b").unwrap();
        assert_eq!(path.repository(), "repo");
        assert_eq!(path.subpath(), "a/b");

        let bare = LeasePath::parse("repo").unwrap();
        assert_eq!(bare.repository(), "repo");
        assert_eq!(bare.subpath(), "");
    }

    #[test]
    fn test_overlap_segment_boundaries() {
        let a = LeasePath::parse("repo/foo").unwrap();
        let b = LeasePath::parse("repo/foo/bar").unwrap();
        let c = LeasePath::parse("repo/foobar").unwrap();
        let d = LeasePath::parse("other/foo").unwrap();

        assert!(a.overlaps(&a));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_whole_repo_overlaps_everything_inside() {
        let repo = LeasePath::parse("repo").unwrap();
        let sub = LeasePath::parse("repo/deep/path").unwrap();
        assert!(repo.overlaps(&sub));
        assert!(sub.overlaps(&repo));
    }

    #[test]
    fn test_is_under() {
        let path = LeasePath::parse("repo/a/b").unwrap();
        assert!(path.is_under("repo"));
        assert!(path.is_under("repo/a"));
        assert!(path.is_under("repo/a/b"));
        assert!(!path.is_under("repo/a/b/c"));
        assert!(!path.is_under("rep"));
    }
}
