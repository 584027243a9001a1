//! Centralized artifact naming conventions.
//!
//! Pattern mirrors and json-index mirrors alike name artifacts as:
//! - full builds: `v{version}-{os}-{arch}.{ext}` (e.g. `v5-linux-amd64.pwr`)
//! - diffs: `v{from}~{to}-{os}-{arch}.{ext}` (e.g. `v2~5-windows-amd64.pwr`)
//!
//! All other modules should use these functions rather than constructing
//! or parsing names directly.

use regex::Regex;
use std::sync::OnceLock;

/// Extension used by the vendor for build artifacts.
pub const DEFAULT_EXTENSION: &str = "pwr";

/// A parsed artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactName {
    Full {
        version: u32,
        os: String,
        arch: String,
        extension: String,
    },
    Diff {
        from: u32,
        to: u32,
        os: String,
        arch: String,
        extension: String,
    },
}

/// Artifact filename regex.
///
/// We capture:
/// - Group 1: version, or the source version of a diff
/// - Group 2: target version of a diff (optional)
/// - Group 3: os token
/// - Group 4: arch token
/// - Group 5: extension
fn artifact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^v(\d+)(?:~(\d+))?-([A-Za-z0-9_]+)-([A-Za-z0-9_]+)\.([A-Za-z0-9.]+)$").unwrap()
    })
}

impl ArtifactName {
    /// Parse a filename. Returns `None` when it does not follow the convention.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchline::naming::ArtifactName;
    ///
    /// let name = ArtifactName::parse("v2~5-windows-amd64.pwr").unwrap();
    /// assert_eq!(name.from_version(), 2);
    /// assert_eq!(name.version(), 5);
    /// ```
    pub fn parse(filename: &str) -> Option<Self> {
        let captures = artifact_pattern().captures(filename)?;
        let first: u32 = captures.get(1)?.as_str().parse().ok()?;
        let os = captures.get(3)?.as_str().to_string();
        let arch = captures.get(4)?.as_str().to_string();
        let extension = captures.get(5)?.as_str().to_string();

        match captures.get(2) {
            Some(to) => Some(ArtifactName::Diff {
                from: first,
                to: to.as_str().parse().ok()?,
                os,
                arch,
                extension,
            }),
            None => Some(ArtifactName::Full {
                version: first,
                os,
                arch,
                extension,
            }),
        }
    }

    /// The version this artifact produces.
    pub fn version(&self) -> u32 {
        match self {
            ArtifactName::Full { version, .. } => *version,
            ArtifactName::Diff { to, .. } => *to,
        }
    }

    /// The version required before applying, 0 for full builds.
    pub fn from_version(&self) -> u32 {
        match self {
            ArtifactName::Full { .. } => 0,
            ArtifactName::Diff { from, .. } => *from,
        }
    }

    pub fn is_diff(&self) -> bool {
        matches!(self, ArtifactName::Diff { .. })
    }

    /// True when the name targets the given os/arch tokens.
    pub fn matches_platform(&self, want_os: &str, want_arch: &str) -> bool {
        let (os, arch) = match self {
            ArtifactName::Full { os, arch, .. } | ArtifactName::Diff { os, arch, .. } => (os, arch),
        };
        os.eq_ignore_ascii_case(want_os) && arch.eq_ignore_ascii_case(want_arch)
    }
}

/// Filename of a full build.
///
/// ```
/// use patchline::naming::full_build_filename;
///
/// assert_eq!(full_build_filename(5, "linux", "amd64", "pwr"), "v5-linux-amd64.pwr");
/// ```
pub fn full_build_filename(version: u32, os: &str, arch: &str, extension: &str) -> String {
    format!("v{}-{}-{}.{}", version, os, arch, extension)
}

/// Filename of a diff artifact.
///
/// ```
/// use patchline::naming::diff_filename;
///
/// assert_eq!(diff_filename(2, 5, "windows", "amd64", "pwr"), "v2~5-windows-amd64.pwr");
/// ```
pub fn diff_filename(from: u32, to: u32, os: &str, arch: &str, extension: &str) -> String {
    format!("v{}~{}-{}-{}.{}", from, to, os, arch, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_build() {
        let name = ArtifactName::parse("v3-linux-amd64.pwr").unwrap();
        assert_eq!(
            name,
            ArtifactName::Full {
                version: 3,
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                extension: "pwr".to_string(),
            }
        );
        assert_eq!(name.from_version(), 0);
        assert!(!name.is_diff());
    }

    #[test]
    fn test_parse_diff() {
        let name = ArtifactName::parse("v2~5-windows-amd64.pwr").unwrap();
        assert_eq!(name.from_version(), 2);
        assert_eq!(name.version(), 5);
        assert!(name.is_diff());
        assert!(name.matches_platform("windows", "amd64"));
        assert!(!name.matches_platform("linux", "amd64"));
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(ArtifactName::parse("readme.txt").is_none());
        assert!(ArtifactName::parse("5.pwr").is_none());
        assert!(ArtifactName::parse("vX-linux-amd64.pwr").is_none());
        assert!(ArtifactName::parse("v1-linux.pwr").is_none());
    }

    #[test]
    fn test_multi_part_extension() {
        let name = ArtifactName::parse("v9-darwin-arm64.tar.gz").unwrap();
        assert_eq!(name.version(), 9);
        assert!(name.matches_platform("darwin", "arm64"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_formatted_names_parse_back(
                from in 1u32..100_000,
                delta in 1u32..1000,
                os in "[a-z]{3,8}",
                arch in "(amd64|arm64|386)"
            ) {
                let to = from + delta;
                let full = ArtifactName::parse(&full_build_filename(to, &os, &arch, "pwr"));
                prop_assert_eq!(full.map(|n| (n.from_version(), n.version())), Some((0, to)));

                let diff = ArtifactName::parse(&diff_filename(from, to, &os, &arch, "pwr"));
                prop_assert_eq!(diff.map(|n| (n.from_version(), n.version())), Some((from, to)));
            }
        }
    }
}
