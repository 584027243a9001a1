//! Version entries and patch steps.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of source an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// The authenticated vendor API.
    Official,
    /// A third-party mirror.
    Mirror,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Official => write!(f, "official"),
            SourceType::Mirror => write!(f, "mirror"),
        }
    }
}

/// One downloadable build.
///
/// `from_version == 0` marks a self-contained full build. Any other value
/// marks an incremental artifact that requires exactly that version to be
/// installed already.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: u32,
    #[serde(default)]
    pub from_version: u32,
    pub artifact_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
}

impl VersionEntry {
    /// A full build of `version`.
    pub fn full(version: u32, artifact_url: impl Into<String>) -> Self {
        Self {
            version,
            from_version: 0,
            artifact_url: artifact_url.into(),
            head_url: None,
            signature_url: None,
        }
    }

    /// An incremental artifact from `from` to `to`.
    pub fn diff(from: u32, to: u32, artifact_url: impl Into<String>) -> Self {
        Self {
            version: to,
            from_version: from,
            artifact_url: artifact_url.into(),
            head_url: None,
            signature_url: None,
        }
    }

    pub fn with_signature(mut self, url: Option<String>) -> Self {
        self.signature_url = url;
        self
    }

    /// True when this entry needs no prior install.
    pub fn is_full_build(&self) -> bool {
        self.from_version == 0
    }
}

/// A directed edge in a branch's patch graph.
///
/// Field names follow the vendor wire format; the descriptive names are
/// accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchStep {
    pub from: u32,
    pub to: u32,
    #[serde(rename = "pwr", alias = "artifactUrl", alias = "url")]
    pub artifact_url: String,
    #[serde(
        rename = "pwrHead",
        alias = "headUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub head_url: Option<String>,
    #[serde(
        rename = "sig",
        alias = "signatureUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_url: Option<String>,
}

impl PatchStep {
    pub fn new(from: u32, to: u32, artifact_url: impl Into<String>) -> Self {
        Self {
            from,
            to,
            artifact_url: artifact_url.into(),
            head_url: None,
            signature_url: None,
        }
    }

    /// The version entry this step delivers.
    pub fn to_entry(&self) -> VersionEntry {
        VersionEntry {
            version: self.to,
            from_version: self.from,
            artifact_url: self.artifact_url.clone(),
            head_url: self.head_url.clone(),
            signature_url: self.signature_url.clone(),
        }
    }
}

impl From<&VersionEntry> for PatchStep {
    fn from(entry: &VersionEntry) -> Self {
        Self {
            from: entry.from_version,
            to: entry.version,
            artifact_url: entry.artifact_url.clone(),
            head_url: entry.head_url.clone(),
            signature_url: entry.signature_url.clone(),
        }
    }
}

/// Sort entries newest first; full builds ahead of diffs for the same version.
pub fn sort_descending(entries: &mut [VersionEntry]) {
    entries.sort_by(|a, b| match b.version.cmp(&a.version) {
        Ordering::Equal => a.from_version.cmp(&b.from_version),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_diff_constructors() {
        let full = VersionEntry::full(5, "https://x/5");
        assert!(full.is_full_build());
        assert_eq!(full.from_version, 0);

        let diff = VersionEntry::diff(4, 5, "https://x/4-5");
        assert!(!diff.is_full_build());
        assert_eq!(diff.version, 5);
        assert_eq!(diff.from_version, 4);
    }

    #[test]
    fn test_sort_descending_orders_versions_then_full_first() {
        let mut entries = vec![
            VersionEntry::full(3, "a"),
            VersionEntry::diff(4, 5, "b"),
            VersionEntry::full(5, "c"),
            VersionEntry::full(1, "d"),
        ];
        sort_descending(&mut entries);

        let order: Vec<(u32, u32)> = entries.iter().map(|e| (e.version, e.from_version)).collect();
        assert_eq!(order, vec![(5, 0), (5, 4), (3, 0), (1, 0)]);
    }

    #[test]
    fn test_patch_step_wire_names() {
        let json = r#"{"from":2,"to":3,"pwr":"https://x/2-3","pwrHead":"https://x/h","sig":"https://x/s"}"#;
        let step: PatchStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.from, 2);
        assert_eq!(step.to, 3);
        assert_eq!(step.artifact_url, "https://x/2-3");
        assert_eq!(step.head_url.as_deref(), Some("https://x/h"));
        assert_eq!(step.signature_url.as_deref(), Some("https://x/s"));
    }

    #[test]
    fn test_patch_step_accepts_descriptive_aliases() {
        let json = r#"{"from":0,"to":7,"artifactUrl":"https://x/7"}"#;
        let step: PatchStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.artifact_url, "https://x/7");
        assert!(step.head_url.is_none());
    }

    #[test]
    fn test_step_entry_conversion() {
        let step = PatchStep::new(3, 4, "https://x/3-4");
        let entry = step.to_entry();
        assert_eq!(entry.version, 4);
        assert_eq!(entry.from_version, 3);
        assert_eq!(PatchStep::from(&entry), step);
    }
}
