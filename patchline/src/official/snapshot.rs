//! Offline snapshot of the vendor's incremental patch chains.
//!
//! The file keeps the most recent fromBuild=1 chain of every branch for one
//! platform. Writes go to a temporary file that is then renamed over the
//! old one.

use std::collections::BTreeMap;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PatchStep, Platform};

/// Snapshot file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSnapshot {
    pub fetched_at_utc: DateTime<Utc>,
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub patches: BTreeMap<String, Vec<PatchStep>>,
}

impl PatchSnapshot {
    pub fn new(platform: &Platform) -> Self {
        Self {
            fetched_at_utc: Utc::now(),
            os: platform.os.clone(),
            arch: platform.arch.clone(),
            patches: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse patch snapshot: {}", e),
            )
        })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let file = std::fs::File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| io::Error::other(format!("Failed to write patch snapshot: {}", e)))?;

        std::fs::rename(&temp_path, path)
    }
}

/// Replace one branch's chain in the snapshot at `path`.
///
/// A missing, unreadable, or other-platform snapshot is started afresh.
pub fn record_chain(
    path: &Path,
    platform: &Platform,
    branch: &str,
    steps: Vec<PatchStep>,
) -> io::Result<()> {
    let mut snapshot = match PatchSnapshot::load(path) {
        Ok(existing) if existing.os == platform.os && existing.arch == platform.arch => existing,
        _ => PatchSnapshot::new(platform),
    };
    snapshot.fetched_at_utc = Utc::now();
    snapshot.patches.insert(branch.to_string(), steps);
    snapshot.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_keeps_other_branches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patches.json");
        let linux = Platform::new("linux", "amd64");

        record_chain(&path, &linux, "release", vec![PatchStep::new(1, 2, "a")]).unwrap();
        record_chain(&path, &linux, "pre-release", vec![PatchStep::new(2, 3, "b")]).unwrap();
        record_chain(&path, &linux, "release", vec![PatchStep::new(2, 3, "c")]).unwrap();

        let snapshot = PatchSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.patches.len(), 2);
        assert_eq!(snapshot.patches["release"], vec![PatchStep::new(2, 3, "c")]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_platform_change_resets_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patches.json");

        record_chain(&path, &Platform::new("linux", "amd64"), "release", vec![]).unwrap();
        record_chain(&path, &Platform::new("windows", "amd64"), "beta", vec![]).unwrap();

        let snapshot = PatchSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.os, "windows");
        assert_eq!(snapshot.patches.keys().collect::<Vec<_>>(), vec!["beta"]);
    }

    #[test]
    fn test_wire_field_names() {
        let mut snapshot = PatchSnapshot::new(&Platform::new("linux", "amd64"));
        snapshot
            .patches
            .insert("release".to_string(), vec![PatchStep::new(1, 2, "https://x")]);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"fetchedAtUtc\""));
        assert!(json.contains("\"pwr\":\"https://x\""));
    }
}
