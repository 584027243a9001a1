//! On-disk cache of merged version lists.
//!
//! One JSON file holds the last merged list of every (platform, branch)
//! pair. A file written by another library version is discarded on load.

use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Platform, VersionEntry};
use crate::VERSION;

/// Cached list for one platform and branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBranch {
    pub os: String,
    pub arch: String,
    pub branch: String,
    pub fetched_at_utc: DateTime<Utc>,
    /// Source that supplied the highest-priority non-empty list.
    pub primary_source: String,
    /// Whether that source was a mirror rather than the vendor.
    pub from_mirror: bool,
    pub versions: Vec<VersionEntry>,
}

impl CachedBranch {
    fn matches(&self, platform: &Platform, branch: &str) -> bool {
        self.os == platform.os && self.arch == platform.arch && self.branch == branch
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.fetched_at_utc)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    library_version: String,
    #[serde(default)]
    branches: Vec<CachedBranch>,
}

/// Version list cache shared by the aggregator's calls.
pub struct VersionCache {
    path: Option<PathBuf>,
    ttl: Duration,
    document: Mutex<CacheDocument>,
}

impl VersionCache {
    /// Memory-only cache.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            ttl,
            document: Mutex::new(CacheDocument::default()),
        }
    }

    /// Cache backed by `path`. Unreadable or foreign files start empty.
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let document = match read_document(&path) {
            Ok(doc) if doc.library_version == VERSION => doc,
            Ok(doc) => {
                debug!(found = %doc.library_version, "Discarding version cache from another release");
                CacheDocument::default()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => CacheDocument::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable version cache");
                CacheDocument::default()
            }
        };

        Self {
            path: Some(path),
            ttl,
            document: Mutex::new(document),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached list, only while younger than the TTL.
    pub fn fresh(&self, platform: &Platform, branch: &str) -> Option<CachedBranch> {
        self.any(platform, branch).filter(|entry| entry.is_fresh(self.ttl))
    }

    /// The cached list regardless of age.
    pub fn any(&self, platform: &Platform, branch: &str) -> Option<CachedBranch> {
        self.document
            .lock()
            .branches
            .iter()
            .find(|entry| entry.matches(platform, branch))
            .cloned()
    }

    /// Replace the list for the entry's platform and branch and persist.
    pub async fn store(&self, entry: CachedBranch) {
        let snapshot = {
            let mut document = self.document.lock();
            document.library_version = VERSION.to_string();
            document
                .branches
                .retain(|e| !(e.os == entry.os && e.arch == entry.arch && e.branch == entry.branch));
            document.branches.push(entry);
            document.clone()
        };

        let Some(path) = self.path.clone() else {
            return;
        };
        let written = tokio::task::spawn_blocking(move || write_document(&path, &snapshot)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write version cache"),
            Err(e) => warn!(error = %e, "Version cache writer panicked"),
        }
    }
}

fn read_document(path: &Path) -> io::Result<CacheDocument> {
    let file = std::fs::File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_document(path: &Path, document: &CacheDocument) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let file = std::fs::File::create(&temp_path)?;
    serde_json::to_writer(BufWriter::new(file), document).map_err(io::Error::other)?;
    std::fs::rename(&temp_path, path)
}
