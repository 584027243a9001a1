//! The multi-source aggregator.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_VERSION_TTL_MINUTES;
use crate::model::{sort_descending, PatchStep, Platform, SourceType, SpeedTestResult, VersionEntry};
use crate::source::VersionSource;

use super::error::{Artifact, ResolveError, ResolveResult};
use super::version_cache::{CachedBranch, VersionCache};

/// Merge per-source lists, highest priority first.
///
/// The first source to offer a given (version, from) pair wins. Diff
/// entries are only taken from sources that serve the branch through
/// diffs, so a branch nobody diffs never lists a version twice.
pub fn merge_versions<I>(lists: I) -> Vec<VersionEntry>
where
    I: IntoIterator<Item = (bool, Vec<VersionEntry>)>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for (diff_based, entries) in lists {
        for entry in entries {
            if !entry.is_full_build() && !diff_based {
                continue;
            }
            if seen.insert((entry.version, entry.from_version)) {
                merged.push(entry);
            }
        }
    }

    sort_descending(&mut merged);
    merged
}

/// Versions to install, in order, to get from `from` to `to` along `chain`.
///
/// Returns `None` when the chain does not connect the two.
pub fn walk_chain(chain: &[PatchStep], from: u32, to: u32) -> Option<Vec<u32>> {
    let mut current = from;
    let mut path = Vec::new();

    while current != to {
        let step = chain.iter().find(|s| s.from == current && s.to > current)?;
        if step.to > to {
            return None;
        }
        path.push(step.to);
        current = step.to;
    }

    Some(path)
}

/// Holds every source in priority order and answers on their behalf.
pub struct SourceAggregator {
    platform: Platform,
    sources: Vec<Arc<dyn VersionSource>>,
    cache: VersionCache,
    official_down: RwLock<HashMap<String, bool>>,
    background: CancellationToken,
}

impl SourceAggregator {
    /// An aggregator for `platform` with a memory-only version cache.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            sources: Vec::new(),
            cache: VersionCache::in_memory(Duration::from_secs(DEFAULT_VERSION_TTL_MINUTES * 60)),
            official_down: RwLock::new(HashMap::new()),
            background: CancellationToken::new(),
        }
    }

    /// Persist merged version lists to `path`, fresh for `ttl`.
    pub fn with_version_cache(mut self, path: PathBuf, ttl: Duration) -> Self {
        self.cache = VersionCache::open(path, ttl);
        self
    }

    /// Add a source, keeping the list ordered by priority. Equal priorities
    /// keep insertion order.
    pub fn with_source(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.priority());
        self
    }

    pub fn with_sources<I>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn VersionSource>>,
    {
        sources.into_iter().fold(self, |agg, source| agg.with_source(source))
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn sources(&self) -> &[Arc<dyn VersionSource>] {
        &self.sources
    }

    fn available(&self) -> impl Iterator<Item = &Arc<dyn VersionSource>> {
        self.sources.iter().filter(|s| s.is_available())
    }

    /// Merged version list for a branch, newest first.
    ///
    /// A fresh disk-cached list is served without touching any source
    /// unless `refresh` is set. When every source comes back empty, the
    /// last cached list is served even if stale.
    pub async fn get_versions(
        &self,
        branch: &str,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Vec<VersionEntry> {
        if !refresh {
            if let Some(cached) = self.cache.fresh(&self.platform, branch) {
                debug!(branch = %branch, count = cached.versions.len(), "Serving cached versions");
                return cached.versions;
            }
        }

        let sources: Vec<&Arc<dyn VersionSource>> = self.available().collect();
        let lists = join_all(
            sources
                .iter()
                .map(|source| source.get_versions(&self.platform, branch, cancel)),
        )
        .await;

        let primary = sources
            .iter()
            .zip(&lists)
            .find(|(_, list)| !list.is_empty())
            .map(|(source, _)| (source.source_id().to_string(), source.source_type()));

        let merged = merge_versions(
            sources
                .iter()
                .zip(lists)
                .map(|(source, list)| (source.is_diff_based_branch(branch), list)),
        );

        let Some((primary_source, primary_type)) = primary else {
            warn!(branch = %branch, "No source returned versions");
            return self
                .cache
                .any(&self.platform, branch)
                .map(|cached| cached.versions)
                .unwrap_or_default();
        };

        let from_mirror = primary_type == SourceType::Mirror;
        self.official_down.write().insert(branch.to_string(), from_mirror);
        if from_mirror {
            info!(branch = %branch, source = %primary_source, "Versions served by a mirror");
        }

        self.cache
            .store(CachedBranch {
                os: self.platform.os.clone(),
                arch: self.platform.arch.clone(),
                branch: branch.to_string(),
                fetched_at_utc: Utc::now(),
                primary_source,
                from_mirror,
                versions: merged.clone(),
            })
            .await;

        merged
    }

    /// True when the latest successful version fetch for `branch` was
    /// answered by a mirror rather than the vendor.
    pub fn is_official_down(&self, branch: &str) -> bool {
        if let Some(down) = self.official_down.read().get(branch).copied() {
            return down;
        }
        self.cache
            .any(&self.platform, branch)
            .map(|cached| cached.from_mirror)
            .unwrap_or(false)
    }

    /// Versions to install, in order, to move from `from` to `to`.
    ///
    /// The first diff-based source whose chain connects the two decides the
    /// path. Otherwise a known `to` is reached directly with a full build.
    pub async fn patch_sequence(
        &self,
        branch: &str,
        from: u32,
        to: u32,
        cancel: &CancellationToken,
    ) -> Vec<u32> {
        if to <= from {
            return Vec::new();
        }

        for source in self.available().filter(|s| s.is_diff_based_branch(branch)) {
            let chain = source.get_patch_chain(&self.platform, branch, cancel).await;
            if let Some(path) = walk_chain(&chain, from, to) {
                debug!(source = %source.source_id(), branch = %branch, steps = path.len(), "Patch path found");
                return path;
            }
        }

        let known = self
            .get_versions(branch, false, cancel)
            .await
            .iter()
            .any(|entry| entry.version == to && entry.is_full_build());
        if known {
            vec![to]
        } else {
            Vec::new()
        }
    }

    /// Download URL of a full build.
    pub async fn resolve_download_url(
        &self,
        branch: &str,
        version: u32,
        cancel: &CancellationToken,
    ) -> ResolveResult<String> {
        self.resolve(branch, Artifact::Full { version }, cancel).await
    }

    /// Download URL of the diff from `from` to `to`.
    pub async fn resolve_diff_url(
        &self,
        branch: &str,
        from: u32,
        to: u32,
        cancel: &CancellationToken,
    ) -> ResolveResult<String> {
        self.resolve(branch, Artifact::Diff { from, to }, cancel).await
    }

    /// Cached list, then each source in priority order, then a forced
    /// refresh. The refresh drops every source's own cache before the list
    /// is refetched and the sources are asked again. Only after all of that
    /// misses is it an error.
    async fn resolve(
        &self,
        branch: &str,
        artifact: Artifact,
        cancel: &CancellationToken,
    ) -> ResolveResult<String> {
        if let Some(url) = self
            .cache
            .fresh(&self.platform, branch)
            .and_then(|cached| find_url(&cached.versions, artifact))
        {
            return Ok(url);
        }

        if let Some(url) = self.ask_sources(branch, artifact, cancel).await? {
            return Ok(url);
        }

        info!(branch = %branch, artifact = %artifact, "Forcing version refresh to resolve URL");
        for source in self.available() {
            source.invalidate();
        }

        let refreshed = self.get_versions(branch, true, cancel).await;
        if let Some(url) = find_url(&refreshed, artifact) {
            return Ok(url);
        }
        if let Some(url) = self.ask_sources(branch, artifact, cancel).await? {
            return Ok(url);
        }

        Err(ResolveError::NoSourceAvailable {
            branch: branch.to_string(),
            artifact,
        })
    }

    /// First URL any available source offers, in priority order.
    async fn ask_sources(
        &self,
        branch: &str,
        artifact: Artifact,
        cancel: &CancellationToken,
    ) -> ResolveResult<Option<String>> {
        for source in self.available() {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled { artifact });
            }
            let url = match artifact {
                Artifact::Full { version } => {
                    source
                        .get_download_url(&self.platform, branch, version, cancel)
                        .await
                }
                Artifact::Diff { from, to } => {
                    if !source.is_diff_based_branch(branch) {
                        continue;
                    }
                    source
                        .get_diff_url(&self.platform, branch, from, to, cancel)
                        .await
                }
            };
            if let Some(url) = url {
                debug!(source = %source.source_id(), artifact = %artifact, "Resolved URL");
                return Ok(Some(url));
            }
        }

        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled { artifact });
        }
        Ok(None)
    }

    /// Speed test every available source concurrently.
    ///
    /// Reachable sources come first, fastest first; unreachable ones follow.
    pub async fn speed_test_all(&self, cancel: &CancellationToken) -> Vec<SpeedTestResult> {
        let mut results = join_all(self.available().map(|source| source.test_speed(cancel))).await;
        results.sort_by(|a, b| {
            b.is_available
                .cmp(&a.is_available)
                .then_with(|| b.speed_mbps.total_cmp(&a.speed_mbps))
                .then_with(|| a.ping_ms.cmp(&b.ping_ms))
        });
        results
    }

    /// Id of the fastest reachable source.
    pub async fn best_source(&self, cancel: &CancellationToken) -> Option<String> {
        self.speed_test_all(cancel)
            .await
            .into_iter()
            .find(|result| result.is_available)
            .map(|result| result.source_id)
    }

    /// Warm every available source for `branch` in the background.
    ///
    /// Returns immediately. Tasks stop when the aggregator is dropped.
    pub fn preload(&self, branch: &str) {
        for source in self.available() {
            let source = Arc::clone(source);
            let platform = self.platform.clone();
            let branch = branch.to_string();
            let cancel = self.background.child_token();
            tokio::spawn(async move {
                source.preload(&platform, &branch, &cancel).await;
            });
        }
    }
}

impl Drop for SourceAggregator {
    fn drop(&mut self) {
        self.background.cancel();
    }
}

fn find_url(entries: &[VersionEntry], artifact: Artifact) -> Option<String> {
    let (version, from_version) = match artifact {
        Artifact::Full { version } => (version, 0),
        Artifact::Diff { from, to } => (to, from),
    };
    entries
        .iter()
        .find(|e| e.version == version && e.from_version == from_version)
        .map(|e| e.artifact_url.clone())
}
