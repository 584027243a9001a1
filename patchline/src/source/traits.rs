//! The `VersionSource` trait.

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::model::{PatchStep, Platform, SourceType, SpeedTestResult, VersionEntry};

/// One origin of build artifacts.
///
/// Async methods return boxed futures so sources can be held as
/// `Arc<dyn VersionSource>` by the aggregator.
pub trait VersionSource: Send + Sync {
    /// Stable identifier (the descriptor id for mirrors).
    fn source_id(&self) -> &str;

    fn source_type(&self) -> SourceType;

    /// Cheap local check. Must not touch the network.
    fn is_available(&self) -> bool;

    /// Lower values are consulted first.
    fn priority(&self) -> i32;

    /// Whether this source serves `branch` through incremental diffs.
    fn is_diff_based_branch(&self, branch: &str) -> bool;

    /// Known versions for a branch, sorted descending by version.
    fn get_versions<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<VersionEntry>>;

    /// URL of the full build of `version`, if this source has one.
    fn get_download_url<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        version: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<String>>;

    /// URL of the diff from `from` to `to`, if this source has one.
    fn get_diff_url<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        from: u32,
        to: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<String>>;

    /// Linear patch chain for a branch, oldest step first.
    fn get_patch_chain<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<PatchStep>>;

    /// Drop every cached listing so the next call reaches the network.
    fn invalidate(&self);

    /// Best-effort cache warm-up. Failures are logged and swallowed.
    fn preload<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ()>;

    /// Measure latency and throughput. Never fails; an unreachable source
    /// yields an unavailable result.
    fn test_speed<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, SpeedTestResult>;

    /// The last speed test result while it is still fresh.
    fn cached_speed(&self) -> Option<SpeedTestResult>;
}
