//! The descriptor-driven mirror source.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::descriptor::{MirrorDescriptor, MirrorProtocol};
use crate::http::{HttpClient, HttpRequest};
use crate::model::{
    sort_descending, BranchKey, PatchStep, Platform, SourceType, SpeedTestResult, VersionEntry,
};
use crate::source::{measure_speed, FetchCache, SpeedSlot, VersionSource};

use super::chain::{contiguous_chain, full_build_steps};
use super::{json_index, pattern};

/// Timeout for fetching a json-index document.
const INDEX_TIMEOUT: Duration = Duration::from_secs(20);

/// Branches probed, in order, for a representative speed test payload.
const SPEED_TEST_BRANCHES: [&str; 2] = ["pre-release", "release"];

/// What the mirror caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ListingKey {
    /// Discovered version numbers of a pattern mirror.
    Versions(BranchKey),
    /// The whole json-index document.
    Index,
}

#[derive(Debug, Clone)]
enum Listing {
    Versions(Arc<Vec<u32>>),
    Index(Arc<Value>),
}

/// A mirror whose behaviour is entirely defined by its descriptor.
pub struct MirrorSource {
    descriptor: MirrorDescriptor,
    http: Arc<dyn HttpClient>,
    cache: FetchCache<ListingKey, Listing>,
    speed: SpeedSlot,
    speed_platform: Platform,
}

impl MirrorSource {
    pub fn new(descriptor: MirrorDescriptor, http: Arc<dyn HttpClient>) -> Self {
        let cache = FetchCache::new(descriptor.index_ttl());
        let speed = SpeedSlot::new(descriptor.speed_test_ttl());
        Self {
            descriptor,
            http,
            cache,
            speed,
            speed_platform: Platform::host(),
        }
    }

    /// Platform used to pick the speed test payload.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.speed_platform = platform;
        self
    }

    pub fn descriptor(&self) -> &MirrorDescriptor {
        &self.descriptor
    }

    async fn known_versions(
        &self,
        platform: &Platform,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Option<Arc<Vec<u32>>> {
        let MirrorProtocol::Pattern(config) = &self.descriptor.protocol else {
            return None;
        };
        let key = ListingKey::Versions(BranchKey::new(platform, branch));
        let listing = self
            .cache
            .get_or_fetch(key, || async move {
                pattern::discover_versions(self.http.as_ref(), config, platform, branch, cancel)
                    .await
                    .map(|versions| Listing::Versions(Arc::new(versions)))
            })
            .await?;
        match listing {
            Listing::Versions(versions) => Some(versions),
            Listing::Index(_) => None,
        }
    }

    async fn index(&self, cancel: &CancellationToken) -> Option<Arc<Value>> {
        let MirrorProtocol::JsonIndex(config) = &self.descriptor.protocol else {
            return None;
        };
        let listing = self
            .cache
            .get_or_fetch(ListingKey::Index, || async move {
                let request = HttpRequest::get(&config.api_url).with_timeout(INDEX_TIMEOUT);
                match self.http.execute(request, cancel).await {
                    Ok(response) if response.is_success() => {
                        match response.json::<Value>(&config.api_url) {
                            Ok(document) => Some(Listing::Index(Arc::new(document))),
                            Err(e) => {
                                warn!(source = %self.descriptor.id, error = %e, "Index is not valid JSON");
                                None
                            }
                        }
                    }
                    Ok(response) => {
                        warn!(source = %self.descriptor.id, status = response.status, "Index request rejected");
                        None
                    }
                    Err(e) => {
                        warn!(source = %self.descriptor.id, error = %e, "Index request failed");
                        None
                    }
                }
            })
            .await?;
        match listing {
            Listing::Index(document) => Some(document),
            Listing::Versions(_) => None,
        }
    }

    async fn versions(
        &self,
        platform: &Platform,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Vec<VersionEntry> {
        let mut entries = match &self.descriptor.protocol {
            MirrorProtocol::Pattern(config) => {
                let Some(versions) = self.known_versions(platform, branch, cancel).await else {
                    return Vec::new();
                };
                versions
                    .iter()
                    .map(|&version| {
                        VersionEntry::full(
                            version,
                            pattern::full_build_url(config, platform, branch, version),
                        )
                        .with_signature(pattern::signature_url(config, platform, branch, version))
                    })
                    .collect()
            }
            MirrorProtocol::JsonIndex(config) => {
                let Some(index) = self.index(cancel).await else {
                    return Vec::new();
                };
                let include_diffs = self.descriptor.is_diff_based_branch(branch);
                json_index::entries(&index, config, platform, branch, include_diffs)
            }
        };

        sort_descending(&mut entries);
        entries.dedup_by(|a, b| a.version == b.version && a.from_version == b.from_version);
        entries
    }

    async fn download_url(
        &self,
        platform: &Platform,
        branch: &str,
        version: u32,
        cancel: &CancellationToken,
    ) -> Option<String> {
        match &self.descriptor.protocol {
            MirrorProtocol::Pattern(config) => {
                let versions = self.known_versions(platform, branch, cancel).await?;
                versions
                    .contains(&version)
                    .then(|| pattern::full_build_url(config, platform, branch, version))
            }
            MirrorProtocol::JsonIndex(config) => {
                let index = self.index(cancel).await?;
                json_index::full_build_url(&index, config, platform, branch, version)
            }
        }
    }

    async fn diff_url(
        &self,
        platform: &Platform,
        branch: &str,
        from: u32,
        to: u32,
        cancel: &CancellationToken,
    ) -> Option<String> {
        if from == 0 || from >= to || !self.descriptor.is_diff_based_branch(branch) {
            return None;
        }
        match &self.descriptor.protocol {
            MirrorProtocol::Pattern(config) => {
                let versions = self.known_versions(platform, branch, cancel).await?;
                if !(versions.contains(&from) && versions.contains(&to)) {
                    return None;
                }
                pattern::diff_url(config, platform, branch, from, to)
            }
            MirrorProtocol::JsonIndex(config) => {
                let index = self.index(cancel).await?;
                json_index::diff_url(&index, config, platform, branch, from, to)
            }
        }
    }

    async fn patch_chain(
        &self,
        platform: &Platform,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Vec<PatchStep> {
        let entries = self.versions(platform, branch, cancel).await;
        let Some(newest) = entries.first().map(|e| e.version) else {
            return Vec::new();
        };

        if self.descriptor.is_diff_based_branch(branch) {
            let mut known: Vec<u32> = entries
                .iter()
                .flat_map(|e| [e.from_version, e.version])
                .filter(|&v| v > 0)
                .collect();
            known.sort_unstable();
            known.dedup();

            let mut diffs = Vec::new();
            for pair in known.windows(2) {
                if let Some(url) = self.diff_url(platform, branch, pair[0], pair[1], cancel).await {
                    diffs.push(PatchStep::new(pair[0], pair[1], url));
                }
            }
            diffs.extend(
                entries
                    .iter()
                    .filter(|e| !e.is_full_build())
                    .map(PatchStep::from),
            );

            let chain = contiguous_chain(newest, &diffs);
            if !chain.is_empty() {
                return chain;
            }
            debug!(source = %self.descriptor.id, branch = %branch, "No diff chain, using full builds");
        }

        full_build_steps(entries.iter().map(PatchStep::from).collect())
    }

    async fn speed_test(&self, cancel: &CancellationToken) -> SpeedTestResult {
        let base = match &self.descriptor.protocol {
            MirrorProtocol::Pattern(config) => config.base_url.clone(),
            MirrorProtocol::JsonIndex(config) => config.api_url.clone(),
        };
        let ping_url = self.descriptor.speed_test.ping_url.clone().unwrap_or(base);
        let ping = HttpRequest::head(ping_url).with_timeout(Duration::from_secs(
            self.descriptor.speed_test.ping_timeout_seconds.max(1),
        ));

        let mut payload = None;
        for branch in SPEED_TEST_BRANCHES {
            let newest = self
                .versions(&self.speed_platform, branch, cancel)
                .await
                .into_iter()
                .find(|e| e.is_full_build());
            if let Some(entry) = newest {
                payload = Some(HttpRequest::get(entry.artifact_url));
                break;
            }
        }

        let result = measure_speed(
            self.http.as_ref(),
            &self.descriptor.id,
            ping,
            payload,
            cancel,
        )
        .await;
        self.speed.store(result)
    }
}

impl VersionSource for MirrorSource {
    fn source_id(&self) -> &str {
        &self.descriptor.id
    }

    fn source_type(&self) -> SourceType {
        SourceType::Mirror
    }

    fn is_available(&self) -> bool {
        self.descriptor.enabled
    }

    fn priority(&self) -> i32 {
        self.descriptor.priority
    }

    fn is_diff_based_branch(&self, branch: &str) -> bool {
        self.descriptor.is_diff_based_branch(branch)
    }

    fn get_versions<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<VersionEntry>> {
        Box::pin(self.versions(platform, branch, cancel))
    }

    fn get_download_url<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        version: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<String>> {
        Box::pin(self.download_url(platform, branch, version, cancel))
    }

    fn get_diff_url<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        from: u32,
        to: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<String>> {
        Box::pin(self.diff_url(platform, branch, from, to, cancel))
    }

    fn get_patch_chain<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Vec<PatchStep>> {
        Box::pin(self.patch_chain(platform, branch, cancel))
    }

    fn invalidate(&self) {
        debug!(source = %self.descriptor.id, "Invalidating mirror cache");
        self.cache.invalidate_all();
    }

    fn preload<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let count = self.versions(platform, branch, cancel).await.len();
            debug!(source = %self.descriptor.id, branch = %branch, count, "Preloaded mirror");
        })
    }

    fn test_speed<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, SpeedTestResult> {
        Box::pin(self.speed_test(cancel))
    }

    fn cached_speed(&self) -> Option<SpeedTestResult> {
        self.speed.fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::descriptor::{JsonIndexConfig, PatternConfig, VersionDiscovery};
    use crate::http::MockHttpClient;

    const API: &str = "https://idx.example/api.json";

    fn pattern_mirror(mock: Arc<MockHttpClient>, diff_based: bool) -> MirrorSource {
        let mut config = PatternConfig::new(
            "https://m.example",
            "{base}/dl/{os}/{arch}/{version}.pwr",
            VersionDiscovery::JsonApi {
                url: "{base}/versions.json".to_string(),
                json_path: "versions".to_string(),
            },
        );
        config.diff_url = Some("{base}/diff/{os}/{arch}/{from}~{to}.pwr".to_string());
        if diff_based {
            config.diff_based_branches = vec!["release".to_string()];
        }
        MirrorSource::new(
            MirrorDescriptor::new("m", "M", MirrorProtocol::Pattern(config)),
            mock,
        )
    }

    fn index_mirror(mock: Arc<MockHttpClient>) -> MirrorSource {
        let mut config = JsonIndexConfig::new(API, "builds");
        config.diff_based_branches = vec!["pre-release".to_string()];
        MirrorSource::new(
            MirrorDescriptor::new("idx", "Index", MirrorProtocol::JsonIndex(config)),
            mock,
        )
        .with_platform(Platform::new("linux", "amd64"))
    }

    fn linux() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[tokio::test]
    async fn test_pattern_versions_descending_and_cached() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get("https://m.example/versions.json", 200, r#"{"versions":[3,5,4,5]}"#);
        let mirror = pattern_mirror(Arc::clone(&mock), false);
        let cancel = CancellationToken::new();

        let first = mirror.get_versions(&linux(), "release", &cancel).await;
        let second = mirror.get_versions(&linux(), "release", &cancel).await;

        let versions: Vec<u32> = first.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![5, 4, 3]);
        assert_eq!(first, second);
        assert_eq!(first[0].artifact_url, "https://m.example/dl/linux/amd64/5.pwr");
        assert_eq!(mock.call_count("https://m.example/versions.json"), 1);
    }

    #[tokio::test]
    async fn test_pattern_download_url_only_for_known_versions() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get("https://m.example/versions.json", 200, r#"{"versions":[5]}"#);
        let mirror = pattern_mirror(mock, false);
        let cancel = CancellationToken::new();

        assert_eq!(
            mirror.get_download_url(&linux(), "release", 5, &cancel).await.as_deref(),
            Some("https://m.example/dl/linux/amd64/5.pwr")
        );
        assert!(mirror.get_download_url(&linux(), "release", 6, &cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_pattern_diff_chain_on_diff_based_branch() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get("https://m.example/versions.json", 200, r#"{"versions":[1,2,3]}"#);
        let mirror = pattern_mirror(mock, true);
        let cancel = CancellationToken::new();

        let chain = mirror.get_patch_chain(&linux(), "release", &cancel).await;
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(1, 2), (2, 3)]);
        assert_eq!(chain[1].artifact_url, "https://m.example/diff/linux/amd64/2~3.pwr");
    }

    #[tokio::test]
    async fn test_chain_falls_back_to_full_builds() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get("https://m.example/versions.json", 200, r#"{"versions":[1,2]}"#);
        let mirror = pattern_mirror(mock, false);
        let cancel = CancellationToken::new();

        assert!(mirror.get_diff_url(&linux(), "release", 1, 2, &cancel).await.is_none());
        let chain = mirror.get_patch_chain(&linux(), "release", &cancel).await;
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(0, 1), (0, 2)]);
    }

    #[tokio::test]
    async fn test_unreachable_mirror_is_empty() {
        let mock = Arc::new(MockHttpClient::new());
        let mirror = pattern_mirror(mock, true);
        let cancel = CancellationToken::new();

        assert!(mirror.get_versions(&linux(), "release", &cancel).await.is_empty());
        assert!(mirror.get_patch_chain(&linux(), "release", &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn test_index_fetched_once_across_branches() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get(
            API,
            200,
            r#"{"builds":{
                "release":{"linux-amd64":{"v3-linux-amd64.pwr":"https://x/3"}},
                "pre-release":{"linux-amd64":{
                    "v5-linux-amd64.pwr":"https://x/5",
                    "v4~5-linux-amd64.pwr":"https://x/4-5",
                    "v3~4-linux-amd64.pwr":"https://x/3-4"
                }}
            }}"#,
        );
        let mirror = index_mirror(Arc::clone(&mock));
        let cancel = CancellationToken::new();

        let release = mirror.get_versions(&linux(), "release", &cancel).await;
        assert_eq!(release, vec![VersionEntry::full(3, "https://x/3")]);

        let pre = mirror.get_versions(&linux(), "pre-release", &cancel).await;
        let pairs: Vec<(u32, u32)> = pre.iter().map(|e| (e.version, e.from_version)).collect();
        assert_eq!(pairs, vec![(5, 0), (5, 4), (4, 3)]);

        let chain = mirror.get_patch_chain(&linux(), "pre-release", &cancel).await;
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(3, 4), (4, 5)]);

        assert_eq!(mock.call_count(API), 1);
    }

    #[tokio::test]
    async fn test_speed_test_uses_newest_payload() {
        let mock = Arc::new(MockHttpClient::new());
        mock.on_get(
            API,
            200,
            r#"{"builds":{"release":{"linux-amd64":{"v3-linux-amd64.pwr":"https://x/3"}}}}"#,
        );
        mock.on_head(API, 405);
        mock.on_get("https://x/3", 206, "payload-bytes");
        let mirror = index_mirror(Arc::clone(&mock));
        let cancel = CancellationToken::new();

        assert!(mirror.cached_speed().is_none());
        let result = mirror.test_speed(&cancel).await;

        assert!(result.is_available);
        assert_eq!(result.source_id, "idx");
        assert_eq!(mock.call_count("https://x/3"), 1);
        assert!(mirror.cached_speed().is_some());
    }

    #[tokio::test]
    async fn test_disabled_mirror_unavailable() {
        let mock = Arc::new(MockHttpClient::new());
        let mut descriptor = MirrorDescriptor::new(
            "off",
            "Off",
            MirrorProtocol::Pattern(PatternConfig::new(
                "https://m",
                "{base}/{version}",
                VersionDiscovery::StaticList {
                    versions: vec![1],
                    branches: BTreeMap::new(),
                },
            )),
        );
        descriptor.enabled = false;
        let mirror = MirrorSource::new(descriptor, mock);
        assert!(!mirror.is_available());
        assert_eq!(mirror.source_type(), SourceType::Mirror);
    }
}
