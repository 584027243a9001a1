//! The authenticated vendor source.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{HttpClient, HttpRequest};
use crate::model::{
    PatchQuery, PatchStep, Platform, SourceType, SpeedTestResult, VersionEntry,
};
use crate::source::{measure_speed, FetchCache, SpeedSlot, VersionSource};

use super::auth::{AuthProvider, ProfileProvider, Session};
use super::config::OfficialConfig;
use super::snapshot;

/// Identifier of the vendor source.
pub const OFFICIAL_SOURCE_ID: &str = "official";

/// Total attempts for one query, counting the retry after a refresh.
const MAX_ATTEMPTS: u32 = 2;

/// `fromBuild` asking for the newest full build.
const NEWEST_FULL_BUILD: u32 = 0;

/// `fromBuild` asking for the whole incremental chain.
const FULL_CHAIN: u32 = 1;

/// Branches probed, in order, for a speed test payload.
const SPEED_TEST_BRANCHES: [&str; 2] = ["pre-release", "release"];

#[derive(Debug, Deserialize)]
struct PatchResponse {
    #[serde(default)]
    steps: Vec<PatchStep>,
}

/// Steps returned for a query.
#[derive(Debug, Clone)]
struct Fetched {
    steps: Vec<PatchStep>,
    /// False when served from the cache.
    from_network: bool,
}

/// Result of one attempt against the API.
#[derive(Debug)]
enum FetchOutcome {
    Success(Fetched),
    /// The token was rejected; refresh and try again.
    NeedsRefresh,
    Failed(String),
}

struct Inner {
    config: OfficialConfig,
    http: Arc<dyn HttpClient>,
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileProvider>,
    session: RwLock<Option<Session>>,
    cache: FetchCache<PatchQuery, Vec<PatchStep>>,
    speed: SpeedSlot,
    speed_platform: Platform,
    background: CancellationToken,
}

/// Source backed by the vendor's authenticated patch API.
///
/// Every branch is diff-based. A rejected token triggers one refresh, a
/// full cache invalidation (cached URLs carry signatures minted for the
/// old token), and a single retry.
pub struct OfficialSource {
    inner: Arc<Inner>,
}

impl OfficialSource {
    pub fn new(
        config: OfficialConfig,
        http: Arc<dyn HttpClient>,
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileProvider>,
    ) -> Self {
        let cache = FetchCache::new(config.cache_ttl);
        let speed = SpeedSlot::new(config.speed_test_ttl);
        Self {
            inner: Arc::new(Inner {
                config,
                http,
                auth,
                profiles,
                session: RwLock::new(None),
                cache,
                speed,
                speed_platform: Platform::host(),
                background: CancellationToken::new(),
            }),
        }
    }

    /// Platform used to pick the speed test payload.
    ///
    /// Must be called before the source is shared.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.speed_platform = platform;
        }
        self
    }

    async fn versions(
        &self,
        platform: &Platform,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Vec<VersionEntry> {
        let query = PatchQuery::new(platform, branch, NEWEST_FULL_BUILD);
        let Some(fetched) = self.inner.fetch(&query, cancel).await else {
            return Vec::new();
        };

        if fetched.from_network {
            self.spawn_chain_snapshot(platform, branch);
        }

        fetched
            .steps
            .iter()
            .max_by_key(|step| step.to)
            .map(|step| {
                let mut entry = step.to_entry();
                entry.from_version = 0;
                vec![entry]
            })
            .unwrap_or_default()
    }

    async fn patch_chain(
        &self,
        platform: &Platform,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Vec<PatchStep> {
        let query = PatchQuery::new(platform, branch, FULL_CHAIN);
        let Some(fetched) = self.inner.fetch(&query, cancel).await else {
            return Vec::new();
        };
        let mut steps = fetched.steps;
        steps.sort_by_key(|step| (step.to, step.from));
        if fetched.from_network {
            self.inner.spawn_snapshot_write(platform, branch, steps.clone());
        }
        steps
    }

    async fn download_url(
        &self,
        platform: &Platform,
        branch: &str,
        version: u32,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let query = PatchQuery::new(platform, branch, NEWEST_FULL_BUILD);
        let fetched = self.inner.fetch(&query, cancel).await?;
        fetched
            .steps
            .into_iter()
            .find(|step| step.to == version)
            .map(|step| step.artifact_url)
    }

    async fn diff_url(
        &self,
        platform: &Platform,
        branch: &str,
        from: u32,
        to: u32,
        cancel: &CancellationToken,
    ) -> Option<String> {
        if from == 0 || from >= to {
            return None;
        }

        let find = |steps: Vec<PatchStep>| {
            steps
                .into_iter()
                .find(|step| step.from == from && step.to == to)
                .map(|step| step.artifact_url)
        };

        let chain = PatchQuery::new(platform, branch, FULL_CHAIN);
        if let Some(url) = self.inner.fetch(&chain, cancel).await.and_then(|f| find(f.steps)) {
            return Some(url);
        }
        if from == FULL_CHAIN {
            return None;
        }

        // The API also answers chains starting at an arbitrary build.
        let from_build = PatchQuery::new(platform, branch, from);
        self.inner
            .fetch(&from_build, cancel)
            .await
            .and_then(|f| find(f.steps))
    }

    async fn speed_test(&self, cancel: &CancellationToken) -> SpeedTestResult {
        let inner = &self.inner;
        let ping = HttpRequest::head(inner.config.api_base.clone())
            .with_header("User-Agent", inner.config.user_agent.clone())
            .with_timeout(inner.config.request_timeout);

        let mut payload = None;
        for branch in SPEED_TEST_BRANCHES {
            let query = PatchQuery::new(&inner.speed_platform, branch, NEWEST_FULL_BUILD);
            let newest = inner
                .fetch(&query, cancel)
                .await
                .and_then(|f| f.steps.into_iter().max_by_key(|step| step.to));
            if let Some(step) = newest {
                let mut request = HttpRequest::get(step.artifact_url)
                    .with_header("User-Agent", inner.config.user_agent.clone());
                let session = inner.session.read().clone();
                if let Some(session) = session {
                    request = request.with_bearer(&session.access_token);
                }
                payload = Some(request);
                break;
            }
        }

        let result = measure_speed(
            inner.http.as_ref(),
            OFFICIAL_SOURCE_ID,
            ping,
            payload,
            cancel,
        )
        .await;
        inner.speed.store(result)
    }

    /// Fetch the incremental chain in the background and snapshot it.
    fn spawn_chain_snapshot(&self, platform: &Platform, branch: &str) {
        if self.inner.config.snapshot_path.is_none() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let platform = platform.clone();
        let branch = branch.to_string();

        tokio::spawn(async move {
            let cancel = inner.background.child_token();
            let query = PatchQuery::new(&platform, &branch, FULL_CHAIN);
            match inner.fetch(&query, &cancel).await {
                Some(fetched) if fetched.from_network => {
                    let mut steps = fetched.steps;
                    steps.sort_by_key(|step| (step.to, step.from));
                    inner.spawn_snapshot_write(&platform, &branch, steps);
                }
                Some(_) => {}
                None => debug!(branch = %branch, "Background chain fetch produced nothing"),
            }
        });
    }
}

impl Inner {
    /// Fetch a query, refreshing the session once on rejection.
    async fn fetch(&self, query: &PatchQuery, cancel: &CancellationToken) -> Option<Fetched> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.fetch_once(query, cancel).await {
                FetchOutcome::Success(fetched) => return Some(fetched),
                FetchOutcome::Failed(reason) => {
                    warn!(branch = %query.branch, from_build = query.from_build, reason = %reason, "Official fetch failed");
                    return None;
                }
                FetchOutcome::NeedsRefresh if attempt < MAX_ATTEMPTS => {
                    let Some(session) = self.auth.force_refresh(cancel).await else {
                        warn!("Token refresh produced no session");
                        *self.session.write() = None;
                        return None;
                    };
                    *self.session.write() = Some(session);
                    self.cache.invalidate_all();
                    info!(branch = %query.branch, "Token refreshed, retrying official fetch");
                }
                FetchOutcome::NeedsRefresh => {
                    warn!(branch = %query.branch, attempts = attempt, "Official API still rejects the refreshed token");
                }
            }
        }
        None
    }

    async fn fetch_once(&self, query: &PatchQuery, cancel: &CancellationToken) -> FetchOutcome {
        if let Some(steps) = self.cache.get(query).await {
            return FetchOutcome::Success(Fetched {
                steps,
                from_network: false,
            });
        }

        let _guard = self.cache.lock().await;

        // Filled by whoever held the lock before us.
        if let Some(steps) = self.cache.get(query).await {
            return FetchOutcome::Success(Fetched {
                steps,
                from_network: false,
            });
        }

        let Some(session) = self.current_session(cancel).await else {
            return FetchOutcome::Failed("no official session".to_string());
        };

        let url = self.patches_url(query);
        let request = HttpRequest::get(&url)
            .with_bearer(&session.access_token)
            .with_header("User-Agent", self.config.user_agent.clone())
            .with_timeout(self.config.request_timeout);

        let response = match self.http.execute(request, cancel).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(e.to_string()),
        };
        if response.is_auth_failure() {
            debug!(url = %url, status = response.status, "Official API rejected token");
            return FetchOutcome::NeedsRefresh;
        }
        if !response.is_success() {
            return FetchOutcome::Failed(format!("HTTP {} from {}", response.status, url));
        }

        match response.json::<PatchResponse>(&url) {
            Ok(body) => {
                self.cache.insert(query.clone(), body.steps.clone()).await;
                FetchOutcome::Success(Fetched {
                    steps: body.steps,
                    from_network: true,
                })
            }
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }

    async fn current_session(&self, cancel: &CancellationToken) -> Option<Session> {
        let held = self.session.read().clone();
        if held.is_some() {
            return held;
        }
        let session = self.auth.current_session(cancel).await?;
        *self.session.write() = Some(session.clone());
        Some(session)
    }

    fn patches_url(&self, query: &PatchQuery) -> String {
        format!(
            "{}/patches/{}/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            query.platform.os,
            query.platform.arch,
            query.branch,
            query.from_build
        )
    }

    fn spawn_snapshot_write(&self, platform: &Platform, branch: &str, steps: Vec<PatchStep>) {
        let Some(path) = self.config.snapshot_path.clone() else {
            return;
        };
        let platform = platform.clone();
        let branch = branch.to_string();

        tokio::task::spawn_blocking(move || {
            if let Err(e) = snapshot::record_chain(&path, &platform, &branch, steps) {
                warn!(path = %path.display(), error = %e, "Failed to write patch snapshot");
            }
        });
    }
}

impl Drop for OfficialSource {
    fn drop(&mut self) {
        self.inner.background.cancel();
    }
}

impl VersionSource for OfficialSource {
    fn source_id(&self) -> &str {
        OFFICIAL_SOURCE_ID
    }

    fn source_type(&self) -> SourceType {
        SourceType::Official
    }

    fn is_available(&self) -> bool {
        self.inner.session.read().is_some()
            || self
                .inner
                .profiles
                .profiles()
                .iter()
                .any(|profile| profile.has_official_session())
    }

    fn priority(&self) -> i32 {
        self.inner.config.priority
    }

    fn is_diff_based_branch(&self, _branch: &str) -> bool {
        true
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
        self.inner.cache.invalidate_all();
    }

    fn preload<'a>(
        &'a self,
        platform: &'a Platform,
        branch: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let newest = self.versions(platform, branch, cancel).await;
            let chain = self.patch_chain(platform, branch, cancel).await;
            debug!(branch = %branch, newest = newest.len(), chain = chain.len(), "Preloaded official source");
        })
    }

    fn test_speed<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, SpeedTestResult> {
        Box::pin(self.speed_test(cancel))
    }

    fn cached_speed(&self) -> Option<SpeedTestResult> {
        self.inner.speed.fresh()
    }
}
