//! Heuristic mirror protocol prober.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::descriptor::{
    slugify, IndexStructure, JsonIndexConfig, MirrorDescriptor, MirrorProtocol, PatternConfig,
    VersionDiscovery,
};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::naming::DEFAULT_EXTENSION;

use super::candidates::{candidates, display_base, host_label, normalize};
use super::error::{DiscoveryError, DiscoveryResult, ProbeAttempt};
use super::report::{DiscoveryReport, Strategy};
use super::shapes::{
    detect_artifact_links, detect_json_index, detect_os_directories, detect_vendor_info,
    detect_version_list, infer_templates, InferredTemplates, TokenMapping, KNOWN_BRANCHES,
};

/// Timeout for a single probe request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const VENDOR_INFO_PATHS: [&str; 5] = ["/info", "/info.json", "/patches", "/patches.json", ""];
const INDEX_PATHS: [&str; 5] = ["/api.php", "/api.json", "/index.json", "/files.json", "/manifest.json"];
const VERSION_PATHS: [&str; 4] = ["/versions", "/api/versions", "/versions.json", "/api/v1/versions"];
const AUTOINDEX_PATHS: [&str; 5] = ["/", "/files/", "/builds/", "/release/", "/downloads/"];
const STATIC_PATHS: [&str; 5] = ["/pub/", "/mirror/", "/dl/", "/download/", "/static/"];
const LAUNCHER_PREFIXES: [&str; 3] = ["", "/api", "/v1"];

/// Query used to poke launcher-style patch endpoints.
const LAUNCHER_PROBE: &str = "/patches/windows/amd64/release/0";

/// What a strategy found: the protocol to describe and the URL that proved it.
struct Hit {
    protocol: MirrorProtocol,
    probe_url: String,
}

type StrategyResult = Result<Hit, String>;

/// Synthesizes a mirror descriptor from an arbitrary URL.
///
/// Candidates are tried one at a time. Each candidate runs every
/// [`Strategy`] in [`Strategy::ORDER`] and the first hit wins.
pub struct MirrorProber {
    http: Arc<dyn HttpClient>,
    probe_timeout: Duration,
}

impl MirrorProber {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probe `input` and build a descriptor for whatever answers first.
    pub async fn discover(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<DiscoveryReport> {
        let url = normalize(input)?;
        let shown = display_base(&url);
        let label = host_label(&url);
        let mut attempts = Vec::new();

        info!(url = %shown, "Discovering mirror protocol");

        for candidate in candidates(&url) {
            for strategy in Strategy::ORDER {
                if cancel.is_cancelled() {
                    return Err(DiscoveryError::Cancelled { url: shown });
                }

                match self.run(strategy, &candidate, cancel).await {
                    Ok(hit) => {
                        info!(
                            url = %shown,
                            candidate = %candidate,
                            strategy = %strategy,
                            "Mirror protocol detected"
                        );
                        let descriptor = MirrorDescriptor::new(slugify(&label), label.clone(), hit.protocol)
                            .with_description(format!(
                                "Discovered via {} at {}",
                                strategy, candidate
                            ));
                        return Ok(DiscoveryReport {
                            descriptor,
                            strategy,
                            candidate,
                            probe_url: hit.probe_url,
                        });
                    }
                    Err(reason) => {
                        debug!(candidate = %candidate, strategy = %strategy, reason = %reason, "Probe missed");
                        attempts.push(ProbeAttempt {
                            candidate: candidate.clone(),
                            strategy,
                            reason,
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled { url: shown });
        }
        Err(DiscoveryError::Exhausted {
            url: shown,
            attempts,
        })
    }

    async fn run(&self, strategy: Strategy, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        match strategy {
            Strategy::VendorInfo => self.probe_vendor_info(candidate, cancel).await,
            Strategy::JsonIndex => self.probe_json_index(candidate, cancel).await,
            Strategy::JsonApi => self.probe_version_list(candidate, cancel).await,
            Strategy::HtmlAutoindex => self.probe_listing(candidate, &AUTOINDEX_PATHS, cancel).await,
            Strategy::LauncherApi => self.probe_launcher(candidate, cancel).await,
            Strategy::StaticListing => self.probe_listing(candidate, &STATIC_PATHS, cancel).await,
            Strategy::OsDirectories => self.probe_os_directories(candidate, cancel).await,
        }
    }

    async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<HttpResponse, String> {
        let request = HttpRequest::get(url).with_timeout(self.probe_timeout);
        self.http
            .execute(request, cancel)
            .await
            .map_err(|e| format!("{}: {}", url, e))
    }

    async fn get_success(&self, url: &str, cancel: &CancellationToken) -> Result<HttpResponse, String> {
        let response = self.get(url, cancel).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(format!("{}: status {}", url, response.status))
        }
    }

    async fn get_json(&self, url: &str, cancel: &CancellationToken) -> Result<Value, String> {
        let response = self.get_success(url, cancel).await?;
        serde_json::from_slice(&response.body).map_err(|_| format!("{}: not JSON", url))
    }

    /// Try each path under `candidate` until `detect` accepts a document.
    async fn first_json<T>(
        &self,
        candidate: &str,
        paths: &[&str],
        cancel: &CancellationToken,
        detect: impl Fn(&Value) -> Option<T>,
    ) -> Result<(String, String, T), String> {
        let mut misses = Vec::new();
        for path in paths {
            let url = format!("{}{}", candidate, path);
            match self.get_json(&url, cancel).await {
                Ok(document) => match detect(&document) {
                    Some(shape) => return Ok((path.to_string(), url, shape)),
                    None => misses.push(format!("{}: unrecognized document", url)),
                },
                Err(reason) => misses.push(reason),
            }
        }
        Err(misses.join("; "))
    }

    async fn probe_vendor_info(&self, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        let (path, probe_url, shape) = self
            .first_json(candidate, &VENDOR_INFO_PATHS, cancel, detect_vendor_info)
            .await?;

        let templates = shape
            .sample_url
            .as_deref()
            .and_then(|sample| infer_templates(sample, &probe_url, candidate))
            .unwrap_or_else(|| default_templates(DEFAULT_EXTENSION));

        let mut config = PatternConfig::new(
            candidate,
            templates.full.clone(),
            VersionDiscovery::JsonApi {
                url: format!("{{base}}{}", path),
                json_path: shape.json_path,
            },
        );
        config.diff_url = Some(templates.diff.clone());
        apply_mapping(&mut config, &shape.mapping);
        apply_mapping(&mut config, &templates.mapping);
        config.diff_based_branches = shape.diff_branches;

        Ok(Hit {
            protocol: MirrorProtocol::Pattern(config),
            probe_url,
        })
    }

    async fn probe_json_index(&self, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        let (_, probe_url, shape) = self
            .first_json(candidate, &INDEX_PATHS, cancel, detect_json_index)
            .await?;

        let mut config = JsonIndexConfig::new(probe_url.clone(), shape.root_path);
        config.structure = shape.structure;
        if shape.structure == IndexStructure::Grouped {
            if let Some(group) = shape.base_group {
                config.base_group = group;
            }
            if let Some(group) = shape.patch_group {
                config.patch_group = group;
            }
        }
        config.platform_mapping = shape.platform_mapping;
        config.diff_based_branches = shape.diff_branches;

        Ok(Hit {
            protocol: MirrorProtocol::JsonIndex(config),
            probe_url,
        })
    }

    async fn probe_version_list(&self, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        let (path, probe_url, shape) = self
            .first_json(candidate, &VERSION_PATHS, cancel, detect_version_list)
            .await?;

        let templates = shape
            .sample_url
            .as_deref()
            .and_then(|sample| infer_templates(sample, &probe_url, candidate))
            .unwrap_or_else(|| default_templates(DEFAULT_EXTENSION));

        let mut config = PatternConfig::new(
            candidate,
            templates.full.clone(),
            VersionDiscovery::JsonApi {
                url: format!("{{base}}{}", path),
                json_path: shape.json_path,
            },
        );
        config.diff_url = Some(templates.diff.clone());
        apply_mapping(&mut config, &templates.mapping);

        Ok(Hit {
            protocol: MirrorProtocol::Pattern(config),
            probe_url,
        })
    }

    async fn probe_listing(
        &self,
        candidate: &str,
        paths: &[&str],
        cancel: &CancellationToken,
    ) -> StrategyResult {
        let mut misses = Vec::new();
        for path in paths {
            let url = format!("{}{}", candidate, path);
            let response = match self.get_success(&url, cancel).await {
                Ok(response) => response,
                Err(reason) => {
                    misses.push(reason);
                    continue;
                }
            };
            let Some(listing) = detect_artifact_links(&response.text()) else {
                misses.push(format!("{}: no artifact links", url));
                continue;
            };

            let templates = infer_templates(&listing.sample_href, &url, candidate)
                .unwrap_or_else(|| default_templates(&listing.extension));

            let mut config = PatternConfig::new(
                candidate,
                templates.full.clone(),
                VersionDiscovery::HtmlAutoindex {
                    url: format!("{{base}}{}", path),
                    pattern: listing_pattern(&listing.extension),
                    min_file_size: 0,
                },
            );
            config.diff_url = Some(templates.diff.clone());
            apply_mapping(&mut config, &templates.mapping);
            if listing.has_diffs {
                config.diff_based_branches = KNOWN_BRANCHES.iter().map(|b| b.to_string()).collect();
            }

            return Ok(Hit {
                protocol: MirrorProtocol::Pattern(config),
                probe_url: url,
            });
        }
        Err(misses.join("; "))
    }

    async fn probe_launcher(&self, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        let mut misses = Vec::new();
        for prefix in LAUNCHER_PREFIXES {
            let url = format!("{}{}{}", candidate, prefix, LAUNCHER_PROBE);
            let response = match self.get(&url, cancel).await {
                Ok(response) => response,
                Err(reason) => {
                    misses.push(reason);
                    continue;
                }
            };

            // A 400/422 means the route exists but disliked our parameters.
            let confirmed = match response.status {
                200 => serde_json::from_slice::<Value>(&response.body)
                    .map(|doc| doc.get("steps").map(Value::is_array).unwrap_or(false))
                    .unwrap_or(false),
                400 | 422 => true,
                _ => false,
            };
            if !confirmed {
                misses.push(format!("{}: status {}", url, response.status));
                continue;
            }

            let templates = default_templates(DEFAULT_EXTENSION);
            let mut config = PatternConfig::new(
                candidate,
                templates.full,
                VersionDiscovery::JsonApi {
                    url: format!("{{base}}{}/patches/{{os}}/{{arch}}/{{branch}}/0", prefix),
                    json_path: "steps[].to".to_string(),
                },
            );
            config.diff_url = Some(templates.diff);
            config.diff_based_branches = KNOWN_BRANCHES.iter().map(|b| b.to_string()).collect();

            return Ok(Hit {
                protocol: MirrorProtocol::Pattern(config),
                probe_url: url,
            });
        }
        Err(misses.join("; "))
    }

    async fn probe_os_directories(&self, candidate: &str, cancel: &CancellationToken) -> StrategyResult {
        let url = format!("{}/", candidate);
        let response = self.get_success(&url, cancel).await?;
        let directories = detect_os_directories(&response.text());
        if directories.is_empty() {
            return Err(format!("{}: no os directories", url));
        }

        let mut config = PatternConfig::new(
            candidate,
            format!("{{base}}/{{os}}/v{{version}}-{{os}}-{{arch}}.{}", DEFAULT_EXTENSION),
            VersionDiscovery::HtmlAutoindex {
                url: "{base}/{os}/".to_string(),
                pattern: listing_pattern(DEFAULT_EXTENSION),
                min_file_size: 0,
            },
        );
        config.diff_url = Some(format!(
            "{{base}}/{{os}}/v{{from}}~{{to}}-{{os}}-{{arch}}.{}",
            DEFAULT_EXTENSION
        ));
        config.os_mapping = directories
            .into_iter()
            .filter(|(os, dir)| os != dir)
            .collect::<BTreeMap<_, _>>();

        Ok(Hit {
            protocol: MirrorProtocol::Pattern(config),
            probe_url: url,
        })
    }
}

/// Layout assumed when no sample artifact URL is available.
fn default_templates(extension: &str) -> InferredTemplates {
    InferredTemplates {
        full: format!("{{base}}/{{branch}}/{{os}}/{{arch}}/v{{version}}-{{os}}-{{arch}}.{}", extension),
        diff: format!("{{base}}/{{branch}}/{{os}}/{{arch}}/v{{from}}~{{to}}-{{os}}-{{arch}}.{}", extension),
        mapping: TokenMapping::default(),
        has_branch: true,
    }
}

/// Autoindex regex matching full build links for the requested platform.
fn listing_pattern(extension: &str) -> String {
    format!(
        r#"href="[^"]*?v(\d+)-{{os}}-{{arch}}\.{}""#,
        regex::escape(extension)
    )
}

fn apply_mapping(config: &mut PatternConfig, mapping: &TokenMapping) {
    for (canonical, written) in &mapping.os {
        config.os_mapping.insert(canonical.clone(), written.clone());
    }
    for (canonical, written) in &mapping.arch {
        config.arch_mapping.insert(canonical.clone(), written.clone());
    }
}
