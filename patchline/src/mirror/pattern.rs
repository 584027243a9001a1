//! Pattern mode: URLs from templates, versions from a discovery method.

use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::descriptor::{expand, PatternConfig, TemplateVars, VersionDiscovery};
use crate::http::{HttpClient, HttpRequest};
use crate::model::Platform;

use super::json_path::extract_versions;

/// Timeout for a version discovery request.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Template variables after os/arch/branch remapping.
pub fn vars<'a>(
    config: &'a PatternConfig,
    platform: &'a Platform,
    branch: &'a str,
) -> TemplateVars<'a> {
    TemplateVars::new(
        &config.base_url,
        config.map_os(&platform.os),
        config.map_arch(&platform.arch),
        config.map_branch(branch),
    )
}

pub fn full_build_url(
    config: &PatternConfig,
    platform: &Platform,
    branch: &str,
    version: u32,
) -> String {
    expand(
        &config.full_build_url,
        &vars(config, platform, branch).with_version(version),
    )
}

/// Diff URL, when the mirror publishes diffs at all.
pub fn diff_url(
    config: &PatternConfig,
    platform: &Platform,
    branch: &str,
    from: u32,
    to: u32,
) -> Option<String> {
    let template = config.diff_url.as_deref()?;
    Some(expand(template, &vars(config, platform, branch).with_diff(from, to)))
}

/// Signature URL for a full build.
pub fn signature_url(
    config: &PatternConfig,
    platform: &Platform,
    branch: &str,
    version: u32,
) -> Option<String> {
    let template = config.signature_url.as_deref()?;
    Some(expand(template, &vars(config, platform, branch).with_version(version)))
}

/// Run the configured discovery method.
///
/// Returns `None` when the remote could not be read, so the failure is not
/// cached; an empty list means the remote answered with no versions.
pub async fn discover_versions(
    http: &dyn HttpClient,
    config: &PatternConfig,
    platform: &Platform,
    branch: &str,
    cancel: &CancellationToken,
) -> Option<Vec<u32>> {
    let vars = vars(config, platform, branch);

    match &config.version_discovery {
        VersionDiscovery::StaticList { versions, branches } => {
            let mut list = branches
                .get(branch)
                .cloned()
                .unwrap_or_else(|| versions.clone());
            list.sort_unstable();
            list.dedup();
            Some(list)
        }
        VersionDiscovery::JsonApi { url, json_path } => {
            let url = expand(url, &vars);
            let body = fetch_text(http, &url, cancel).await?;
            let document: serde_json::Value = match serde_json::from_str(&body) {
                Ok(document) => document,
                Err(e) => {
                    warn!(url = %url, error = %e, "Version API returned invalid JSON");
                    return None;
                }
            };
            Some(extract_versions(&document, &expand(json_path, &vars)))
        }
        VersionDiscovery::HtmlAutoindex {
            url,
            pattern,
            min_file_size,
        } => {
            let pattern = autoindex_pattern(pattern, &vars);
            let regex = match Regex::new(&pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Invalid autoindex pattern");
                    return None;
                }
            };
            let url = expand(url, &vars);
            let body = fetch_text(http, &url, cancel).await?;
            Some(scan_autoindex(&regex, &body, *min_file_size))
        }
    }
}

/// Substitute `{os}`, `{arch}` and `{branch}` into an autoindex regex.
///
/// Values are escaped so tokens like `x86_64` or `pre.release` match
/// literally.
pub fn autoindex_pattern(pattern: &str, vars: &TemplateVars<'_>) -> String {
    pattern
        .replace("{os}", &regex::escape(vars.os))
        .replace("{arch}", &regex::escape(vars.arch))
        .replace("{branch}", &regex::escape(vars.branch))
}

/// Extract versions from a directory listing.
///
/// Group 1 is the version. When group 2 is present and numeric it is the
/// entry size, and entries smaller than `min_file_size` are skipped.
pub fn scan_autoindex(regex: &Regex, body: &str, min_file_size: u64) -> Vec<u32> {
    let mut versions: Vec<u32> = regex
        .captures_iter(body)
        .filter(|captures| {
            match captures
                .get(2)
                .and_then(|size| size.as_str().trim().parse::<u64>().ok())
            {
                Some(size) => size >= min_file_size,
                None => true,
            }
        })
        .filter_map(|captures| captures.get(1)?.as_str().parse().ok())
        .collect();
    versions.sort_unstable();
    versions.dedup();
    versions
}

async fn fetch_text(http: &dyn HttpClient, url: &str, cancel: &CancellationToken) -> Option<String> {
    let request = HttpRequest::get(url).with_timeout(DISCOVERY_TIMEOUT);
    match http.execute(request, cancel).await {
        Ok(response) if response.is_success() => Some(response.text()),
        Ok(response) => {
            debug!(url = %url, status = response.status, "Version discovery rejected");
            None
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Version discovery failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::http::MockHttpClient;

    fn config(discovery: VersionDiscovery) -> PatternConfig {
        PatternConfig::new(
            "https://m.example/",
            "{base}/dl/{os}/{arch}/{version}.pwr",
            discovery,
        )
    }

    #[test]
    fn test_full_build_url_example() {
        let config = config(VersionDiscovery::StaticList {
            versions: vec![5],
            branches: BTreeMap::new(),
        });
        assert_eq!(
            full_build_url(&config, &Platform::new("linux", "amd64"), "release", 5),
            "https://m.example/dl/linux/amd64/5.pwr"
        );
    }

    #[test]
    fn test_token_remapping() {
        let mut config = config(VersionDiscovery::StaticList {
            versions: vec![],
            branches: BTreeMap::new(),
        });
        config.full_build_url = "{base}/{branch}/{os}-{arch}/{version}".to_string();
        config.os_mapping.insert("darwin".to_string(), "mac".to_string());
        config.arch_mapping.insert("arm64".to_string(), "aarch64".to_string());
        config.branch_mapping.insert("pre-release".to_string(), "beta".to_string());

        assert_eq!(
            full_build_url(&config, &Platform::new("darwin", "arm64"), "pre-release", 2),
            "https://m.example/beta/mac-aarch64/2"
        );
    }

    #[test]
    fn test_diff_url_requires_template() {
        let mut config = config(VersionDiscovery::StaticList {
            versions: vec![],
            branches: BTreeMap::new(),
        });
        let platform = Platform::new("linux", "amd64");
        assert!(diff_url(&config, &platform, "release", 1, 2).is_none());

        config.diff_url = Some("{base}/diff/{from}-{to}".to_string());
        assert_eq!(
            diff_url(&config, &platform, "release", 1, 2).as_deref(),
            Some("https://m.example/diff/1-2")
        );
    }

    #[test]
    fn test_autoindex_size_filter() {
        let regex = Regex::new(r#"href="v(\d+)-linux-amd64\.pwr">[^<]*</a>\s+(\d+)"#).unwrap();
        let body = r#"
            <a href="v1-linux-amd64.pwr">v1</a>   100
            <a href="v2-linux-amd64.pwr">v2</a>   5000
            <a href="v3-linux-amd64.pwr">v3</a>   9000
        "#;
        assert_eq!(scan_autoindex(&regex, body, 1000), vec![2, 3]);
        assert_eq!(scan_autoindex(&regex, body, 0), vec![1, 2, 3]);
    }

    #[test]
    fn test_autoindex_pattern_placeholders() {
        let vars = TemplateVars::new("https://m.example", "linux", "x86.64", "release");
        assert_eq!(
            autoindex_pattern(r#"href="v(\d+)-{os}-{arch}\.pwr""#, &vars),
            r#"href="v(\d+)-linux-x86\.64\.pwr""#
        );
    }

    #[tokio::test]
    async fn test_static_list_per_branch_no_network() {
        let mut branches = BTreeMap::new();
        branches.insert("pre-release".to_string(), vec![9, 8]);
        let config = config(VersionDiscovery::StaticList {
            versions: vec![1, 2],
            branches,
        });
        let mock = MockHttpClient::new();
        let cancel = CancellationToken::new();
        let platform = Platform::new("linux", "amd64");

        let pre = discover_versions(&mock, &config, &platform, "pre-release", &cancel).await;
        let release = discover_versions(&mock, &config, &platform, "release", &cancel).await;

        assert_eq!(pre, Some(vec![8, 9]));
        assert_eq!(release, Some(vec![1, 2]));
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_json_api_discovery_expands_path() {
        let config = config(VersionDiscovery::JsonApi {
            url: "{base}/versions.json".to_string(),
            json_path: "{os}-{arch}.{branch}.newest".to_string(),
        });
        let mock = MockHttpClient::new();
        mock.on_get(
            "https://m.example/versions.json",
            200,
            r#"{"linux-amd64":{"release":{"newest":[4,5]}}}"#,
        );
        let cancel = CancellationToken::new();

        let versions =
            discover_versions(&mock, &config, &Platform::new("linux", "amd64"), "release", &cancel)
                .await;
        assert_eq!(versions, Some(vec![4, 5]));
    }

    #[tokio::test]
    async fn test_failed_discovery_is_none() {
        let config = config(VersionDiscovery::JsonApi {
            url: "{base}/versions.json".to_string(),
            json_path: "versions".to_string(),
        });
        let mock = MockHttpClient::new();
        let cancel = CancellationToken::new();

        let versions =
            discover_versions(&mock, &config, &Platform::new("linux", "amd64"), "release", &cancel)
                .await;
        assert!(versions.is_none());
    }
}
