//! Recognizers for the document shapes discovery looks for.
//!
//! Everything here is pure: it inspects an already fetched body and
//! reports what it found. The prober decides what to fetch.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::descriptor::IndexStructure;
use crate::mirror::extract_versions;
use crate::naming::ArtifactName;

/// Branch names recognized in documents.
pub const KNOWN_BRANCHES: [&str; 6] = ["release", "pre-release", "prerelease", "beta", "stable", "latest"];

/// Fields that carry a branch's newest build number.
const NEWEST_FIELDS: [&str; 4] = ["newest", "latest", "build", "version"];

/// Fields that carry a sample artifact URL.
const URL_FIELDS: [&str; 5] = ["url", "pwr", "download", "artifactUrl", "file"];

fn is_known_branch(key: &str) -> bool {
    KNOWN_BRANCHES.iter().any(|b| b.eq_ignore_ascii_case(key))
}

/// Canonical vendor os token for a name found in a document or path.
pub fn canonical_os(token: &str) -> Option<&'static str> {
    match token.to_ascii_lowercase().as_str() {
        "windows" | "win" | "win64" | "win32" => Some("windows"),
        "linux" => Some("linux"),
        "darwin" | "mac" | "macos" | "osx" => Some("darwin"),
        _ => None,
    }
}

/// Canonical vendor arch token.
pub fn canonical_arch(token: &str) -> Option<&'static str> {
    match token.to_ascii_lowercase().as_str() {
        "amd64" | "x64" | "x86_64" => Some("amd64"),
        "arm64" | "aarch64" => Some("arm64"),
        "386" | "x86" => Some("386"),
        _ => None,
    }
}

/// A platform key found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformKey {
    /// `{os}-{arch}` form, with the tokens as written.
    Combined { os: String, arch: String },
    /// An os name only.
    OsOnly { os: String },
}

impl PlatformKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key.split_once(['-', '_']) {
            Some((os, arch)) => {
                canonical_os(os)?;
                canonical_arch(arch)?;
                Some(PlatformKey::Combined {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
            None => {
                canonical_os(key)?;
                Some(PlatformKey::OsOnly { os: key.to_string() })
            }
        }
    }
}

/// Token remapping needed so canonical tokens expand to the mirror's own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMapping {
    pub os: BTreeMap<String, String>,
    pub arch: BTreeMap<String, String>,
}

impl TokenMapping {
    fn note_os(&mut self, written: &str) {
        if let Some(canonical) = canonical_os(written) {
            if canonical != written {
                self.os.insert(canonical.to_string(), written.to_string());
            }
        }
    }

    fn note_arch(&mut self, written: &str) {
        if let Some(canonical) = canonical_arch(written) {
            if canonical != written {
                self.arch.insert(canonical.to_string(), written.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Vendor info shape
// ---------------------------------------------------------------------------

/// `{ "<os>-<arch>": { "<branch>": { "newest": N, ... } } }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorInfoShape {
    /// Json path template addressing the newest build.
    pub json_path: String,
    pub sample_url: Option<String>,
    pub mapping: TokenMapping,
    pub diff_branches: Vec<String>,
}

pub fn detect_vendor_info(document: &Value) -> Option<VendorInfoShape> {
    let platforms = document.as_object()?;
    let mut found: Option<VendorInfoShape> = None;

    for (platform_key, branches) in platforms {
        let Some(parsed) = PlatformKey::parse(platform_key) else {
            continue;
        };
        let Some(branches) = branches.as_object() else {
            continue;
        };

        for (branch, info) in branches.iter().filter(|(b, _)| is_known_branch(b)) {
            let Some(info) = info.as_object() else {
                continue;
            };
            let Some(field) = NEWEST_FIELDS.iter().find(|f| info.contains_key(**f)) else {
                continue;
            };

            let shape = found.get_or_insert_with(|| VendorInfoShape {
                json_path: match &parsed {
                    PlatformKey::Combined { .. } => format!("{{os}}-{{arch}}.{{branch}}.{}", field),
                    PlatformKey::OsOnly { .. } => format!("{{os}}.{{branch}}.{}", field),
                },
                sample_url: None,
                mapping: TokenMapping::default(),
                diff_branches: Vec::new(),
            });
            match &parsed {
                PlatformKey::Combined { os, arch } => {
                    shape.mapping.note_os(os);
                    shape.mapping.note_arch(arch);
                }
                PlatformKey::OsOnly { os } => shape.mapping.note_os(os),
            }

            if shape.sample_url.is_none() {
                shape.sample_url = first_url_field(info);
            }
            let has_patches = ["patches", "diffs", "steps"]
                .iter()
                .any(|k| info.get(*k).map(|v| !v.is_null()).unwrap_or(false));
            if has_patches && !shape.diff_branches.iter().any(|b| b == branch) {
                shape.diff_branches.push(branch.clone());
            }
        }
    }

    found
}

fn first_url_field(map: &Map<String, Value>) -> Option<String> {
    URL_FIELDS
        .iter()
        .filter_map(|field| map.get(*field)?.as_str())
        .find(|value| value.contains("://") || value.starts_with('/'))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Json index shape
// ---------------------------------------------------------------------------

/// `{ root: { branch: { platform: { [group:] { filename: url } } } } }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexShape {
    pub root_path: String,
    pub structure: IndexStructure,
    pub base_group: Option<String>,
    pub patch_group: Option<String>,
    /// Canonical `os-arch` (or os) to the platform key used in the index.
    pub platform_mapping: BTreeMap<String, String>,
    pub diff_branches: Vec<String>,
}

/// Count of full and diff artifact names among a map's keys.
fn count_artifacts(map: &Map<String, Value>) -> (usize, usize) {
    map.iter()
        .filter(|(_, v)| v.is_string())
        .filter_map(|(k, _)| ArtifactName::parse(k))
        .fold((0, 0), |(full, diff), name| {
            if name.is_diff() {
                (full, diff + 1)
            } else {
                (full + 1, diff)
            }
        })
}

pub fn detect_json_index(document: &Value) -> Option<IndexShape> {
    for (root_key, root) in document.as_object()? {
        let Some(branches) = root.as_object() else {
            continue;
        };

        let mut shape = IndexShape {
            root_path: root_key.clone(),
            structure: IndexStructure::Flat,
            base_group: None,
            patch_group: None,
            platform_mapping: BTreeMap::new(),
            diff_branches: Vec::new(),
        };
        let mut matched = false;

        for (branch, platforms) in branches.iter().filter(|(b, _)| is_known_branch(b)) {
            let Some(platforms) = platforms.as_object() else {
                continue;
            };
            for (platform_key, node) in platforms {
                let (Some(parsed), Some(node)) = (PlatformKey::parse(platform_key), node.as_object())
                else {
                    continue;
                };

                let (full, diff) = count_artifacts(node);
                let mut diffs_here = diff > 0;
                if full + diff > 0 {
                    matched = true;
                } else {
                    // Grouped: look one level down.
                    for (group, files) in node {
                        let Some(files) = files.as_object() else {
                            continue;
                        };
                        let (full, diff) = count_artifacts(files);
                        if full + diff == 0 {
                            continue;
                        }
                        matched = true;
                        shape.structure = IndexStructure::Grouped;
                        if diff > full {
                            shape.patch_group.get_or_insert_with(|| group.clone());
                            diffs_here = true;
                        } else {
                            shape.base_group.get_or_insert_with(|| group.clone());
                        }
                    }
                }

                note_platform_mapping(&mut shape.platform_mapping, platform_key, &parsed);
                if diffs_here && !shape.diff_branches.iter().any(|b| b == branch) {
                    shape.diff_branches.push(branch.clone());
                }
            }
        }

        if matched {
            return Some(shape);
        }
    }
    None
}

fn note_platform_mapping(mapping: &mut BTreeMap<String, String>, key: &str, parsed: &PlatformKey) {
    match parsed {
        PlatformKey::Combined { os, arch } => {
            if let (Some(os), Some(arch)) = (canonical_os(os), canonical_arch(arch)) {
                let canonical = format!("{}-{}", os, arch);
                if canonical != key {
                    mapping.insert(canonical, key.to_string());
                }
            }
        }
        PlatformKey::OsOnly { os } => {
            if let Some(canonical) = canonical_os(os) {
                mapping.insert(canonical.to_string(), key.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Json version list shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionListShape {
    pub json_path: String,
    pub sample_url: Option<String>,
}

pub fn detect_version_list(document: &Value) -> Option<VersionListShape> {
    if document.is_array() {
        return (!extract_versions(document, "").is_empty()).then(|| VersionListShape {
            json_path: String::new(),
            sample_url: document
                .as_array()
                .and_then(|items| items.iter().find_map(|i| i.as_object().and_then(first_url_field))),
        });
    }

    for (key, value) in document.as_object()? {
        let Some(items) = value.as_array() else {
            continue;
        };
        let sample_url = items
            .iter()
            .find_map(|item| item.as_object().and_then(first_url_field));

        if items.iter().all(|i| !i.is_object()) {
            if !extract_versions(document, key).is_empty() {
                return Some(VersionListShape {
                    json_path: key.clone(),
                    sample_url,
                });
            }
            continue;
        }

        for field in ["version", "build"] {
            let path = format!("{}[].{}", key, field);
            if !extract_versions(document, &path).is_empty() {
                return Some(VersionListShape {
                    json_path: path,
                    sample_url,
                });
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Html listings
// ---------------------------------------------------------------------------

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(?i)href\s*=\s*["']([^"'#?]+)"#).unwrap())
}

/// Artifact links found in an html page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingShape {
    /// Href of the first full build link.
    pub sample_href: String,
    pub extension: String,
    pub has_diffs: bool,
}

pub fn detect_artifact_links(html: &str) -> Option<ListingShape> {
    let mut sample: Option<(String, String)> = None;
    let mut has_diffs = false;

    for captures in href_pattern().captures_iter(html) {
        let href = &captures[1];
        let filename = href.rsplit('/').next().unwrap_or(href);
        let Some(name) = ArtifactName::parse(filename) else {
            continue;
        };
        match name {
            ArtifactName::Diff { .. } => has_diffs = true,
            ArtifactName::Full { extension, .. } => {
                if sample.is_none() {
                    sample = Some((href.to_string(), extension));
                }
            }
        }
    }

    sample.map(|(sample_href, extension)| ListingShape {
        sample_href,
        extension,
        has_diffs,
    })
}

/// Links to per-OS subdirectories, as (canonical os, directory name).
pub fn detect_os_directories(html: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = Vec::new();
    for captures in href_pattern().captures_iter(html) {
        let href = captures[1].trim_start_matches("./");
        let dir = href.strip_suffix('/').unwrap_or(href);
        if dir.contains('/') || dir.contains(':') {
            continue;
        }
        if let Some(os) = canonical_os(dir) {
            if !found.iter().any(|(known, _)| known == os) {
                found.push((os.to_string(), dir.to_string()));
            }
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Url templates
// ---------------------------------------------------------------------------

/// Url templates inferred from one sample artifact URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredTemplates {
    pub full: String,
    pub diff: String,
    pub mapping: TokenMapping,
    /// The sample path contained a branch directory.
    pub has_branch: bool,
}

/// Turn a sample artifact URL into `{base}`-relative templates.
///
/// `sample` may be relative to `page_url`. Path segments naming the os,
/// arch, or a known branch become placeholders.
pub fn infer_templates(sample: &str, page_url: &str, base: &str) -> Option<InferredTemplates> {
    let page = Url::parse(&format!("{}/", page_url.trim_end_matches('/'))).ok()?;
    let absolute = page.join(sample).ok()?;
    let absolute = absolute.as_str();

    let base = base.trim_end_matches('/');
    let relative = absolute.strip_prefix(base)?;
    let (dir, filename) = relative.rsplit_once('/')?;
    let name = ArtifactName::parse(filename)?;
    let (os, arch, extension) = match &name {
        ArtifactName::Full { os, arch, extension, .. }
        | ArtifactName::Diff { os, arch, extension, .. } => (os.clone(), arch.clone(), extension.clone()),
    };

    let mut mapping = TokenMapping::default();
    mapping.note_os(&os);
    mapping.note_arch(&arch);

    let mut has_branch = false;
    let dir: Vec<String> = dir
        .split('/')
        .map(|segment| {
            if segment.eq_ignore_ascii_case(&os) {
                "{os}".to_string()
            } else if segment.eq_ignore_ascii_case(&arch) {
                "{arch}".to_string()
            } else if segment.eq_ignore_ascii_case(&format!("{}-{}", os, arch)) {
                "{os}-{arch}".to_string()
            } else if is_known_branch(segment) {
                has_branch = true;
                "{branch}".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect();
    let dir = dir.join("/");

    Some(InferredTemplates {
        full: format!("{{base}}{}/v{{version}}-{{os}}-{{arch}}.{}", dir, extension),
        diff: format!("{{base}}{}/v{{from}}~{{to}}-{{os}}-{{arch}}.{}", dir, extension),
        mapping,
        has_branch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_keys() {
        assert_eq!(
            PlatformKey::parse("linux-amd64"),
            Some(PlatformKey::Combined {
                os: "linux".to_string(),
                arch: "amd64".to_string()
            })
        );
        assert_eq!(
            PlatformKey::parse("win"),
            Some(PlatformKey::OsOnly {
                os: "win".to_string()
            })
        );
        assert!(PlatformKey::parse("readme").is_none());
        assert!(PlatformKey::parse("linux-sparc").is_none());
    }

    #[test]
    fn test_vendor_info_detection() {
        let doc = json!({
            "windows-x64": { "release": { "newest": 12, "url": "https://cdn/x/v12-windows-x64.pwr" } },
            "linux-amd64": { "pre-release": { "newest": 13, "patches": [1] } }
        });
        let shape = detect_vendor_info(&doc).unwrap();
        assert_eq!(shape.json_path, "{os}-{arch}.{branch}.newest");
        assert!(shape.sample_url.is_some());
        assert_eq!(shape.diff_branches, vec!["pre-release".to_string()]);
        assert_eq!(shape.mapping.arch.get("amd64").map(String::as_str), Some("x64"));
    }

    #[test]
    fn test_vendor_info_rejects_other_documents() {
        assert!(detect_vendor_info(&json!({ "versions": [1, 2] })).is_none());
        assert!(detect_vendor_info(&json!([1, 2])).is_none());
        assert!(detect_vendor_info(&json!({ "linux-amd64": { "release": 5 } })).is_none());
    }

    #[test]
    fn test_flat_index_detection() {
        let doc = json!({
            "meta": "x",
            "builds": { "release": { "linux-amd64": { "v3-linux-amd64.pwr": "https://x/3" } } }
        });
        let shape = detect_json_index(&doc).unwrap();
        assert_eq!(shape.root_path, "builds");
        assert_eq!(shape.structure, IndexStructure::Flat);
        assert!(shape.diff_branches.is_empty());
        assert!(shape.platform_mapping.is_empty());
    }

    #[test]
    fn test_grouped_index_detection() {
        let doc = json!({
            "files": { "pre-release": { "win": {
                "full": { "v5-windows-amd64.pwr": "https://x/5" },
                "delta": { "v4~5-windows-amd64.pwr": "https://x/4-5" }
            } } }
        });
        let shape = detect_json_index(&doc).unwrap();
        assert_eq!(shape.structure, IndexStructure::Grouped);
        assert_eq!(shape.base_group.as_deref(), Some("full"));
        assert_eq!(shape.patch_group.as_deref(), Some("delta"));
        assert_eq!(shape.platform_mapping.get("windows").map(String::as_str), Some("win"));
        assert_eq!(shape.diff_branches, vec!["pre-release".to_string()]);
    }

    #[test]
    fn test_version_list_shapes() {
        assert_eq!(detect_version_list(&json!([1, 2])).unwrap().json_path, "");
        assert_eq!(
            detect_version_list(&json!({ "versions": ["v1", "v2"] })).unwrap().json_path,
            "versions"
        );
        let items = detect_version_list(&json!({
            "items": [{ "version": 4, "url": "https://x/v4-linux-amd64.pwr" }]
        }))
        .unwrap();
        assert_eq!(items.json_path, "items[].version");
        assert_eq!(items.sample_url.as_deref(), Some("https://x/v4-linux-amd64.pwr"));
        assert!(detect_version_list(&json!({ "name": "x" })).is_none());
    }

    #[test]
    fn test_artifact_links() {
        let html = r#"<a href="../">..</a>
            <a href="v2~3-linux-amd64.pwr">diff</a>
            <a href="v3-linux-amd64.pwr">v3</a>"#;
        let shape = detect_artifact_links(html).unwrap();
        assert_eq!(shape.sample_href, "v3-linux-amd64.pwr");
        assert_eq!(shape.extension, "pwr");
        assert!(shape.has_diffs);

        assert!(detect_artifact_links("<a href=\"readme.txt\">x</a>").is_none());
    }

    #[test]
    fn test_os_directories() {
        let html = r#"<a href="../">..</a><a href="linux/">linux</a><a href="./win/">w</a><a href="docs/">d</a>"#;
        assert_eq!(
            detect_os_directories(html),
            vec![
                ("linux".to_string(), "linux".to_string()),
                ("windows".to_string(), "win".to_string())
            ]
        );
    }

    #[test]
    fn test_infer_templates_from_relative_href() {
        let templates = infer_templates(
            "release/linux/v3-linux-amd64.pwr",
            "https://m.example/files",
            "https://m.example",
        )
        .unwrap();
        assert_eq!(templates.full, "{base}/files/{branch}/{os}/v{version}-{os}-{arch}.pwr");
        assert_eq!(templates.diff, "{base}/files/{branch}/{os}/v{from}~{to}-{os}-{arch}.pwr");
        assert!(templates.has_branch);
        assert!(templates.mapping.os.is_empty());
    }

    #[test]
    fn test_infer_templates_records_token_mapping() {
        let templates = infer_templates(
            "https://m.example/dl/win/v3-win-x64.zip",
            "https://m.example",
            "https://m.example",
        )
        .unwrap();
        assert_eq!(templates.full, "{base}/dl/{os}/v{version}-{os}-{arch}.zip");
        assert_eq!(templates.mapping.os.get("windows").map(String::as_str), Some("win"));
        assert_eq!(templates.mapping.arch.get("amd64").map(String::as_str), Some("x64"));
    }

    #[test]
    fn test_infer_templates_rejects_foreign_host() {
        assert!(infer_templates("https://cdn.other/v3-linux-amd64.pwr", "https://m.example", "https://m.example").is_none());
    }
}
