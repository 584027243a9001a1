//! Validated descriptor types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{DescriptorError, DescriptorResult};
use super::file::DescriptorFile;

/// Priority given to generated descriptors. Lower wins.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Default lifetime of discovered version lists and index blobs.
pub const DEFAULT_INDEX_TTL_MINUTES: u64 = 30;

/// Default lifetime of a speed test result.
pub const DEFAULT_SPEED_TEST_TTL_MINUTES: u64 = 60;

/// Default ping timeout for mirror speed tests.
const DEFAULT_PING_TIMEOUT_SECS: u64 = 5;

/// Protocol discriminant as written in descriptor files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    Pattern,
    JsonIndex,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Pattern => write!(f, "pattern"),
            ProtocolKind::JsonIndex => write!(f, "json-index"),
        }
    }
}

/// How a pattern mirror finds the versions it hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum VersionDiscovery {
    /// Fetch a JSON document and read versions at `json_path`.
    ///
    /// Supported path shapes: `items[].version`, dotted nested keys
    /// (`{os}-{arch}.{branch}.newest`), a named top-level array
    /// (`versions`), or the empty path for a root array.
    #[serde(rename_all = "camelCase")]
    JsonApi { url: String, json_path: String },

    /// Fetch a directory listing and extract versions with a regex.
    ///
    /// Capture group 1 is the version; an optional group 2 is the entry
    /// size in bytes, compared against `min_file_size`. `{os}`, `{arch}`
    /// and `{branch}` in the pattern are replaced with escaped values.
    #[serde(rename_all = "camelCase")]
    HtmlAutoindex {
        url: String,
        pattern: String,
        #[serde(default)]
        min_file_size: u64,
    },

    /// A fixed list embedded in the descriptor. No network access.
    #[serde(rename_all = "camelCase")]
    StaticList {
        #[serde(default)]
        versions: Vec<u32>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        branches: BTreeMap<String, Vec<u32>>,
    },
}

/// URL-template protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternConfig {
    pub base_url: String,
    pub full_build_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub os_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arch_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_mapping: BTreeMap<String, String>,
    pub version_discovery: VersionDiscovery,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_based_branches: Vec<String>,
}

impl PatternConfig {
    /// A config with the given templates and no remapping.
    pub fn new(
        base_url: impl Into<String>,
        full_build_url: impl Into<String>,
        version_discovery: VersionDiscovery,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            full_build_url: full_build_url.into(),
            diff_url: None,
            signature_url: None,
            os_mapping: BTreeMap::new(),
            arch_mapping: BTreeMap::new(),
            branch_mapping: BTreeMap::new(),
            version_discovery,
            diff_based_branches: Vec::new(),
        }
    }

    pub fn map_os<'a>(&'a self, os: &'a str) -> &'a str {
        self.os_mapping.get(os).map(String::as_str).unwrap_or(os)
    }

    pub fn map_arch<'a>(&'a self, arch: &'a str) -> &'a str {
        self.arch_mapping.get(arch).map(String::as_str).unwrap_or(arch)
    }

    pub fn map_branch<'a>(&'a self, branch: &'a str) -> &'a str {
        self.branch_mapping
            .get(branch)
            .map(String::as_str)
            .unwrap_or(branch)
    }
}

/// Layout of the per-platform object in a json-index document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStructure {
    /// `{ filename: url }` directly under the platform.
    #[default]
    Flat,
    /// `{ group: { filename: url } }` with separate base and patch groups.
    Grouped,
}

/// Filename templates used to look up specific artifacts in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTemplates {
    pub full: String,
    pub diff: String,
}

impl Default for FileTemplates {
    fn default() -> Self {
        Self {
            full: "v{version}-{os}-{arch}.pwr".to_string(),
            diff: "v{from}~{to}-{os}-{arch}.pwr".to_string(),
        }
    }
}

fn default_base_group() -> String {
    "base".to_string()
}

fn default_patch_group() -> String {
    "patch".to_string()
}

/// Single-endpoint JSON index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonIndexConfig {
    pub api_url: String,
    pub root_path: String,
    #[serde(default)]
    pub structure: IndexStructure,
    /// Maps `{os}-{arch}` (or a bare os) to the platform key in the index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub platform_mapping: BTreeMap<String, String>,
    #[serde(default = "default_base_group")]
    pub base_group: String,
    #[serde(default = "default_patch_group")]
    pub patch_group: String,
    #[serde(default)]
    pub file_templates: FileTemplates,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_based_branches: Vec<String>,
}

impl JsonIndexConfig {
    pub fn new(api_url: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            root_path: root_path.into(),
            structure: IndexStructure::Flat,
            platform_mapping: BTreeMap::new(),
            base_group: default_base_group(),
            patch_group: default_patch_group(),
            file_templates: FileTemplates::default(),
            diff_based_branches: Vec::new(),
        }
    }

    /// Platform key for an os/arch pair.
    pub fn platform_key(&self, os: &str, arch: &str) -> String {
        let combined = format!("{}-{}", os, arch);
        self.platform_mapping
            .get(&combined)
            .or_else(|| self.platform_mapping.get(os))
            .cloned()
            .unwrap_or(combined)
    }
}

/// Speed test settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTestConfig {
    /// URL pinged for latency; the base or API URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_url: Option<String>,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_SECS
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            ping_url: None,
            ping_timeout_seconds: DEFAULT_PING_TIMEOUT_SECS,
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_index_ttl")]
    pub index_ttl_minutes: u64,
    #[serde(default = "default_speed_ttl")]
    pub speed_test_ttl_minutes: u64,
}

fn default_index_ttl() -> u64 {
    DEFAULT_INDEX_TTL_MINUTES
}

fn default_speed_ttl() -> u64 {
    DEFAULT_SPEED_TEST_TTL_MINUTES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            index_ttl_minutes: DEFAULT_INDEX_TTL_MINUTES,
            speed_test_ttl_minutes: DEFAULT_SPEED_TEST_TTL_MINUTES,
        }
    }
}

/// The protocol a mirror speaks, with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorProtocol {
    Pattern(PatternConfig),
    JsonIndex(JsonIndexConfig),
}

impl MirrorProtocol {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            MirrorProtocol::Pattern(_) => ProtocolKind::Pattern,
            MirrorProtocol::JsonIndex(_) => ProtocolKind::JsonIndex,
        }
    }
}

/// A validated mirror descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Lower values are consulted first.
    pub priority: i32,
    pub enabled: bool,
    pub protocol: MirrorProtocol,
    pub speed_test: SpeedTestConfig,
    pub cache: CacheConfig,
}

impl MirrorDescriptor {
    /// A descriptor with safe defaults for the given protocol.
    pub fn new(id: impl Into<String>, name: impl Into<String>, protocol: MirrorProtocol) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            priority: DEFAULT_PRIORITY,
            enabled: true,
            protocol,
            speed_test: SpeedTestConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Parse and validate a descriptor document.
    pub fn from_json(json: &str) -> DescriptorResult<Self> {
        let file: DescriptorFile =
            serde_json::from_str(json).map_err(|e| DescriptorError::Json(e.to_string()))?;
        Self::try_from(file)
    }

    /// Serialize to the on-disk document.
    pub fn to_json_pretty(&self) -> DescriptorResult<String> {
        serde_json::to_string_pretty(&DescriptorFile::from(self))
            .map_err(|e| DescriptorError::Json(e.to_string()))
    }

    /// Whether `branch` is served through diffs on this mirror.
    pub fn is_diff_based_branch(&self, branch: &str) -> bool {
        let branches = match &self.protocol {
            MirrorProtocol::Pattern(p) => &p.diff_based_branches,
            MirrorProtocol::JsonIndex(j) => &j.diff_based_branches,
        };
        branches.iter().any(|b| b.eq_ignore_ascii_case(branch))
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.index_ttl_minutes.max(1) * 60)
    }

    pub fn speed_test_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.speed_test_ttl_minutes.max(1) * 60)
    }

    /// Check the invariants every loaded or saved descriptor must hold.
    pub fn validate(&self) -> DescriptorResult<()> {
        if self.id.is_empty() {
            if self.enabled {
                return Err(DescriptorError::MissingId);
            }
        } else if !is_safe_id(&self.id) {
            return Err(DescriptorError::InvalidId(self.id.clone()));
        }

        match &self.protocol {
            MirrorProtocol::Pattern(p) => {
                if p.base_url.trim().is_empty() {
                    return Err(DescriptorError::InvalidConfig(
                        "pattern.baseUrl is empty".to_string(),
                    ));
                }
                if p.full_build_url.trim().is_empty() {
                    return Err(DescriptorError::InvalidConfig(
                        "pattern.fullBuildUrl is empty".to_string(),
                    ));
                }
                if let VersionDiscovery::HtmlAutoindex { pattern, .. } = &p.version_discovery {
                    let probe = pattern
                        .replace("{os}", "x")
                        .replace("{arch}", "x")
                        .replace("{branch}", "x");
                    Regex::new(&probe).map_err(|e| {
                        DescriptorError::InvalidConfig(format!("invalid autoindex pattern: {}", e))
                    })?;
                }
            }
            MirrorProtocol::JsonIndex(j) => {
                if j.api_url.trim().is_empty() {
                    return Err(DescriptorError::InvalidConfig(
                        "jsonIndex.apiUrl is empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn safe_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap())
}

/// True when `id` can be used verbatim as a file stem.
pub fn is_safe_id(id: &str) -> bool {
    safe_id_pattern().is_match(id)
}

/// Turn arbitrary text (typically a host name) into a safe id.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "mirror".to_string()
    } else {
        slug.chars().take(128).collect()
    }
}
