//! Json-index mode: one document lists every artifact.
//!
//! The document is addressed `rootPath → branch → platform [→ group]` and
//! ends in `{ filename: url }` maps. Version numbers come from the
//! filenames themselves.

use serde_json::{Map, Value};

use crate::descriptor::{expand, IndexStructure, JsonIndexConfig, TemplateVars};
use crate::model::{Platform, VersionEntry};
use crate::naming::ArtifactName;

/// Every `filename → url` pair listed for a branch and platform.
pub fn files<'a>(
    index: &'a Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
) -> Vec<(&'a str, &'a str)> {
    let Some(node) = platform_node(index, config, platform, branch) else {
        return Vec::new();
    };

    match config.structure {
        IndexStructure::Flat => url_pairs(node),
        IndexStructure::Grouped => [&config.base_group, &config.patch_group]
            .into_iter()
            .filter_map(|group| node.get(group.as_str()).and_then(Value::as_object))
            .flat_map(url_pairs)
            .collect(),
    }
}

/// Entries parsed from the listing.
///
/// Full builds are always returned; diffs only when `include_diffs`.
pub fn entries(
    index: &Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
    include_diffs: bool,
) -> Vec<VersionEntry> {
    files(index, config, platform, branch)
        .into_iter()
        .filter_map(|(filename, url)| {
            let name = ArtifactName::parse(filename)?;
            if !name.matches_platform(&platform.os, &platform.arch) {
                return None;
            }
            if name.is_diff() {
                include_diffs.then(|| VersionEntry::diff(name.from_version(), name.version(), url))
            } else {
                Some(VersionEntry::full(name.version(), url))
            }
        })
        .collect()
}

/// URL of a specific full build, looked up through the filename template.
pub fn full_build_url(
    index: &Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
    version: u32,
) -> Option<String> {
    let vars = TemplateVars::new("", &platform.os, &platform.arch, branch).with_version(version);
    lookup(index, config, platform, branch, &expand(&config.file_templates.full, &vars))
}

/// URL of a specific diff, looked up through the filename template.
pub fn diff_url(
    index: &Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
    from: u32,
    to: u32,
) -> Option<String> {
    let vars = TemplateVars::new("", &platform.os, &platform.arch, branch).with_diff(from, to);
    lookup(index, config, platform, branch, &expand(&config.file_templates.diff, &vars))
}

fn lookup(
    index: &Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
    filename: &str,
) -> Option<String> {
    files(index, config, platform, branch)
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(filename))
        .map(|(_, url)| url.to_string())
}

fn platform_node<'a>(
    index: &'a Value,
    config: &JsonIndexConfig,
    platform: &Platform,
    branch: &str,
) -> Option<&'a Map<String, Value>> {
    let mut node = index;
    for key in config.root_path.split('.').filter(|k| !k.is_empty()) {
        node = node.get(key)?;
    }
    node.get(branch)?
        .get(config.platform_key(&platform.os, &platform.arch))?
        .as_object()
}

fn url_pairs(map: &Map<String, Value>) -> Vec<(&str, &str)> {
    map.iter()
        .filter_map(|(name, url)| Some((name.as_str(), url.as_str()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat_config() -> JsonIndexConfig {
        JsonIndexConfig::new("https://x/api.json", "builds")
    }

    #[test]
    fn test_single_full_build_entry() {
        let index = json!({
            "builds": { "release": { "linux-amd64": { "v3-linux-amd64.pwr": "https://x/3" } } }
        });
        let list = entries(
            &index,
            &flat_config(),
            &Platform::new("linux", "amd64"),
            "release",
            false,
        );
        assert_eq!(list, vec![VersionEntry::full(3, "https://x/3")]);
    }

    #[test]
    fn test_grouped_structure_and_diffs() {
        let mut config = flat_config();
        config.structure = IndexStructure::Grouped;
        let index = json!({
            "builds": { "pre-release": { "linux-amd64": {
                "base": { "v5-linux-amd64.pwr": "https://x/5" },
                "patch": {
                    "v4~5-linux-amd64.pwr": "https://x/4-5",
                    "notes.txt": "https://x/notes"
                }
            } } }
        });
        let platform = Platform::new("linux", "amd64");

        let full_only = entries(&index, &config, &platform, "pre-release", false);
        assert_eq!(full_only.len(), 1);

        let with_diffs = entries(&index, &config, &platform, "pre-release", true);
        assert!(with_diffs.contains(&VersionEntry::diff(4, 5, "https://x/4-5")));
        assert_eq!(with_diffs.len(), 2);
    }

    #[test]
    fn test_platform_mapping_and_template_lookup() {
        let mut config = flat_config();
        config
            .platform_mapping
            .insert("windows-amd64".to_string(), "win64".to_string());
        let index = json!({
            "builds": { "release": { "win64": {
                "v7-windows-amd64.pwr": "https://x/7",
                "v6~7-windows-amd64.pwr": "https://x/6-7"
            } } }
        });
        let platform = Platform::new("windows", "amd64");

        assert_eq!(
            full_build_url(&index, &config, &platform, "release", 7).as_deref(),
            Some("https://x/7")
        );
        assert_eq!(
            diff_url(&index, &config, &platform, "release", 6, 7).as_deref(),
            Some("https://x/6-7")
        );
        assert!(full_build_url(&index, &config, &platform, "release", 8).is_none());
    }

    #[test]
    fn test_missing_branch_is_empty() {
        let index = json!({ "builds": {} });
        assert!(entries(
            &index,
            &flat_config(),
            &Platform::new("linux", "amd64"),
            "release",
            true
        )
        .is_empty());
    }
}
