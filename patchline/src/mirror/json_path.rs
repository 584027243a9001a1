//! Minimal path language for reading version numbers out of JSON.
//!
//! Supported shapes:
//!
//! | path                         | document                                      |
//! |------------------------------|-----------------------------------------------|
//! | `""` or `$`                  | `[1, 2, 3]`                                   |
//! | `versions`                   | `{"versions": [1, 2, 3]}`                     |
//! | `items[].version`            | `{"items": [{"version": 1}, ...]}`            |
//! | `linux-amd64.release.newest` | `{"linux-amd64": {"release": {"newest": 5}}}` |
//!
//! A path segment ending in `[]` fans out over an array. Leaf values may be
//! numbers, numeric strings (an optional leading `v` is accepted), arrays of
//! those, or objects carrying a `version`/`build` field.

use serde_json::Value;

/// Collect every version number addressed by `path`, sorted and deduplicated.
pub fn extract_versions(document: &Value, path: &str) -> Vec<u32> {
    let mut current: Vec<&Value> = vec![document];

    let path = path.trim();
    if !path.is_empty() && path != "$" {
        for segment in path.trim_start_matches("$.").split('.') {
            let (key, fan_out) = match segment.strip_suffix("[]") {
                Some(key) => (key, true),
                None => (segment, false),
            };

            let mut next = Vec::new();
            for value in current {
                let selected = if key.is_empty() {
                    Some(value)
                } else {
                    value.get(key)
                };
                match (selected, fan_out) {
                    (Some(Value::Array(items)), true) => next.extend(items.iter()),
                    (Some(value), false) => next.push(value),
                    _ => {}
                }
            }
            current = next;
        }
    }

    let mut versions = Vec::new();
    for value in current {
        collect(value, &mut versions);
    }
    versions.sort_unstable();
    versions.dedup();
    versions
}

fn collect(value: &Value, out: &mut Vec<u32>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_scalar(item, out)),
        other => collect_scalar(other, out),
    }
}

fn collect_scalar(value: &Value, out: &mut Vec<u32>) {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                out.push(v);
            }
        }
        Value::String(s) => {
            if let Ok(v) = s.trim().trim_start_matches('v').parse::<u32>() {
                out.push(v);
            }
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("version").or_else(|| map.get("build")) {
                collect_scalar(inner, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_array() {
        assert_eq!(extract_versions(&json!([3, 1, 2, 3]), ""), vec![1, 2, 3]);
        assert_eq!(extract_versions(&json!(["v4", "5"]), "$"), vec![4, 5]);
    }

    #[test]
    fn test_named_top_level_array() {
        let doc = json!({ "versions": [10, 11], "other": [99] });
        assert_eq!(extract_versions(&doc, "versions"), vec![10, 11]);
    }

    #[test]
    fn test_array_of_objects() {
        let doc = json!({ "items": [{ "version": 7 }, { "version": "8" }, { "name": "x" }] });
        assert_eq!(extract_versions(&doc, "items[].version"), vec![7, 8]);
    }

    #[test]
    fn test_nested_scalar_and_array() {
        let doc = json!({
            "linux-amd64": {
                "release": { "newest": 5 },
                "pre-release": { "newest": [6, 7] }
            }
        });
        assert_eq!(extract_versions(&doc, "linux-amd64.release.newest"), vec![5]);
        assert_eq!(extract_versions(&doc, "linux-amd64.pre-release.newest"), vec![6, 7]);
    }

    #[test]
    fn test_objects_with_version_field_at_leaf() {
        let doc = json!({ "builds": [{ "build": 3 }, { "version": 4 }] });
        assert_eq!(extract_versions(&doc, "builds"), vec![3, 4]);
    }

    #[test]
    fn test_missing_path_is_empty() {
        let doc = json!({ "versions": [1] });
        assert!(extract_versions(&doc, "missing.path").is_empty());
        assert!(extract_versions(&doc, "versions[].x").is_empty());
    }
}
