//! URL normalization and candidate base URLs.

use url::Url;

use super::error::{DiscoveryError, DiscoveryResult};

/// Parse user input into an http(s) URL.
///
/// A missing scheme defaults to https. Query, fragment and trailing
/// slashes are dropped.
pub fn normalize(input: &str) -> DiscoveryResult<Url> {
    let trimmed = input.trim();
    let invalid = |reason: String| DiscoveryError::InvalidUrl {
        input: input.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("empty input".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(invalid("missing host".to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}

/// Base URL without a trailing slash.
pub fn display_base(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Candidate base URLs, most specific first.
///
/// The full path, then the bare authority, then every shorter parent path.
pub fn candidates(url: &Url) -> Vec<String> {
    let mut authority = url.clone();
    authority.set_path("");
    let authority = display_base(&authority);

    let mut out = vec![display_base(url), authority.clone()];

    let segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    for len in (1..segments.len()).rev() {
        out.push(format!("{}/{}", authority, segments[..len].join("/")));
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|candidate| seen.insert(candidate.clone()));
    out
}

/// Host name used to derive the descriptor id and name.
pub fn host_label(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => "mirror".to_string(),
    }
}
