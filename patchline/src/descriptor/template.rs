//! URL template expansion.

/// Values substituted into a descriptor URL template.
///
/// Placeholders whose value is `None` are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub base: &'a str,
    pub os: &'a str,
    pub arch: &'a str,
    pub branch: &'a str,
    pub version: Option<u32>,
    pub from: Option<u32>,
    pub to: Option<u32>,
}

impl<'a> TemplateVars<'a> {
    pub fn new(base: &'a str, os: &'a str, arch: &'a str, branch: &'a str) -> Self {
        Self {
            base,
            os,
            arch,
            branch,
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_diff(mut self, from: u32, to: u32) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// Expand `{base}`, `{os}`, `{arch}`, `{branch}`, `{version}`, `{from}`
/// and `{to}` in `template`.
///
/// A trailing `/` on the base is dropped so `{base}/path` never doubles it.
///
/// ```
/// use patchline::descriptor::{expand, TemplateVars};
///
/// let vars = TemplateVars::new("https://m.example/", "linux", "amd64", "release").with_version(5);
/// assert_eq!(
///     expand("{base}/dl/{os}/{arch}/{version}.pwr", &vars),
///     "https://m.example/dl/linux/amd64/5.pwr"
/// );
/// ```
pub fn expand(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut out = template
        .replace("{base}", vars.base.trim_end_matches('/'))
        .replace("{os}", vars.os)
        .replace("{arch}", vars.arch)
        .replace("{branch}", vars.branch);

    for (placeholder, value) in [
        ("{version}", vars.version),
        ("{from}", vars.from),
        ("{to}", vars.to),
    ] {
        if let Some(value) = value {
            out = out.replace(placeholder, &value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_build_template() {
        let vars = TemplateVars::new("https://m.example", "linux", "amd64", "release").with_version(5);
        assert_eq!(
            expand("{base}/dl/{os}/{arch}/{version}.pwr", &vars),
            "https://m.example/dl/linux/amd64/5.pwr"
        );
    }

    #[test]
    fn test_diff_template() {
        let vars = TemplateVars::new("https://m.example", "windows", "amd64", "pre-release")
            .with_diff(2, 5);
        assert_eq!(
            expand("{base}/{branch}/v{from}~{to}-{os}-{arch}.pwr", &vars),
            "https://m.example/pre-release/v2~5-windows-amd64.pwr"
        );
    }

    #[test]
    fn test_unset_placeholders_survive() {
        let vars = TemplateVars::new("https://m.example", "linux", "amd64", "release");
        assert_eq!(expand("{base}/{version}", &vars), "https://m.example/{version}");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_expanded_urls_contain_no_known_placeholders(
                version in 0u32..1_000_000,
                os in "[a-z]{3,8}",
                branch in "[a-z-]{1,12}"
            ) {
                let vars = TemplateVars::new("https://h", &os, "amd64", &branch)
                    .with_version(version)
                    .with_diff(version, version + 1);
                let out = expand("{base}/{branch}/{os}/{arch}/{version}/{from}/{to}", &vars);
                prop_assert!(!out.contains('{'), "unexpanded placeholder in {}", out);
                let expected_suffix = format!("/{}/{}/{}", version, version, version + 1);
                prop_assert!(out.ends_with(&expected_suffix));
            }
        }
    }
}
