//! Detection strategies and the discovery report.

use std::fmt;

use crate::descriptor::MirrorDescriptor;

/// Detection strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// A JSON document keyed by platform, then branch, exposing newest builds.
    VendorInfo,
    /// A single JSON index listing artifact files per branch and platform.
    JsonIndex,
    /// A JSON version list.
    JsonApi,
    /// An html directory listing with artifact links.
    HtmlAutoindex,
    /// A launcher-style patch API.
    LauncherApi,
    /// A static directory listing under common download paths.
    StaticListing,
    /// A page that only links to per-OS subdirectories.
    OsDirectories,
}

impl Strategy {
    pub const ORDER: [Strategy; 7] = [
        Strategy::VendorInfo,
        Strategy::JsonIndex,
        Strategy::JsonApi,
        Strategy::HtmlAutoindex,
        Strategy::LauncherApi,
        Strategy::StaticListing,
        Strategy::OsDirectories,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::VendorInfo => "vendor-info",
            Strategy::JsonIndex => "json-index",
            Strategy::JsonApi => "json-api",
            Strategy::HtmlAutoindex => "html-autoindex",
            Strategy::LauncherApi => "launcher-api",
            Strategy::StaticListing => "static-listing",
            Strategy::OsDirectories => "os-directories",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A successful discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryReport {
    pub descriptor: MirrorDescriptor,
    pub strategy: Strategy,
    /// The candidate base URL that answered.
    pub candidate: String,
    /// The URL whose response confirmed the strategy.
    pub probe_url: String,
}
