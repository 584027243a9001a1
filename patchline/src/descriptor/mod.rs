//! Mirror descriptors.
//!
//! A descriptor is the configuration file describing one mirror: its
//! identity, priority, and the protocol the generic engine should speak to
//! it. Two protocols exist:
//!
//! - **pattern**: artifact URLs are built from templates; versions are found
//!   through a pluggable [`VersionDiscovery`] method
//! - **json-index**: one API document lists every artifact per branch and
//!   platform
//!
//! On disk the protocol is a `sourceType` discriminant plus one matching
//! payload object. In memory it is the tagged [`MirrorProtocol`] variant;
//! files whose discriminant and payload disagree are rejected during
//! conversion and never reach the engine.

mod error;
mod file;
mod template;
mod types;

pub use error::{DescriptorError, DescriptorResult};
pub use file::{DescriptorFile, SCHEMA_VERSION};
pub use template::{expand, TemplateVars};
pub use types::{
    is_safe_id, slugify, CacheConfig, FileTemplates, IndexStructure, JsonIndexConfig,
    MirrorDescriptor, MirrorProtocol, PatternConfig, ProtocolKind, SpeedTestConfig,
    VersionDiscovery, DEFAULT_INDEX_TTL_MINUTES, DEFAULT_PRIORITY, DEFAULT_SPEED_TEST_TTL_MINUTES,
};
