//! On-disk descriptor document.

use serde::{Deserialize, Serialize};

use super::error::{DescriptorError, DescriptorResult};
use super::types::{
    CacheConfig, JsonIndexConfig, MirrorDescriptor, MirrorProtocol, PatternConfig, ProtocolKind,
    SpeedTestConfig, DEFAULT_PRIORITY,
};

/// Newest descriptor schema this build understands.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema() -> u32 {
    SCHEMA_VERSION
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

/// Descriptor as stored in `{id}.json`.
///
/// Absent optional fields take safe defaults. Conversion into
/// [`MirrorDescriptor`] enforces that exactly one payload is present and
/// that it matches `sourceType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorFile {
    #[serde(default = "default_schema")]
    pub schema_version: u32,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub source_type: ProtocolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_index: Option<JsonIndexConfig>,
    #[serde(default)]
    pub speed_test: SpeedTestConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl TryFrom<DescriptorFile> for MirrorDescriptor {
    type Error = DescriptorError;

    fn try_from(file: DescriptorFile) -> DescriptorResult<Self> {
        if file.schema_version > SCHEMA_VERSION {
            return Err(DescriptorError::UnsupportedSchema {
                found: file.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        let declared = file.source_type;
        let protocol = match (declared, file.pattern, file.json_index) {
            (ProtocolKind::Pattern, Some(pattern), None) => MirrorProtocol::Pattern(pattern),
            (ProtocolKind::JsonIndex, None, Some(index)) => MirrorProtocol::JsonIndex(index),
            (_, Some(_), Some(_)) => {
                return Err(DescriptorError::TypeMismatch {
                    declared,
                    reason: "both pattern and jsonIndex are present".to_string(),
                })
            }
            (ProtocolKind::Pattern, None, _) => {
                return Err(DescriptorError::TypeMismatch {
                    declared,
                    reason: "pattern is missing".to_string(),
                })
            }
            (ProtocolKind::JsonIndex, _, None) => {
                return Err(DescriptorError::TypeMismatch {
                    declared,
                    reason: "jsonIndex is missing".to_string(),
                })
            }
        };

        let descriptor = MirrorDescriptor {
            id: file.id,
            name: file.name,
            description: file.description,
            priority: file.priority,
            enabled: file.enabled,
            protocol,
            speed_test: file.speed_test,
            cache: file.cache,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

impl From<&MirrorDescriptor> for DescriptorFile {
    fn from(descriptor: &MirrorDescriptor) -> Self {
        let (pattern, json_index) = match &descriptor.protocol {
            MirrorProtocol::Pattern(p) => (Some(p.clone()), None),
            MirrorProtocol::JsonIndex(j) => (None, Some(j.clone())),
        };
        Self {
            schema_version: SCHEMA_VERSION,
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            priority: descriptor.priority,
            enabled: descriptor.enabled,
            source_type: descriptor.protocol.kind(),
            pattern,
            json_index,
            speed_test: descriptor.speed_test.clone(),
            cache: descriptor.cache.clone(),
        }
    }
}
