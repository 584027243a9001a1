//! Descriptor validation errors.

use thiserror::Error;

use super::types::ProtocolKind;

/// Result type for descriptor operations.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Reasons a descriptor is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// The document is not valid descriptor JSON.
    #[error("invalid descriptor JSON: {0}")]
    Json(String),

    /// The document was written by a newer schema.
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// An enabled descriptor has no id.
    #[error("enabled descriptor has an empty id")]
    MissingId,

    /// The id cannot be used as a file name.
    #[error("descriptor id '{0}' is not filesystem-safe")]
    InvalidId(String),

    /// `sourceType` and the populated payload disagree.
    #[error("sourceType '{declared}' does not match payload: {reason}")]
    TypeMismatch {
        declared: ProtocolKind,
        reason: String,
    },

    /// A required protocol field is missing or empty.
    #[error("invalid descriptor configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = DescriptorError::TypeMismatch {
            declared: ProtocolKind::JsonIndex,
            reason: "jsonIndex is missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "sourceType 'json-index' does not match payload: jsonIndex is missing"
        );
    }
}
