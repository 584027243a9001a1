//! Descriptor store errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Cannot list descriptors: {0}")]
    Glob(String),

    /// Another file already holds a descriptor with this id.
    #[error("Mirror id '{id}' is already used by {}", path.display())]
    DuplicateId { id: String, path: PathBuf },

    #[error("Mirror not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
