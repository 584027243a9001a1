//! Descriptor persistence.
//!
//! Mirrors are stored one descriptor per file under a single directory.
//! The store is plain file I/O keyed by mirror id; it owns no caches and
//! holds no locks, so concurrent writers are the caller's concern.

mod descriptors;
mod error;

pub use descriptors::DescriptorStore;
pub use error::{StoreError, StoreResult};
