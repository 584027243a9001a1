//! Multi-source aggregation.
//!
//! [`SourceAggregator`] holds the vendor source and every mirror ordered by
//! priority. It merges version lists (persisting the merged result to a
//! small JSON cache), tracks whether the vendor is currently being served
//! by mirrors, computes patch sequences, and resolves download URLs with a
//! cache, then sources, then forced-refresh fallback.

mod error;
mod sources;
mod version_cache;

pub use error::{Artifact, ResolveError, ResolveResult};
pub use sources::{merge_versions, walk_chain, SourceAggregator};
pub use version_cache::{CachedBranch, VersionCache};
