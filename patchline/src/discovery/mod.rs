//! Mirror protocol auto-discovery.
//!
//! Given any URL a user pastes, [`MirrorProber`] derives candidate base
//! URLs (the full path, the bare authority, then each shorter parent) and
//! runs a fixed list of detection strategies against each one:
//!
//! 1. vendor info/patches JSON keyed by platform and branch
//! 2. a single JSON index of artifact files
//! 3. a JSON version list
//! 4. an html directory listing with artifact links
//! 5. a launcher-style patch API (400/422 still proves the route exists)
//! 6. a static listing under common download paths
//! 7. a page linking only to per-OS subdirectories
//!
//! The first hit produces a complete [`MirrorDescriptor`](crate::descriptor::MirrorDescriptor)
//! with default priority, TTLs and speed test settings. Probe failures are
//! swallowed; only when every pairing fails is a single
//! [`DiscoveryError::Exhausted`] returned, listing each attempt.

mod candidates;
mod error;
mod prober;
mod report;
mod shapes;

pub use candidates::{candidates, normalize};
pub use error::{DiscoveryError, DiscoveryResult, ProbeAttempt};
pub use prober::{MirrorProber, PROBE_TIMEOUT};
pub use report::{DiscoveryReport, Strategy};
