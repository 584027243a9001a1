//! Patchline - build and update artifact resolution for launcher clients.
//!
//! This library answers three questions for a client application:
//! which builds exist for a platform and branch, where each artifact can be
//! downloaded from, and which patch steps lead from an installed version to
//! a newer one.
//!
//! Artifacts may live on the authenticated vendor API or on any number of
//! independently operated mirrors. Mirrors are described by descriptor files
//! and interpreted at runtime by a single generic engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   load    ┌──────────────────────────────────────┐
//! │ DescriptorStore  │ ────────► │ MirrorSource (pattern / json-index)  │
//! └──────────────────┘           └──────────────────┬───────────────────┘
//!          ▲ save                                   │ VersionSource
//! ┌────────┴─────────┐           ┌──────────────────▼───────────────────┐
//! │ MirrorProber     │           │ SourceAggregator (priority ordered)  │
//! └──────────────────┘           └──────────────────▲───────────────────┘
//!                                                   │ VersionSource
//!                                ┌──────────────────┴───────────────────┐
//!                                │ OfficialSource (bearer auth, retry)  │
//!                                └──────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod http;
pub mod logging;
pub mod mirror;
pub mod model;
pub mod naming;
pub mod official;
pub mod source;
pub mod store;

/// Library version, recorded in on-disk caches.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
