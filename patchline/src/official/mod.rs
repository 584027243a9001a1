//! The authenticated vendor source.
//!
//! Queries `GET {api_base}/patches/{os}/{arch}/{branch}/{fromBuild}` with a
//! bearer token. `fromBuild = 0` answers the newest full build as a single
//! step; `fromBuild = 1` answers the full incremental chain.
//!
//! Login is external: sessions come from an [`AuthProvider`] and the
//! availability check consults a [`ProfileProvider`] without touching the
//! network.

mod auth;
mod config;
mod snapshot;
mod source;

pub use auth::{AuthProvider, FileSessionProvider, Profile, ProfileProvider, Session};
pub use config::{OfficialConfig, DESKTOP_USER_AGENT};
pub use snapshot::{record_chain, PatchSnapshot};
pub use source::{OfficialSource, OFFICIAL_SOURCE_ID};
