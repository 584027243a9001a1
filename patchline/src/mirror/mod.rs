//! Generic descriptor-driven mirror engine.
//!
//! One [`MirrorSource`] type serves every third-party mirror. Its
//! behaviour comes from the descriptor's protocol:
//!
//! - **pattern**: artifact URLs are expanded from templates after
//!   remapping os/arch/branch tokens; versions come from a json-api
//!   document, an html directory listing, or a static list
//! - **json-index**: a single document is fetched and walked; version
//!   numbers are recovered from artifact filenames
//!
//! Both modes cache discovered data for the descriptor's index TTL behind
//! one fetch lock per mirror.

mod chain;
mod engine;
mod json_index;
mod json_path;
mod pattern;

pub use chain::{contiguous_chain, full_build_steps};
pub use engine::MirrorSource;
pub use json_path::extract_versions;
pub use pattern::scan_autoindex;
