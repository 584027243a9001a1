//! Core data types shared by every source.

mod platform;
mod speed;
mod version;

pub use platform::{BranchKey, Platform, PatchQuery};
pub use speed::SpeedTestResult;
pub use version::{sort_descending, PatchStep, SourceType, VersionEntry};
