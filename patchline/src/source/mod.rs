//! The source abstraction shared by the vendor API and every mirror.
//!
//! A [`VersionSource`] answers version, URL and patch-chain questions for
//! one origin. Sources never fail through this interface: an unreachable
//! origin yields an empty list or `None`, and callers move on to the next
//! source in priority order.
//!
//! Each source owns one [`FetchCache`], which pairs a TTL cache with the
//! single lock that serializes the source's network fetches.

mod cache;
mod speed;
mod traits;

pub use cache::FetchCache;
pub use speed::{measure_speed, SpeedSlot, MAX_SPEED_TEST_BYTES};
pub use traits::VersionSource;
