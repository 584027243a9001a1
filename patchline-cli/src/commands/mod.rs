//! CLI command implementations.

pub mod common;
pub mod config;
pub mod mirrors;
pub mod speedtest;
pub mod versions;
