//! CLI command implementations

pub mod fake;
pub mod stats;
