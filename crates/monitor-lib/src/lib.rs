//! Monitor library for the notebook container fleet
//!
//! This crate provides the core functionality for:
//! - Periodic reaping of idle, stale and unused containers
//! - Kernel activity probing over the notebook server API
//! - Append-only per-course event and counts telemetry
//! - Aggregation of raw telemetry into course usage statistics
//! - Health checks and observability

pub mod courses;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod policy;
pub mod probe;
pub mod runtime;
pub mod stats;
pub mod system;
pub mod telemetry;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{CycleOutcome, Monitor, MonitorBuilder, MonitorConfig};
pub use observability::{MonitorMetrics, StructuredLogger};
