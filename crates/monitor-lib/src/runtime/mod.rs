//! Container runtime access
//!
//! The monitor only ever lists, kills, removes and resolves images; the
//! trait keeps it independent from the concrete runtime and lets tests
//! drive cycles against a scripted fleet.

mod podman;

pub use podman::PodmanRuntime;

use crate::models::ContainerHandle;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// A runtime call failed; recoverable per container, fatal to the cycle
/// only when listing fails
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("runtime returned status {status} for {operation}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("invalid runtime url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List every container on the host, running or not
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>, RuntimeError>;

    async fn kill_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Resolve an image reference to its content id
    async fn resolve_image(&self, reference: &str) -> Result<String, RuntimeError>;

    /// Filesystem path holding container storage, for disk accounting
    async fn storage_root(&self) -> Result<PathBuf, RuntimeError>;
}
