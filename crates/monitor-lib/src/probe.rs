//! Kernel activity probing
//!
//! Each running container hosts a notebook server whose kernel API tells
//! us how many kernels are live and when each was last active. Probing
//! can legitimately find zero kernels (an empty, killable container);
//! that is a different outcome from a failed probe, which means we know
//! nothing and must not evict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Probe failure; the container's activity is unknown for this cycle
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("container has no published port")]
    NoPort,
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("kernel api returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed kernels payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// What a successful probe learned about one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelActivity {
    pub kernels: u32,
    /// Most recent activity across live kernels; `None` when no kernel
    /// is running at all
    pub last_activity: Option<DateTime<Utc>>,
}

/// One live kernel as reported by the kernel API
#[derive(Debug, Clone, Deserialize)]
pub struct KernelSession {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub last_activity: Option<String>,
}

#[async_trait]
pub trait ActivityProbe: Send + Sync {
    /// Query one container's kernel API through its published port
    async fn activity(&self, port: u16, token: &str) -> Result<KernelActivity, ProbeError>;
}

/// HTTP implementation of [`ActivityProbe`] against the notebook server
pub struct KernelProbe {
    client: Client,
    host: String,
}

impl KernelProbe {
    /// `timeout` bounds the whole request so one stuck container cannot
    /// stall a cycle.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }
}

#[async_trait]
impl ActivityProbe for KernelProbe {
    async fn activity(&self, port: u16, token: &str) -> Result<KernelActivity, ProbeError> {
        let url = format!("http://{}:{}/api/kernels?token={}", self.host, port, token);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }
        let body = response.text().await?;
        let kernels: Vec<KernelSession> = serde_json::from_str(&body)?;

        let last_activity = kernels.iter().map(kernel_last_activity).max();
        Ok(KernelActivity {
            kernels: kernels.len() as u32,
            last_activity,
        })
    }
}

/// A kernel with a missing or unparseable timestamp counts as active just
/// now; killing a session over a malformed timestamp is the one mistake
/// this must never make.
fn kernel_last_activity(kernel: &KernelSession) -> DateTime<Utc> {
    let Some(text) = &kernel.last_activity else {
        warn!(kernel = %kernel.id, "Kernel reports no last_activity, assuming now");
        return Utc::now();
    };
    match DateTime::parse_from_rfc3339(text) {
        Ok(instant) => instant.with_timezone(&Utc),
        Err(e) => {
            warn!(kernel = %kernel.id, raw = %text, error = %e,
                  "Unparseable last_activity, assuming now");
            Utc::now()
        }
    }
}
