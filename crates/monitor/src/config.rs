//! Monitor configuration

use anyhow::Result;
use serde::Deserialize;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Host name used in structured log events
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port for health/metrics/stats
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Root directory holding courses, students and raw telemetry
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Podman system service endpoint
    #[serde(default = "default_podman_url")]
    pub podman_url: String,

    /// Host the containers' published ports are reachable on
    #[serde(default = "default_probe_host")]
    pub probe_host: String,

    /// Timeout for one kernel-API probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for one container-runtime call in seconds
    #[serde(default = "default_runtime_timeout")]
    pub runtime_timeout_secs: u64,

    /// Time between two monitoring cycles in seconds
    #[serde(default = "default_period")]
    pub period_secs: u64,

    /// Running containers quiet for longer than this are killed (seconds)
    #[serde(default = "default_idle_cutoff")]
    pub idle_cutoff_secs: u64,

    /// Stopped containers older than this are removed (seconds)
    #[serde(default = "default_unused_cutoff")]
    pub unused_cutoff_secs: u64,

    /// Student names without a dot and shorter than this are artefacts
    #[serde(default = "default_artefact_min_len")]
    pub artefact_min_len: usize,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_root() -> String {
    "/var/lib/nbfleet".to_string()
}

fn default_podman_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_runtime_timeout() -> u64 {
    30
}

fn default_period() -> u64 {
    10 * 60
}

fn default_idle_cutoff() -> u64 {
    30 * 60
}

fn default_unused_cutoff() -> u64 {
    7 * 24 * 3600
}

fn default_artefact_min_len() -> usize {
    monitor_lib::stats::DEFAULT_MIN_HASH_LEN
}

impl MonitorSettings {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("NBFLEET"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| MonitorSettings {
            host_name: default_host_name(),
            api_port: default_api_port(),
            data_root: default_data_root(),
            podman_url: default_podman_url(),
            probe_host: default_probe_host(),
            probe_timeout_secs: default_probe_timeout(),
            runtime_timeout_secs: default_runtime_timeout(),
            period_secs: default_period(),
            idle_cutoff_secs: default_idle_cutoff(),
            unused_cutoff_secs: default_unused_cutoff(),
            artefact_min_len: default_artefact_min_len(),
        }))
    }
}
