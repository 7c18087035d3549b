//! nbfleet monitor - notebook container fleet reaper
//!
//! This binary runs next to the container runtime on a notebook host,
//! reclaiming idle containers and recording per-course telemetry.

use anyhow::{Context, Result};
use monitor_lib::{
    courses::FsCourseDirectory,
    health::{components, HealthRegistry},
    monitor::MonitorBuilder,
    observability::{MonitorMetrics, StructuredLogger},
    policy::PolicyThresholds,
    probe::KernelProbe,
    runtime::PodmanRuntime,
    system::SysinfoProbe,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting nbfleet-monitor");

    // Load configuration
    let settings = config::MonitorSettings::load()?;
    info!(
        data_root = %settings.data_root,
        period_secs = settings.period_secs,
        "Monitor configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MONITOR).await;
    health_registry.register(components::RUNTIME).await;
    health_registry.register(components::TELEMETRY).await;

    // Initialize metrics
    let metrics = MonitorMetrics::new();

    // Initialize structured logger
    let logger = StructuredLogger::new(&settings.host_name);
    logger.log_startup(MONITOR_VERSION, &settings.data_root);

    // Wire up the monitor's external surfaces
    let runtime = Arc::new(
        PodmanRuntime::new(
            &settings.podman_url,
            Duration::from_secs(settings.runtime_timeout_secs),
        )
        .context("Invalid podman endpoint")?,
    );
    let probe = Arc::new(
        KernelProbe::new(
            &settings.probe_host,
            Duration::from_secs(settings.probe_timeout_secs),
        )
        .context("Cannot build kernel probe")?,
    );
    let courses = Arc::new(FsCourseDirectory::new(&settings.data_root));

    let monitor = MonitorBuilder::new()
        .runtime(runtime)
        .probe(probe)
        .courses(courses.clone())
        .system(Arc::new(SysinfoProbe))
        .data_root(&settings.data_root)
        .host_name(&settings.host_name)
        .health(health_registry.clone())
        .period(Duration::from_secs(settings.period_secs))
        .thresholds(PolicyThresholds {
            idle_cutoff: Duration::from_secs(settings.idle_cutoff_secs),
            unused_cutoff: Duration::from_secs(settings.unused_cutoff_secs),
        })
        .build()?;

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        courses,
        &settings.data_root,
        settings.artefact_min_len,
    ));

    // Mark monitor as ready after initialization
    health_registry.set_ready(true).await;

    // Start the monitoring loop and the API server
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor.run_forever(shutdown_rx));
    let _api_handle = tokio::spawn(api::serve(settings.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;
    info!("Shutting down");

    Ok(())
}
