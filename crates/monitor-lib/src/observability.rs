//! Observability infrastructure for the fleet monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, fleet gauges, kill/remove counters)
//! - Structured JSON logging with tracing

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for cycle durations (in seconds); probes dominate
/// and are bounded by their timeout
const CYCLE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct MonitorMetricsInner {
    cycle_duration_seconds: Histogram,
    fleet_containers: IntGauge,
    fleet_kernels: IntGauge,
    containers_skipped: IntGauge,
    containers_killed: IntGauge,
    containers_removed: IntGauge,
    cycle_errors: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "nbfleet_monitor_cycle_duration_seconds",
                "Time spent running one monitoring cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            fleet_containers: register_int_gauge!(
                "nbfleet_monitor_fleet_containers",
                "Containers classified to a course in the last cycle"
            )
            .expect("Failed to register fleet_containers"),

            fleet_kernels: register_int_gauge!(
                "nbfleet_monitor_fleet_kernels",
                "Live kernels reported by reachable containers in the last cycle"
            )
            .expect("Failed to register fleet_kernels"),

            containers_skipped: register_int_gauge!(
                "nbfleet_monitor_containers_skipped",
                "Running containers left unjudged in the last cycle because their probe failed"
            )
            .expect("Failed to register containers_skipped"),

            containers_killed: register_int_gauge!(
                "nbfleet_monitor_containers_killed_total",
                "Total number of containers killed for idleness"
            )
            .expect("Failed to register containers_killed"),

            containers_removed: register_int_gauge!(
                "nbfleet_monitor_containers_removed_total",
                "Total number of stale or unused containers removed"
            )
            .expect("Failed to register containers_removed"),

            cycle_errors: register_int_gauge!(
                "nbfleet_monitor_cycle_errors_total",
                "Total number of abandoned monitoring cycles"
            )
            .expect("Failed to register cycle_errors"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the duration of one completed cycle
    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    /// Update the fleet gauges from the last cycle
    pub fn set_fleet_figures(&self, containers: i64, kernels: i64, skipped: i64) {
        self.inner().fleet_containers.set(containers);
        self.inner().fleet_kernels.set(kernels);
        self.inner().containers_skipped.set(skipped);
    }

    /// Add a cycle's kills and removals to the running totals
    pub fn add_evictions(&self, killed: i64, removed: i64) {
        self.inner().containers_killed.add(killed);
        self.inner().containers_removed.add(removed);
    }

    /// Increment the abandoned-cycle counter
    pub fn inc_cycle_errors(&self) {
        self.inner().cycle_errors.inc();
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for evictions and
/// cycle summaries.
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    /// Log a container kill
    pub fn log_kill(&self, course: &str, student: &str, reason: &str, removed: bool) {
        info!(
            event = "container_killed",
            host = %self.host_name,
            course = %course,
            student = %student,
            reason = %reason,
            removed = removed,
            "Killed idle container"
        );
    }

    /// Log removal of a stopped container
    pub fn log_remove(&self, course: &str, student: &str, reason: &str) {
        info!(
            event = "container_removed",
            host = %self.host_name,
            course = %course,
            student = %student,
            reason = %reason,
            "Removed stopped container"
        );
    }

    /// Log a completed cycle
    pub fn log_cycle(
        &self,
        containers: usize,
        kernels: u32,
        killed: usize,
        removed: usize,
        skipped: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "cycle_complete",
            host = %self.host_name,
            containers = containers,
            kernels = kernels,
            killed = killed,
            removed = removed,
            skipped = skipped,
            elapsed_ms = elapsed_ms,
            "Monitoring cycle complete"
        );
    }

    /// Log an abandoned cycle
    pub fn log_cycle_error(&self, error: &str) {
        error!(
            event = "cycle_abandoned",
            host = %self.host_name,
            error = %error,
            "Monitoring cycle abandoned"
        );
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str, data_root: &str) {
        info!(
            event = "monitor_started",
            host = %self.host_name,
            monitor_version = %version,
            data_root = %data_root,
            "Fleet monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        warn!(
            event = "monitor_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Fleet monitor shutting down"
        );
    }
}
