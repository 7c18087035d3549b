//! Monitoring loop
//!
//! Drives one reaper pass over all fleet containers at a fixed period:
//! list once, classify, probe concurrently, evict per policy, then write
//! one counts line per course. The schedule self-corrects drift by
//! deriving each tick from the previous one rather than from "now".

use crate::courses::CourseDirectory;
use crate::health::{components, HealthRegistry};
use crate::models::{ContainerHandle, CourseFigures, CourseIdentity, FleetFigures, RunStatus, SystemFacts};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::policy::{classify, ContainerAction, Observation, PolicyThresholds};
use crate::probe::{ActivityProbe, ProbeError};
use crate::runtime::ContainerRuntime;
use crate::system::SystemProbe;
use crate::telemetry::{schema, TelemetryWriter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, OnceCell};
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between two cycles (default: 10 minutes)
    pub period: Duration,
    /// Idle and unused cutoffs applied by the eviction policy
    pub thresholds: PolicyThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10 * 60),
            thresholds: PolicyThresholds::default(),
        }
    }
}

/// Tallies from one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Containers classified to a course
    pub containers: usize,
    /// Containers belonging to other workloads, ignored
    pub foreign: usize,
    /// Running containers left unjudged because their probe failed
    pub skipped: usize,
    pub killed: usize,
    pub removed: usize,
    /// Kernels reported by all reachable containers
    pub kernels: u32,
    /// Courses a counts line was written for
    pub courses: usize,
}

/// The reaper; owns one handle to every external surface it drives
pub struct Monitor {
    runtime: std::sync::Arc<dyn ContainerRuntime>,
    probe: std::sync::Arc<dyn ActivityProbe>,
    courses: std::sync::Arc<dyn CourseDirectory>,
    system: std::sync::Arc<dyn SystemProbe>,
    writer: TelemetryWriter,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
    config: MonitorConfig,
    data_root: PathBuf,
    /// Container storage location, resolved from the runtime once
    storage_root: OnceCell<PathBuf>,
    /// Courses whose counts schema header went out this process
    headers_written: Mutex<HashSet<String>>,
}

/// What one container evaluation concluded
struct Evaluation {
    identity: CourseIdentity,
    state: Option<crate::policy::ContainerState>,
    kernels: u32,
    killed: bool,
    removed: bool,
}

impl Monitor {
    /// Run cycles forever, waking at `previous_tick + period` so a slow
    /// cycle does not shift the schedule
    pub async fn run_forever(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_secs = self.config.period.as_secs(),
            "Starting monitoring loop"
        );

        let mut ticker = interval(self.config.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    match self.run_once().await {
                        Ok(outcome) => {
                            let elapsed = start.elapsed();
                            self.metrics.observe_cycle_duration(elapsed.as_secs_f64());
                            self.metrics.set_fleet_figures(
                                outcome.containers as i64,
                                outcome.kernels as i64,
                                outcome.skipped as i64,
                            );
                            self.metrics.add_evictions(
                                outcome.killed as i64,
                                outcome.removed as i64,
                            );
                            self.logger.log_cycle(
                                outcome.containers,
                                outcome.kernels,
                                outcome.killed,
                                outcome.removed,
                                outcome.skipped,
                                elapsed.as_millis(),
                            );
                            if let Some(health) = &self.health {
                                health.set_healthy(components::RUNTIME).await;
                                health.set_healthy(components::MONITOR).await;
                            }
                        }
                        Err(error) => {
                            self.metrics.inc_cycle_errors();
                            self.logger.log_cycle_error(&format!("{error:#}"));
                            if let Some(health) = &self.health {
                                health
                                    .set_unhealthy(components::RUNTIME, format!("{error:#}"))
                                    .await;
                            }
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down monitoring loop");
                    break;
                }
            }
        }
    }

    /// Run a single cycle. Fails only when the container runtime cannot
    /// be listed at all; every narrower failure is handled in place.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let listed = self
            .runtime
            .list_containers()
            .await
            .context("Cannot list containers, abandoning cycle")?;
        let known_courses = self.courses.list_courses();
        let now = Utc::now();

        let mut outcome = CycleOutcome::default();
        let mut members: Vec<(ContainerHandle, CourseIdentity)> = Vec::new();
        for handle in listed {
            match CourseIdentity::parse(&handle.name) {
                Some(identity) => members.push((handle, identity)),
                None => {
                    outcome.foreign += 1;
                    debug!(container = %handle.name, "Foreign container, ignoring");
                }
            }
        }

        // expected images are looked up fresh each cycle, once per course
        let mut expected_by_course: HashMap<String, Option<String>> = HashMap::new();
        for (_, identity) in &members {
            if !expected_by_course.contains_key(&identity.course) {
                let resolved = self.resolve_expected(&identity.course).await;
                expected_by_course.insert(identity.course.clone(), resolved);
            }
        }

        let evaluations = join_all(members.into_iter().map(|(handle, identity)| {
            let expected = expected_by_course
                .get(&identity.course)
                .and_then(|image| image.as_deref());
            self.evaluate(handle, identity, expected, now)
        }))
        .await;

        // seed every known course so idle ones still get a counts line
        let mut by_course: BTreeMap<String, CourseFigures> = known_courses
            .iter()
            .map(|course| (course.clone(), CourseFigures::default()))
            .collect();
        let mut fleet = FleetFigures::default();
        for evaluation in &evaluations {
            outcome.containers += 1;
            outcome.kernels += evaluation.kernels;
            fleet.containers += 1;
            fleet.kernels += evaluation.kernels;
            if evaluation.killed {
                outcome.killed += 1;
            }
            if evaluation.removed {
                outcome.removed += 1;
            }
            let figures = by_course
                .entry(evaluation.identity.course.clone())
                .or_default();
            match evaluation.state {
                Some(state) => {
                    figures.count_container(state.counts_running());
                    if state.counts_running() {
                        figures.count_kernels(evaluation.kernels);
                    }
                }
                None => outcome.skipped += 1,
            }
        }

        let facts = self.system_facts().await;
        for (course, figures) in &by_course {
            let student_homes = self.courses.student_homes(course) as u64;
            let values = schema::counts_values(figures, student_homes, &facts, &fleet);
            self.ensure_header(course);
            self.writer.record_counts(course, &values);
        }
        outcome.courses = by_course.len();

        Ok(outcome)
    }

    /// Judge one container and carry out the verdict
    async fn evaluate(
        &self,
        handle: ContainerHandle,
        identity: CourseIdentity,
        expected_image: Option<&str>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let stale = expected_image
            .map(|expected| !same_image(expected, &handle.image_id))
            .unwrap_or(false);

        let activity = match handle.status {
            RunStatus::Running => {
                let probed = match handle.host_port {
                    Some(port) => self.probe.activity(port, &handle.name).await,
                    None => Err(ProbeError::NoPort),
                };
                match probed {
                    Ok(activity) => Some(activity),
                    Err(error) => {
                        error!(container = %handle.name, %error,
                               "Probe failed, leaving container alone this cycle");
                        None
                    }
                }
            }
            RunStatus::Stopped => None,
        };
        let kernels = activity.as_ref().map(|a| a.kernels).unwrap_or(0);

        let observation = Observation {
            status: handle.status,
            stale,
            exited_at: handle.exited_at,
            activity,
        };
        let state = classify(&observation, now, &self.config.thresholds);

        let mut killed = false;
        let mut removed = false;
        if let Some(state) = state {
            debug!(container = %handle.name, state = %state, "Classified container");
            match state.action(stale) {
                ContainerAction::Keep => {}
                ContainerAction::Kill { remove } => {
                    match self.runtime.kill_container(&handle.name).await {
                        Ok(()) => {
                            killed = true;
                            self.writer.record_kill(&identity.course, &identity.student);
                            if remove {
                                match self.runtime.remove_container(&handle.name).await {
                                    Ok(()) => removed = true,
                                    Err(error) => error!(container = %handle.name, %error,
                                                         "Removal failed, will retry next cycle"),
                                }
                            }
                            self.logger.log_kill(
                                &identity.course,
                                &identity.student,
                                &state.to_string(),
                                removed,
                            );
                        }
                        Err(error) => error!(container = %handle.name, %error,
                                             "Kill failed, will retry next cycle"),
                    }
                }
                ContainerAction::Remove => {
                    match self.runtime.remove_container(&handle.name).await {
                        Ok(()) => {
                            removed = true;
                            self.logger.log_remove(
                                &identity.course,
                                &identity.student,
                                &state.to_string(),
                            );
                        }
                        Err(error) => error!(container = %handle.name, %error,
                                             "Removal failed, will retry next cycle"),
                    }
                }
            }
        }

        Evaluation {
            identity,
            state,
            kernels,
            killed,
            removed,
        }
    }

    async fn resolve_expected(&self, course: &str) -> Option<String> {
        let reference = self.courses.expected_image(course)?;
        match self.runtime.resolve_image(&reference).await {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(course = %course, image = %reference, %error,
                      "Cannot resolve expected image, staleness unknown");
                None
            }
        }
    }

    async fn system_facts(&self) -> SystemFacts {
        let storage_root = match self
            .storage_root
            .get_or_try_init(|| self.runtime.storage_root())
            .await
        {
            Ok(root) => root.clone(),
            Err(error) => {
                warn!(%error, "Cannot resolve container storage root, using /");
                PathBuf::from("/")
            }
        };
        self.system.facts(&storage_root, &self.data_root)
    }

    fn ensure_header(&self, course: &str) {
        let mut written = self.headers_written.lock().unwrap();
        if written.insert(course.to_string()) {
            self.writer.record_known_counts_header(course);
        }
    }
}

/// Image ids compare equal regardless of a digest-algorithm prefix
fn same_image(a: &str, b: &str) -> bool {
    a.trim_start_matches("sha256:") == b.trim_start_matches("sha256:")
}

/// Builder for wiring up the monitor
pub struct MonitorBuilder {
    runtime: Option<std::sync::Arc<dyn ContainerRuntime>>,
    probe: Option<std::sync::Arc<dyn ActivityProbe>>,
    courses: Option<std::sync::Arc<dyn CourseDirectory>>,
    system: Option<std::sync::Arc<dyn SystemProbe>>,
    data_root: Option<PathBuf>,
    host_name: String,
    health: Option<HealthRegistry>,
    config: MonitorConfig,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self {
            runtime: None,
            probe: None,
            courses: None,
            system: None,
            data_root: None,
            host_name: "localhost".to_string(),
            health: None,
            config: MonitorConfig::default(),
        }
    }

    pub fn runtime(mut self, runtime: std::sync::Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn probe(mut self, probe: std::sync::Arc<dyn ActivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn courses(mut self, courses: std::sync::Arc<dyn CourseDirectory>) -> Self {
        self.courses = Some(courses);
        self
    }

    pub fn system(mut self, system: std::sync::Arc<dyn SystemProbe>) -> Self {
        self.system = Some(system);
        self
    }

    pub fn data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(data_root.into());
        self
    }

    pub fn host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn thresholds(mut self, thresholds: PolicyThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn build(self) -> Result<Monitor> {
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Container runtime is required"))?;
        let probe = self
            .probe
            .ok_or_else(|| anyhow::anyhow!("Activity probe is required"))?;
        let courses = self
            .courses
            .ok_or_else(|| anyhow::anyhow!("Course directory is required"))?;
        let system = self
            .system
            .ok_or_else(|| anyhow::anyhow!("System probe is required"))?;
        let data_root = self
            .data_root
            .ok_or_else(|| anyhow::anyhow!("Data root is required"))?;

        Ok(Monitor {
            runtime,
            probe,
            courses,
            system,
            writer: TelemetryWriter::new(&data_root),
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new(self.host_name),
            health: self.health,
            config: self.config,
            data_root,
            storage_root: OnceCell::new(),
            headers_written: Mutex::new(HashSet::new()),
        })
    }
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ContainerState;
    use crate::probe::KernelActivity;
    use crate::runtime::RuntimeError;
    use crate::telemetry::schema::KNOWN_COUNTS;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct ScriptedRuntime {
        containers: Vec<ContainerHandle>,
        images: HashMap<String, String>,
        killed: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
        fail_listing: bool,
    }

    impl ScriptedRuntime {
        fn new(containers: Vec<ContainerHandle>) -> Self {
            Self {
                containers,
                images: HashMap::new(),
                killed: Mutex::new(Vec::new()),
                removed: Mutex::new(Vec::new()),
                fail_listing: false,
            }
        }

        fn with_image(mut self, reference: &str, id: &str) -> Self {
            self.images.insert(reference.to_string(), id.to_string());
            self
        }
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn list_containers(&self) -> Result<Vec<ContainerHandle>, RuntimeError> {
            if self.fail_listing {
                return Err(RuntimeError::Status {
                    operation: "list containers",
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            Ok(self.containers.clone())
        }

        async fn kill_container(&self, name: &str) -> Result<(), RuntimeError> {
            self.killed.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
            self.removed.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn resolve_image(&self, reference: &str) -> Result<String, RuntimeError> {
            self.images
                .get(reference)
                .cloned()
                .ok_or(RuntimeError::Status {
                    operation: "inspect image",
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }

        async fn storage_root(&self) -> Result<PathBuf, RuntimeError> {
            Ok(PathBuf::from("/var/lib/containers/storage"))
        }
    }

    struct ScriptedProbe {
        by_port: HashMap<u16, KernelActivity>,
    }

    #[async_trait]
    impl ActivityProbe for ScriptedProbe {
        async fn activity(&self, port: u16, _token: &str) -> Result<KernelActivity, ProbeError> {
            self.by_port
                .get(&port)
                .copied()
                .ok_or(ProbeError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        }
    }

    struct ScriptedCourses {
        courses: Vec<String>,
        images: HashMap<String, String>,
        homes: HashMap<String, usize>,
    }

    impl ScriptedCourses {
        fn new(courses: &[&str]) -> Self {
            Self {
                courses: courses.iter().map(|c| c.to_string()).collect(),
                images: HashMap::new(),
                homes: HashMap::new(),
            }
        }

        fn with_image(mut self, course: &str, reference: &str) -> Self {
            self.images.insert(course.to_string(), reference.to_string());
            self
        }

        fn with_homes(mut self, course: &str, homes: usize) -> Self {
            self.homes.insert(course.to_string(), homes);
            self
        }
    }

    impl CourseDirectory for ScriptedCourses {
        fn list_courses(&self) -> Vec<String> {
            self.courses.clone()
        }

        fn expected_image(&self, course: &str) -> Option<String> {
            self.images.get(course).cloned()
        }

        fn staff(&self, _course: &str) -> HashSet<String> {
            HashSet::new()
        }

        fn student_homes(&self, course: &str) -> usize {
            self.homes.get(course).copied().unwrap_or(0)
        }
    }

    struct StillSystem;

    impl SystemProbe for StillSystem {
        fn facts(&self, _container_root: &Path, _data_root: &Path) -> SystemFacts {
            SystemFacts {
                load1: 42,
                ..SystemFacts::default()
            }
        }
    }

    fn handle(name: &str, status: RunStatus, image_id: &str, port: Option<u16>) -> ContainerHandle {
        ContainerHandle {
            id: format!("id-{name}"),
            name: name.to_string(),
            status,
            image_id: image_id.to_string(),
            exited_at: None,
            host_port: port,
        }
    }

    fn active(kernels: u32) -> KernelActivity {
        KernelActivity {
            kernels,
            last_activity: Some(Utc::now()),
        }
    }

    fn idle(kernels: u32) -> KernelActivity {
        KernelActivity {
            kernels,
            last_activity: Some(Utc::now() - chrono::Duration::hours(2)),
        }
    }

    fn monitor(
        temp: &TempDir,
        runtime: ScriptedRuntime,
        probe: ScriptedProbe,
        courses: ScriptedCourses,
    ) -> Monitor {
        MonitorBuilder::new()
            .runtime(Arc::new(runtime))
            .probe(Arc::new(probe))
            .courses(Arc::new(courses))
            .system(Arc::new(StillSystem))
            .data_root(temp.path())
            .build()
            .unwrap()
    }

    fn counts_lines(root: &Path, course: &str) -> Vec<Vec<String>> {
        let contents =
            fs::read_to_string(schema::counts_path(root, course)).unwrap_or_default();
        contents
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    fn counter(line: &[String], name: &str) -> u64 {
        let index = KNOWN_COUNTS.iter().position(|&n| n == name).unwrap();
        line[index + 1].parse().unwrap()
    }

    #[tokio::test]
    async fn test_cycle_counts_running_and_frozen() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![
            handle("python-primer-x-alice", RunStatus::Running, "img-a", Some(40001)),
            handle("python-primer-x-bob", RunStatus::Stopped, "img-a", None),
        ]);
        let probe = ScriptedProbe {
            by_port: HashMap::from([(40001, active(2))]),
        };
        let courses =
            ScriptedCourses::new(&["python-primer"]).with_homes("python-primer", 7);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.containers, 2);
        assert_eq!(outcome.killed, 0);
        assert_eq!(outcome.kernels, 2);
        assert_eq!(outcome.courses, 1);

        let lines = counts_lines(temp.path(), "python-primer");
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.len(), 1 + KNOWN_COUNTS.len());
        assert_eq!(counter(line, "running_container"), 1);
        assert_eq!(counter(line, "frozen_container"), 1);
        assert_eq!(counter(line, "running_kernel"), 2);
        assert_eq!(counter(line, "student_home"), 7);
        assert_eq!(counter(line, "load1"), 42);
        assert_eq!(counter(line, "system_container"), 2);
        assert_eq!(counter(line, "system_kernel"), 2);
    }

    #[tokio::test]
    async fn test_idle_container_killed_and_logged() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-alice",
            RunStatus::Running,
            "img-a",
            Some(40001),
        )]);
        let probe = ScriptedProbe {
            by_port: HashMap::from([(40001, idle(3))]),
        };
        let courses = ScriptedCourses::new(&["python-primer"]);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.killed, 1);
        assert_eq!(outcome.removed, 0);
        // probed kernels still show up in the fleet column
        assert_eq!(outcome.kernels, 3);

        let events =
            fs::read_to_string(schema::events_path(temp.path(), "python-primer")).unwrap();
        assert!(events.contains("python-primer alice - killing -"));

        let lines = counts_lines(temp.path(), "python-primer");
        assert_eq!(counter(&lines[0], "running_container"), 0);
        assert_eq!(counter(&lines[0], "frozen_container"), 1);
        assert_eq!(counter(&lines[0], "running_kernel"), 0);
        assert_eq!(counter(&lines[0], "system_kernel"), 3);
    }

    #[tokio::test]
    async fn test_empty_container_killed_even_when_recent() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-alice",
            RunStatus::Running,
            "img-a",
            Some(40001),
        )]);
        let probe = ScriptedProbe {
            by_port: HashMap::from([(
                40001,
                KernelActivity {
                    kernels: 0,
                    last_activity: None,
                },
            )]),
        };
        let courses = ScriptedCourses::new(&["python-primer"]);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();
        assert_eq!(outcome.killed, 1);
    }

    #[tokio::test]
    async fn test_stale_idle_container_killed_and_removed() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-alice",
            RunStatus::Running,
            "img-old",
            Some(40001),
        )])
        .with_image("localhost/python-primer", "img-new");
        let probe = ScriptedProbe {
            by_port: HashMap::from([(40001, idle(1))]),
        };
        let courses = ScriptedCourses::new(&["python-primer"])
            .with_image("python-primer", "localhost/python-primer");

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.killed, 1);
        assert_eq!(outcome.removed, 1);
    }

    #[tokio::test]
    async fn test_stopped_stale_container_removed() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-bob",
            RunStatus::Stopped,
            "img-old",
            None,
        )])
        .with_image("localhost/python-primer", "img-new");
        let courses = ScriptedCourses::new(&["python-primer"])
            .with_image("python-primer", "localhost/python-primer");
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.killed, 0);
        let lines = counts_lines(temp.path(), "python-primer");
        assert_eq!(counter(&lines[0], "frozen_container"), 1);
    }

    #[tokio::test]
    async fn test_unreachable_container_is_skipped_not_evicted() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-alice",
            RunStatus::Running,
            "img-a",
            Some(40001),
        )]);
        // no scripted activity for port 40001, so the probe fails
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&["python-primer"]);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.killed, 0);
        assert_eq!(outcome.removed, 0);

        let lines = counts_lines(temp.path(), "python-primer");
        assert_eq!(counter(&lines[0], "running_container"), 0);
        assert_eq!(counter(&lines[0], "frozen_container"), 0);
        // the container still shows in the fleet column
        assert_eq!(counter(&lines[0], "system_container"), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_abandons_cycle() {
        let temp = TempDir::new().unwrap();
        let mut runtime = ScriptedRuntime::new(vec![]);
        runtime.fail_listing = true;
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&["python-primer"]);

        let monitor = monitor(&temp, runtime, probe, courses);
        assert!(monitor.run_once().await.is_err());
        assert!(!schema::counts_path(temp.path(), "python-primer").exists());
    }

    #[tokio::test]
    async fn test_courses_without_containers_still_get_counts() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![]);
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&["rust-lang"]).with_homes("rust-lang", 3);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.courses, 1);
        let lines = counts_lines(temp.path(), "rust-lang");
        assert_eq!(lines.len(), 1);
        assert_eq!(counter(&lines[0], "running_container"), 0);
        assert_eq!(counter(&lines[0], "student_home"), 3);
    }

    #[tokio::test]
    async fn test_discovered_course_gets_counts_too() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![handle(
            "orphan-course-x-alice",
            RunStatus::Stopped,
            "img-a",
            None,
        )]);
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&[]);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.courses, 1);
        let lines = counts_lines(temp.path(), "orphan-course");
        assert_eq!(counter(&lines[0], "frozen_container"), 1);
        assert_eq!(counter(&lines[0], "student_home"), 0);
    }

    #[tokio::test]
    async fn test_foreign_containers_ignored() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![
            handle("registry", RunStatus::Running, "img-r", Some(5000)),
            handle("a-x-b-x-c", RunStatus::Running, "img-r", None),
        ]);
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&[]);

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();

        assert_eq!(outcome.foreign, 2);
        assert_eq!(outcome.containers, 0);
        assert_eq!(outcome.courses, 0);
    }

    #[tokio::test]
    async fn test_header_written_once_per_course() {
        let temp = TempDir::new().unwrap();
        let runtime = ScriptedRuntime::new(vec![]);
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };
        let courses = ScriptedCourses::new(&["python-primer"]);

        let monitor = monitor(&temp, runtime, probe, courses);
        monitor.run_once().await.unwrap();
        monitor.run_once().await.unwrap();

        let contents =
            fs::read_to_string(schema::counts_path(temp.path(), "python-primer")).unwrap();
        let headers = contents.lines().filter(|l| l.starts_with('#')).count();
        let data = contents.lines().filter(|l| !l.starts_with('#')).count();
        assert_eq!(headers, 1);
        assert_eq!(data, 2);
    }

    #[tokio::test]
    async fn test_unknown_expected_image_never_marks_stale() {
        let temp = TempDir::new().unwrap();
        // course declares an image the runtime cannot resolve
        let runtime = ScriptedRuntime::new(vec![handle(
            "python-primer-x-bob",
            RunStatus::Stopped,
            "img-old",
            None,
        )]);
        let courses = ScriptedCourses::new(&["python-primer"])
            .with_image("python-primer", "localhost/missing");
        let probe = ScriptedProbe {
            by_port: HashMap::new(),
        };

        let monitor = monitor(&temp, runtime, probe, courses);
        let outcome = monitor.run_once().await.unwrap();
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn test_same_image_ignores_digest_prefix() {
        assert!(same_image("sha256:abc123", "abc123"));
        assert!(same_image("abc123", "abc123"));
        assert!(!same_image("sha256:abc123", "sha256:def456"));
    }

    #[test]
    fn test_builder_requires_all_surfaces() {
        assert!(MonitorBuilder::new().build().is_err());
    }

    #[test]
    fn test_classified_states_map_to_actions() {
        assert_eq!(ContainerState::RunningActive.action(false), ContainerAction::Keep);
        assert_eq!(
            ContainerState::RunningIdle.action(true),
            ContainerAction::Kill { remove: true }
        );
    }
}
