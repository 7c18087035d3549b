//! Core data models for the container monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between course and student in container names
pub const NAME_SEPARATOR: &str = "-x-";

/// Coarse run status reported by the container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Stopped,
}

impl RunStatus {
    /// Map a runtime state string onto the two states the policy cares
    /// about. Anything that is not literally "running" is stopped.
    pub fn from_state(state: &str) -> Self {
        if state == "running" {
            RunStatus::Running
        } else {
            RunStatus::Stopped
        }
    }
}

/// A container as seen by one monitor cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    /// Image the container was created from
    pub image_id: String,
    /// When the container last exited, if the runtime reported it
    pub exited_at: Option<DateTime<Utc>>,
    /// Host port the notebook server is published on, if any
    pub host_port: Option<u16>,
}

/// Course and student extracted from a container name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseIdentity {
    pub course: String,
    pub student: String,
}

impl CourseIdentity {
    /// Parse a `{course}-x-{student}` container name.
    ///
    /// Returns `None` for names with zero or several separators, or with
    /// an empty course or student part. Such containers belong to other
    /// workloads on the host and are never touched.
    pub fn parse(container_name: &str) -> Option<Self> {
        let mut parts = container_name.split(NAME_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(course), Some(student), None) if !course.is_empty() && !student.is_empty() => {
                Some(Self {
                    course: course.to_string(),
                    student: student.to_string(),
                })
            }
            _ => None,
        }
    }

    /// Rebuild the container name for this identity
    pub fn container_name(&self) -> String {
        format!("{}{}{}", self.course, NAME_SEPARATOR, self.student)
    }
}

/// Per-course tallies accumulated over one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFigures {
    pub running_containers: u32,
    pub frozen_containers: u32,
    pub running_kernels: u32,
}

impl CourseFigures {
    pub fn count_container(&mut self, running: bool) {
        if running {
            self.running_containers += 1;
        } else {
            self.frozen_containers += 1;
        }
    }

    pub fn count_kernels(&mut self, kernels: u32) {
        self.running_kernels += kernels;
    }
}

/// Usage figures for one mounted filesystem
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiskFacts {
    /// Free space in percent of the total
    pub percent: u64,
    /// Free space in MiB
    pub free_mib: u64,
}

/// Memory figures in bytes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemoryFacts {
    pub total: u64,
    pub free: u64,
    pub available: u64,
}

/// Host-wide facts sampled once per cycle and recorded alongside the
/// per-course figures. All fields default to zero when a sample fails,
/// keeping the counts line complete.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemFacts {
    /// Load averages multiplied by 100 and truncated
    pub load1: u64,
    pub load5: u64,
    pub load15: u64,
    /// Filesystem holding container storage
    pub container_ds: DiskFacts,
    /// Filesystem holding course and student data
    pub data_ds: DiskFacts,
    /// Root filesystem
    pub system_ds: DiskFacts,
    pub memory: MemoryFacts,
}

/// Fleet-wide tallies over one cycle, recorded on every course's counts
/// line so each file is self-contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetFigures {
    /// Containers classified to some course this cycle
    pub containers: u32,
    /// Kernels reported by all successful probes this cycle
    pub kernels: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_parses_well_formed_name() {
        let id = CourseIdentity::parse("python-primer-x-jane.doe").unwrap();
        assert_eq!(id.course, "python-primer");
        assert_eq!(id.student, "jane.doe");
        assert_eq!(id.container_name(), "python-primer-x-jane.doe");
    }

    #[test]
    fn test_identity_rejects_foreign_names() {
        assert_eq!(CourseIdentity::parse("registry"), None);
        assert_eq!(CourseIdentity::parse("a-x-b-x-c"), None);
        assert_eq!(CourseIdentity::parse("-x-student"), None);
        assert_eq!(CourseIdentity::parse("course-x-"), None);
    }

    #[test]
    fn test_figures_accumulate() {
        let mut figures = CourseFigures::default();
        figures.count_container(true);
        figures.count_container(true);
        figures.count_container(false);
        figures.count_kernels(3);
        figures.count_kernels(0);
        assert_eq!(figures.running_containers, 2);
        assert_eq!(figures.frozen_containers, 1);
        assert_eq!(figures.running_kernels, 3);
    }

    #[test]
    fn test_run_status_from_state() {
        assert_eq!(RunStatus::from_state("running"), RunStatus::Running);
        assert_eq!(RunStatus::from_state("exited"), RunStatus::Stopped);
        assert_eq!(RunStatus::from_state("created"), RunStatus::Stopped);
        assert_eq!(RunStatus::from_state(""), RunStatus::Stopped);
    }
}
