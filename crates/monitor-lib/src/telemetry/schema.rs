//! On-disk telemetry formats
//!
//! Two append-only text files per course, kept under `<root>/raw/<course>/`:
//! - `events.raw`: one line per notebook-open or kill action
//! - `counts.raw`: one line per monitor cycle, plus `#` schema headers

use crate::models::{CourseFigures, FleetFigures, SystemFacts};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Timestamp format used in all raw files (UTC, second resolution)
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Action recorded when the monitor kills a container
pub const ACTION_KILLING: &str = "killing";

/// Placeholder for fields that do not apply to an event
pub const FIELD_DASH: &str = "-";

/// Ordered counter names written on each counts line.
///
/// The list is append-only: new counters may be added at the end over
/// time, and readers pad short (older) lines with a missing sentinel.
pub const KNOWN_COUNTS: [&str; 18] = [
    "running_container",
    "frozen_container",
    "running_kernel",
    "student_home",
    "load1",
    "load5",
    "load15",
    "container_ds_percent",
    "container_ds_free",
    "data_ds_percent",
    "data_ds_free",
    "system_ds_percent",
    "system_ds_free",
    "memory_total",
    "memory_free",
    "memory_available",
    "system_container",
    "system_kernel",
];

/// Directory holding one course's raw telemetry files
pub fn course_raw_dir(data_root: &Path, course: &str) -> PathBuf {
    data_root.join("raw").join(course)
}

pub fn events_path(data_root: &Path, course: &str) -> PathBuf {
    course_raw_dir(data_root, course).join("events.raw")
}

pub fn counts_path(data_root: &Path, course: &str) -> PathBuf {
    course_raw_dir(data_root, course).join("counts.raw")
}

/// Parse a raw-file timestamp; these carry no zone suffix and are UTC
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT).ok()
}

/// One parsed line of `events.raw`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: String,
    pub course: String,
    pub student: String,
    pub notebook: String,
    pub action: String,
    pub port: String,
}

impl EventRecord {
    /// Parse a whitespace-separated six-field event line
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let record = Self {
            timestamp: fields.next()?.to_string(),
            course: fields.next()?.to_string(),
            student: fields.next()?.to_string(),
            notebook: fields.next()?.to_string(),
            action: fields.next()?.to_string(),
            port: fields.next()?.to_string(),
        };
        if fields.next().is_some() {
            return None;
        }
        Some(record)
    }

    pub fn is_kill(&self) -> bool {
        self.action == ACTION_KILLING
    }
}

/// Assemble one cycle's counter values in `KNOWN_COUNTS` order
pub fn counts_values(
    figures: &CourseFigures,
    student_homes: u64,
    facts: &SystemFacts,
    fleet: &FleetFigures,
) -> [u64; KNOWN_COUNTS.len()] {
    [
        figures.running_containers as u64,
        figures.frozen_containers as u64,
        figures.running_kernels as u64,
        student_homes,
        facts.load1,
        facts.load5,
        facts.load15,
        facts.container_ds.percent,
        facts.container_ds.free_mib,
        facts.data_ds.percent,
        facts.data_ds.free_mib,
        facts.system_ds.percent,
        facts.system_ds.free_mib,
        facts.memory.total,
        facts.memory.free,
        facts.memory.available,
        fleet.containers as u64,
        fleet.kernels as u64,
    ]
}
