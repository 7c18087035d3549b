//! Append-only telemetry writer
//!
//! Every call opens the target file, appends one line and closes it, so
//! there is no cross-call buffering to corrupt and a crash can at worst
//! truncate the line being written. Write failures are logged and
//! swallowed; losing a telemetry line must never stop the reaper.

use super::schema::{self, ACTION_KILLING, FIELD_DASH, KNOWN_COUNTS, TIME_FORMAT};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::error;

/// Writes event and counts lines under `<data_root>/raw/<course>/`
#[derive(Debug, Clone)]
pub struct TelemetryWriter {
    data_root: PathBuf,
}

impl TelemetryWriter {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Record a notebook-open action reported by the spawner
    pub fn record_open(&self, course: &str, student: &str, notebook: &str, action: &str, port: u16) {
        self.record_open_at(course, student, notebook, action, port, Utc::now().naive_utc());
    }

    /// Same as [`record_open`](Self::record_open) with an explicit
    /// timestamp, for synthetic or replayed telemetry.
    pub fn record_open_at(
        &self,
        course: &str,
        student: &str,
        notebook: &str,
        action: &str,
        port: u16,
        at: NaiveDateTime,
    ) {
        self.record_event_line(course, student, notebook, action, &port.to_string(), at);
    }

    /// Record that the monitor killed a student's container
    pub fn record_kill(&self, course: &str, student: &str) {
        self.record_event_line(
            course,
            student,
            FIELD_DASH,
            ACTION_KILLING,
            FIELD_DASH,
            Utc::now().naive_utc(),
        );
    }

    fn record_event_line(
        &self,
        course: &str,
        student: &str,
        notebook: &str,
        action: &str,
        port: &str,
        at: NaiveDateTime,
    ) {
        let path = schema::events_path(&self.data_root, course);
        let timestamp = at.format(TIME_FORMAT);
        let line = format!("{timestamp} {course} {student} {notebook} {action} {port}\n");
        if let Err(e) = append_line(&path, &line) {
            error!(course = %course, error = %e, "Cannot append event line");
        }
    }

    /// Record one cycle's counter values, in `KNOWN_COUNTS` order
    pub fn record_counts(&self, course: &str, values: &[u64]) {
        self.record_counts_at(course, values, Utc::now().naive_utc());
    }

    /// Same as [`record_counts`](Self::record_counts) with an explicit
    /// timestamp.
    pub fn record_counts_at(&self, course: &str, values: &[u64], at: NaiveDateTime) {
        if values.len() > KNOWN_COUNTS.len() {
            error!(
                course = %course,
                got = values.len(),
                max = KNOWN_COUNTS.len(),
                "Too many values for a counts line, dropping it"
            );
            return;
        }
        let path = schema::counts_path(&self.data_root, course);
        let timestamp = at.format(TIME_FORMAT);
        let payload = values
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let line = format!("{timestamp} {payload}\n");
        if let Err(e) = append_line(&path, &line) {
            error!(course = %course, error = %e, "Cannot append counts line");
        }
    }

    /// Record a header naming the current counts schema. Called once per
    /// course at process start, so a growing schema stays self-describing.
    pub fn record_known_counts_header(&self, course: &str) {
        let path = schema::counts_path(&self.data_root, course);
        let line = format!("# {}\n", KNOWN_COUNTS.join(" "));
        if let Err(e) = append_line(&path, &line) {
            error!(course = %course, error = %e, "Cannot append counts header");
        }
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to append to {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::schema::EventRecord;

    #[test]
    fn test_record_open_appends_six_fields() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TelemetryWriter::new(dir.path());

        writer.record_open("python-primer", "jane.doe", "intro-01", "created", 43021);
        writer.record_open("python-primer", "jane.doe", "intro-01", "running", 43021);

        let content =
            std::fs::read_to_string(schema::events_path(dir.path(), "python-primer")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first = EventRecord::parse(lines[0]).unwrap();
        assert_eq!(first.course, "python-primer");
        assert_eq!(first.student, "jane.doe");
        assert_eq!(first.action, "created");
        assert_eq!(first.port, "43021");
        assert!(schema::parse_timestamp(&first.timestamp).is_some());
    }

    #[test]
    fn test_record_open_at_keeps_given_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TelemetryWriter::new(dir.path());

        let at = schema::parse_timestamp("2024-03-01T10:00:00").unwrap();
        writer.record_open_at("python-primer", "jane.doe", "intro-01", "created", 0, at);

        let content =
            std::fs::read_to_string(schema::events_path(dir.path(), "python-primer")).unwrap();
        let record = EventRecord::parse(content.lines().next().unwrap()).unwrap();
        assert_eq!(record.timestamp, "2024-03-01T10:00:00");
        assert_eq!(record.port, "0");
    }

    #[test]
    fn test_record_kill_uses_dashes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TelemetryWriter::new(dir.path());

        writer.record_kill("python-primer", "jane.doe");

        let content =
            std::fs::read_to_string(schema::events_path(dir.path(), "python-primer")).unwrap();
        let record = EventRecord::parse(content.lines().next().unwrap()).unwrap();
        assert!(record.is_kill());
        assert_eq!(record.notebook, "-");
        assert_eq!(record.port, "-");
    }

    #[test]
    fn test_counts_header_then_line() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TelemetryWriter::new(dir.path());

        writer.record_known_counts_header("python-primer");
        let values: Vec<u64> = (0..KNOWN_COUNTS.len() as u64).collect();
        writer.record_counts("python-primer", &values);

        let content =
            std::fs::read_to_string(schema::counts_path(dir.path(), "python-primer")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("# {}", KNOWN_COUNTS.join(" ")));

        let fields: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(fields.len(), 1 + KNOWN_COUNTS.len());
        assert!(schema::parse_timestamp(fields[0]).is_some());
        assert_eq!(fields[1], "0");
        assert_eq!(fields[18], "17");
    }

    #[test]
    fn test_overlong_counts_line_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TelemetryWriter::new(dir.path());

        let values = vec![0u64; KNOWN_COUNTS.len() + 1];
        writer.record_counts("python-primer", &values);

        assert!(!schema::counts_path(dir.path(), "python-primer").exists());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy the raw directory slot with a plain file so appends fail
        std::fs::write(dir.path().join("raw"), b"not a directory").unwrap();

        let writer = TelemetryWriter::new(dir.path());
        writer.record_kill("python-primer", "jane.doe");
        writer.record_counts("python-primer", &[1, 2, 3]);
    }
}
