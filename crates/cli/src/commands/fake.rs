//! Synthetic telemetry generators
//!
//! Random data for exercising the stats pages, never meant to run
//! against a production data root.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use monitor_lib::telemetry::{schema, TelemetryWriter};
use rand::Rng;
use std::path::Path;

use crate::output::{print_info, print_success};

/// Action vocabulary seen in real event logs
const ACTIONS: [&str; 4] = ["created", "restarted", "running", "killing"];

/// Write a synthetic events file for `course`, sorted by time
pub fn events(
    data_root: &Path,
    course: &str,
    notebooks: usize,
    students: usize,
    events: usize,
    days: u32,
) -> Result<()> {
    if notebooks == 0 || students == 0 {
        bail!("Need at least one notebook and one student to draw events from");
    }
    let path = schema::events_path(data_root, course);
    ensure_void(&path)?;

    let notebooks: Vec<String> = (1..=notebooks)
        .map(|i| format!("notebook-{:02}", i))
        .collect();
    let students: Vec<String> = (1..=students)
        .map(|i| format!("student-{:05}", i))
        .collect();

    print_info(&format!(
        "Generating {} events for course {} with {} notebooks and {} students over {} days",
        events,
        course,
        notebooks.len(),
        students.len(),
        days
    ));

    let end = Utc::now();
    let beg = end - Duration::days(i64::from(days));
    let mut rng = rand::thread_rng();

    let mut drawn: Vec<(i64, &String, &String, &str)> = (0..events)
        .map(|_| {
            (
                rng.gen_range(beg.timestamp()..=end.timestamp()),
                &students[rng.gen_range(0..students.len())],
                &notebooks[rng.gen_range(0..notebooks.len())],
                ACTIONS[rng.gen_range(0..ACTIONS.len())],
            )
        })
        .collect();
    drawn.sort_by_key(|&(epoch, ..)| epoch);

    let writer = TelemetryWriter::new(data_root);
    for (epoch, student, notebook, action) in drawn {
        let Some(at) = DateTime::<Utc>::from_timestamp(epoch, 0) else {
            continue;
        };
        writer.record_open_at(course, student, notebook, action, 0, at.naive_utc());
    }

    print_success(&format!("Wrote {} events to {}", events, path.display()));
    Ok(())
}

/// Write a synthetic counts file for `course`: a random walk of the
/// running/frozen/kernel counters, sampled every `period` minutes
pub fn counts(
    data_root: &Path,
    course: &str,
    period: u32,
    students: u64,
    delta: u32,
    days: u32,
) -> Result<()> {
    if period == 0 {
        bail!("The sampling period must be at least one minute");
    }
    let path = schema::counts_path(data_root, course);
    ensure_void(&path)?;

    print_info(&format!(
        "Generating counts for course {} every {} minutes over {} days",
        course, period, days
    ));

    let writer = TelemetryWriter::new(data_root);
    writer.record_known_counts_header(course);

    let end = Utc::now();
    let mut pointer = end - Duration::days(i64::from(days));
    let mut rng = rand::thread_rng();

    let mut total: u64 = 0;
    let mut running: u64 = 0;
    let mut kernels: u64 = 0;
    let mut samples = 0usize;

    while pointer <= end {
        let frozen = total - running;
        writer.record_counts_at(course, &[running, frozen, kernels, 0], pointer.naive_utc());
        samples += 1;

        total = (total + rng.gen_range(0..=u64::from(delta))).min(students);
        let swing = rng.gen_range(-i64::from(delta)..=i64::from(delta));
        running = running.saturating_add_signed(swing).min(total);
        kernels = (running as f64 * rng.gen_range(2.0..10.0)) as u64;
        pointer += Duration::minutes(i64::from(period));
    }

    print_success(&format!(
        "Wrote {} counts lines to {}",
        samples,
        path.display()
    ));
    Ok(())
}

fn ensure_void(path: &Path) -> Result<()> {
    let occupied = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if occupied {
        bail!(
            "Refusing to add synthetic lines to non-empty {}, clear it first",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_lib::stats::monitor_counts;
    use monitor_lib::telemetry::EventRecord;

    #[test]
    fn test_fake_events_sort_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        events(dir.path(), "python-primer", 3, 5, 40, 2).unwrap();

        let content =
            std::fs::read_to_string(schema::events_path(dir.path(), "python-primer")).unwrap();
        let records: Vec<EventRecord> = content
            .lines()
            .map(|line| EventRecord::parse(line).unwrap())
            .collect();

        assert_eq!(records.len(), 40);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        assert!(records
            .iter()
            .all(|r| r.student.starts_with("student-0000") && r.notebook.starts_with("notebook-0")));
    }

    #[test]
    fn test_fake_events_refuse_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        events(dir.path(), "python-primer", 2, 2, 5, 1).unwrap();

        let result = events(dir.path(), "python-primer", 2, 2, 5, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_fake_events_need_material_to_draw_from() {
        let dir = tempfile::tempdir().unwrap();
        assert!(events(dir.path(), "python-primer", 0, 5, 5, 1).is_err());
        assert!(events(dir.path(), "python-primer", 5, 0, 5, 1).is_err());
    }

    #[test]
    fn test_fake_counts_replay_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        counts(dir.path(), "python-primer", 60, 30, 5, 2).unwrap();

        let replay = monitor_counts(&schema::counts_path(dir.path(), "python-primer"));
        assert_eq!(replay.timestamps.len(), 2 * 24 + 1);

        let running = &replay.series["running_containers"];
        assert_eq!(running.len(), replay.timestamps.len());
        assert!(running.iter().all(|v| v.unwrap() <= 30));

        // only the first four counters are faked
        assert!(replay.series["student_homes"].iter().all(|v| *v == Some(0)));
        assert!(replay.series["load1s"].iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_fake_counts_refuse_non_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        counts(dir.path(), "python-primer", 60, 30, 5, 1).unwrap();

        let result = counts(dir.path(), "python-primer", 60, 30, 5, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_fake_counts_reject_zero_period() {
        let dir = tempfile::tempdir().unwrap();
        assert!(counts(dir.path(), "python-primer", 0, 30, 5, 1).is_err());
    }
}
