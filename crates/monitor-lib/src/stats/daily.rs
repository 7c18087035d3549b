//! Daily activity metrics replayed from an events file

use super::filter::StudentFilter;
use crate::telemetry::schema::EventRecord;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// One point per day, all vectors the same length
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySeries {
    pub timestamps: Vec<String>,
    pub unique_students: Vec<usize>,
    pub unique_notebooks: Vec<usize>,
    pub new_students: Vec<usize>,
    pub new_notebooks: Vec<usize>,
}

/// Running totals at selected event times, all vectors the same length
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TotalsSeries {
    pub timestamps: Vec<String>,
    pub total_students: Vec<usize>,
    pub total_notebooks: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyMetrics {
    pub daily: DailySeries,
    pub events: TotalsSeries,
}

/// Records `(timestamp, total_students, total_notebooks)` points while
/// suppressing consecutive points whose totals did not change, so a long
/// flat stretch costs one point instead of thousands.
///
/// The last observed point is tracked separately from the last recorded
/// one: `wrap` always surfaces the true final state, even when duplicate
/// suppression skipped it on the way in.
#[derive(Debug, Default)]
pub struct TotalsAccumulator {
    series: TotalsSeries,
    last_seen: Option<(String, usize, usize)>,
}

impl TotalsAccumulator {
    pub fn insert(&mut self, timestamp: &str, students: usize, notebooks: usize) {
        self.last_seen = Some((timestamp.to_string(), students, notebooks));
        if let (Some(&s), Some(&n)) = (
            self.series.total_students.last(),
            self.series.total_notebooks.last(),
        ) {
            if s == students && n == notebooks {
                return;
            }
        }
        self.push(timestamp, students, notebooks);
    }

    fn push(&mut self, timestamp: &str, students: usize, notebooks: usize) {
        self.series.timestamps.push(timestamp.to_string());
        self.series.total_students.push(students);
        self.series.total_notebooks.push(notebooks);
    }

    pub fn wrap(mut self) -> TotalsSeries {
        if let Some((timestamp, students, notebooks)) = self.last_seen.take() {
            let already_recorded = self.series.timestamps.last() == Some(&timestamp)
                && self.series.total_students.last() == Some(&students)
                && self.series.total_notebooks.last() == Some(&notebooks);
            if !already_recorded {
                self.push(&timestamp, students, notebooks);
            }
        }
        self.series
    }
}

#[derive(Default)]
struct DayFigures {
    students: HashSet<String>,
    notebooks: HashSet<String>,
}

/// Replay an events file into per-day and running-total series.
///
/// Kill lines and filtered identities are skipped; malformed lines are
/// logged and skipped; a missing file yields empty series.
pub fn daily_metrics(events_path: &Path, filter: &StudentFilter) -> DailyMetrics {
    let file = match File::open(events_path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %events_path.display(), error = %e, "No events file to replay");
            return DailyMetrics::default();
        }
    };

    // days in file order, which is chronological for appended logs
    let mut days: Vec<(String, DayFigures)> = Vec::new();
    let mut day_index: HashMap<String, usize> = HashMap::new();
    let mut accumulator = TotalsAccumulator::default();
    let mut seen_students: HashSet<String> = HashSet::new();
    let mut seen_notebooks: HashSet<String> = HashSet::new();

    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(path = %events_path.display(), line = lineno + 1, error = %e,
                      "Stopping events replay on read error");
                break;
            }
        };
        let Some(record) = EventRecord::parse(&line) else {
            if !line.trim().is_empty() {
                warn!(path = %events_path.display(), line = lineno + 1,
                      "Skipped misformed events line");
            }
            continue;
        };
        // kill lines carry no notebook and must not count as activity
        if record.is_kill() || filter.ignores(&record.student) {
            continue;
        }
        let Some((date, _)) = record.timestamp.split_once('T') else {
            warn!(path = %events_path.display(), line = lineno + 1,
                  "Skipped events line with unusable timestamp");
            continue;
        };

        let day = format!("{date} 23:59:59");
        let index = *day_index.entry(day.clone()).or_insert_with(|| {
            days.push((day, DayFigures::default()));
            days.len() - 1
        });
        let figures = &mut days[index].1;
        figures.students.insert(record.student.clone());
        figures.notebooks.insert(record.notebook.clone());

        seen_students.insert(record.student);
        seen_notebooks.insert(record.notebook);
        accumulator.insert(&record.timestamp, seen_students.len(), seen_notebooks.len());
    }

    let mut daily = DailySeries::default();
    let mut cumul_students: HashSet<String> = HashSet::new();
    let mut cumul_notebooks: HashSet<String> = HashSet::new();
    for (day, figures) in days {
        daily.timestamps.push(day);
        daily.unique_students.push(figures.students.len());
        daily.unique_notebooks.push(figures.notebooks.len());
        daily
            .new_students
            .push(figures.students.difference(&cumul_students).count());
        daily
            .new_notebooks
            .push(figures.notebooks.difference(&cumul_notebooks).count());
        cumul_students.extend(figures.students);
        cumul_notebooks.extend(figures.notebooks);
    }

    DailyMetrics {
        daily,
        events: accumulator.wrap(),
    }
}
