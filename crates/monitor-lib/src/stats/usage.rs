//! Notebook and student cross-usage replayed from an events file

use super::buckets::TimeBuckets;
use super::filter::StudentFilter;
use crate::telemetry::schema::{parse_timestamp, EventRecord};
use chrono::Duration;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Grain of the animated per-notebook series
const ANIMATION_GRAIN_HOURS: i64 = 6;

/// Dense notebooks x students visit matrix.
///
/// Cells for pairs with no visit at all are `None` rather than zero so a
/// color scale can render them as transparent. `zmin`/`zmax` span present
/// cells only. Rows come sorted by ascending total visits, `y` with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Heatmap {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub z: Vec<Vec<Option<u64>>>,
    pub zmin: u64,
    pub zmax: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterialUsage {
    pub nbnotebooks: usize,
    pub nbstudents: usize,
    /// Unique-student count per notebook, sorted by notebook
    pub nbstudents_per_notebook: Vec<(String, usize)>,
    /// Same series snapshotted at fixed time buckets, keyed by bucket end
    pub nbstudents_per_notebook_animated: BTreeMap<String, Vec<(String, usize)>>,
    /// How many students visited exactly that many distinct notebooks
    pub nbstudents_per_nbnotebooks: Vec<(usize, usize)>,
    pub heatmap: Heatmap,
}

fn students_per_notebook(
    students_by_notebook: &BTreeMap<String, HashSet<String>>,
) -> Vec<(String, usize)> {
    students_by_notebook
        .iter()
        .map(|(notebook, students)| (notebook.clone(), students.len()))
        .collect()
}

/// Replay an events file into the cross-usage figures described above.
///
/// Kill lines and filtered identities are skipped; malformed lines are
/// logged and skipped; a missing file yields empty figures.
pub fn material_usage(events_path: &Path, filter: &StudentFilter) -> MaterialUsage {
    let mut students_by_notebook: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    let mut notebooks_by_student: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    // notebook -> student -> visits
    let mut visits: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut buckets: TimeBuckets<Vec<(String, usize)>> =
        TimeBuckets::new(Duration::hours(ANIMATION_GRAIN_HOURS));

    match File::open(events_path) {
        Ok(file) => {
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
                if record.is_kill() || filter.ignores(&record.student) {
                    continue;
                }
                let Some(at) = parse_timestamp(&record.timestamp) else {
                    warn!(path = %events_path.display(), line = lineno + 1,
                          "Skipped events line with unusable timestamp");
                    continue;
                };

                // snapshot the animation before this event lands
                buckets.observe(at, || students_per_notebook(&students_by_notebook));

                students_by_notebook
                    .entry(record.notebook.clone())
                    .or_default()
                    .insert(record.student.clone());
                notebooks_by_student
                    .entry(record.student.clone())
                    .or_default()
                    .insert(record.notebook.clone());
                *visits
                    .entry(record.notebook)
                    .or_default()
                    .entry(record.student)
                    .or_default() += 1;
            }
        }
        Err(e) => {
            debug!(path = %events_path.display(), error = %e, "No events file to replay");
        }
    }

    let nbstudents_per_notebook = students_per_notebook(&students_by_notebook);
    let nbstudents_per_notebook_animated: BTreeMap<String, Vec<(String, usize)>> = buckets
        .wrap(nbstudents_per_notebook.clone())
        .into_iter()
        .collect();

    let mut per_count: BTreeMap<usize, usize> = BTreeMap::new();
    for notebooks in notebooks_by_student.values() {
        *per_count.entry(notebooks.len()).or_default() += 1;
    }
    let nbstudents_per_nbnotebooks: Vec<(usize, usize)> = per_count.into_iter().collect();

    let x: Vec<String> = students_by_notebook.keys().cloned().collect();
    let mut rows: Vec<(u64, String, Vec<Option<u64>>)> = notebooks_by_student
        .keys()
        .map(|student| {
            let row: Vec<Option<u64>> = x
                .iter()
                .map(|notebook| {
                    visits
                        .get(notebook)
                        .and_then(|by_student| by_student.get(student))
                        .copied()
                })
                .collect();
            let total: u64 = row.iter().flatten().sum();
            (total, student.clone(), row)
        })
        .collect();
    rows.sort_by(|(ta, sa, _), (tb, sb, _)| ta.cmp(tb).then_with(|| sa.cmp(sb)));

    let mut zmin = u64::MAX;
    let mut zmax = 0;
    let mut any_cell = false;
    for (_, _, row) in &rows {
        for value in row.iter().flatten() {
            any_cell = true;
            zmin = zmin.min(*value);
            zmax = zmax.max(*value);
        }
    }
    if !any_cell {
        zmin = 0;
    }

    let (y, z): (Vec<String>, Vec<Vec<Option<u64>>>) =
        rows.into_iter().map(|(_, student, row)| (student, row)).unzip();

    MaterialUsage {
        nbnotebooks: students_by_notebook.len(),
        nbstudents: notebooks_by_student.len(),
        nbstudents_per_notebook,
        nbstudents_per_notebook_animated,
        nbstudents_per_nbnotebooks,
        heatmap: Heatmap {
            x,
            y,
            z,
            zmin,
            zmax,
        },
    }
}
