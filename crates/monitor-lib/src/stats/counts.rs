//! Replay of per-cycle counts lines

use crate::telemetry::schema::KNOWN_COUNTS;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Counter series replayed from a counts file, one entry per accepted
/// line. Every known counter is present, keyed by its pluralized name;
/// values a line did not record yet are `None`, never zero, so "was zero"
/// and "not yet measured" stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountsReplay {
    pub timestamps: Vec<String>,
    #[serde(flatten)]
    pub series: BTreeMap<String, Vec<Option<u64>>>,
}

/// Replay a counts file against the currently known schema.
///
/// `#` header lines are skipped. Lines longer than the schema or with
/// non-integer values are rejected whole, keeping every series exactly
/// as long as `timestamps`.
pub fn monitor_counts(counts_path: &Path) -> CountsReplay {
    let mut timestamps = Vec::new();
    let mut columns: Vec<Vec<Option<u64>>> = vec![Vec::new(); KNOWN_COUNTS.len()];

    match File::open(counts_path) {
        Ok(file) => {
            for (lineno, line) in BufReader::new(file).lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(path = %counts_path.display(), line = lineno + 1, error = %e,
                              "Stopping counts replay on read error");
                        break;
                    }
                };
                if line.starts_with('#') {
                    continue;
                }
                let mut fields = line.split_whitespace();
                let Some(timestamp) = fields.next() else {
                    continue;
                };
                let values: Vec<&str> = fields.collect();
                if values.len() > KNOWN_COUNTS.len() {
                    warn!(path = %counts_path.display(), line = lineno + 1,
                          got = values.len(), max = KNOWN_COUNTS.len(),
                          "Counts line has too many fields");
                    continue;
                }
                let parsed: Result<Vec<u64>, _> = values.iter().map(|v| v.parse()).collect();
                let Ok(parsed) = parsed else {
                    warn!(path = %counts_path.display(), line = lineno + 1,
                          "Skipped misformed counts line");
                    continue;
                };

                timestamps.push(timestamp.to_string());
                for (index, column) in columns.iter_mut().enumerate() {
                    column.push(parsed.get(index).copied());
                }
            }
        }
        Err(e) => {
            debug!(path = %counts_path.display(), error = %e, "No counts file to replay");
        }
    }

    let series = KNOWN_COUNTS
        .iter()
        .zip(columns)
        .map(|(name, column)| (format!("{name}s"), column))
        .collect();
    CountsReplay { timestamps, series }
}
