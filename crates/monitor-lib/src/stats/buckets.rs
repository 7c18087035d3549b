//! Fixed-grain time buckets for animated series
//!
//! Replaying an events file, we want the state of some accumulating data
//! at the end of every time bucket, without copying the data on every
//! event. Callers hand over a snapshot closure that only runs when an
//! event crosses into a new bucket:
//!
//! ```ignore
//! let mut buckets = TimeBuckets::new(Duration::hours(6));
//! for event in events {
//!     buckets.observe(event.at, || data.clone());
//!     data.update(&event);
//! }
//! let animated = buckets.wrap(data);
//! ```

use crate::telemetry::schema::TIME_FORMAT;
use chrono::{DateTime, Duration, NaiveDateTime};

/// 2017-01-01T00:00:00Z; bucket boundaries are stable across replays
const EPOCH_SECS: i64 = 1_483_228_800;

/// Buckets events of a monotonically observed stream by fixed grain
#[derive(Debug)]
pub struct TimeBuckets<T> {
    grain_secs: i64,
    /// Closed buckets in the order they were closed
    closed: Vec<(i64, T)>,
    /// Bucket the stream is currently inside, once seen at least one event
    current: Option<i64>,
}

impl<T> TimeBuckets<T> {
    pub fn new(grain: Duration) -> Self {
        Self {
            grain_secs: grain.num_seconds().max(1),
            closed: Vec::new(),
            current: None,
        }
    }

    fn bucket_index(&self, at: NaiveDateTime) -> i64 {
        (at.and_utc().timestamp() - EPOCH_SECS).div_euclid(self.grain_secs)
    }

    /// Key a bucket by its end instant
    fn bucket_key(&self, index: i64) -> String {
        match DateTime::from_timestamp(EPOCH_SECS + (index + 1) * self.grain_secs, 0) {
            Some(end) => end.format(TIME_FORMAT).to_string(),
            None => index.to_string(),
        }
    }

    /// Note an event at `at`. When the event falls in a new bucket, the
    /// previous bucket is closed with `snapshot()`, which must capture the
    /// data as it stands *before* this event is applied.
    pub fn observe(&mut self, at: NaiveDateTime, snapshot: impl FnOnce() -> T) {
        let next = self.bucket_index(at);
        match self.current {
            None => self.current = Some(next),
            Some(current) if current != next => {
                self.closed.push((current, snapshot()));
                self.current = Some(next);
            }
            Some(_) => {}
        }
    }

    /// Close the last open bucket with the final data and return all
    /// snapshots keyed by readable end-of-bucket timestamps.
    pub fn wrap(mut self, data: T) -> Vec<(String, T)> {
        if let Some(current) = self.current {
            self.closed.push((current, data));
        }
        let keys: Vec<String> = self.closed.iter().map(|(q, _)| self.bucket_key(*q)).collect();
        keys.into_iter()
            .zip(self.closed.into_iter().map(|(_, v)| v))
            .collect()
    }

    /// Whether any event has been observed yet
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.closed.is_empty()
    }
}
