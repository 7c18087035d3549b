//! Read-side aggregation of the raw telemetry files
//!
//! Three independent replays over the append-only logs: daily activity,
//! monitor counts, and notebook/student cross-usage. All of them skip and
//! log malformed lines; the writer may still be appending while they read.

pub mod buckets;
pub mod counts;
pub mod daily;
pub mod filter;
pub mod usage;

pub use buckets::TimeBuckets;
pub use counts::{monitor_counts, CountsReplay};
pub use daily::{daily_metrics, DailyMetrics, TotalsAccumulator};
pub use filter::{StudentFilter, DEFAULT_MIN_HASH_LEN};
pub use usage::{material_usage, Heatmap, MaterialUsage};
