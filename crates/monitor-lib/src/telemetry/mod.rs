//! Per-course telemetry files and their writer

pub mod schema;
pub mod writer;

pub use schema::{EventRecord, KNOWN_COUNTS, TIME_FORMAT};
pub use writer::TelemetryWriter;
