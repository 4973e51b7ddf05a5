//! Durable outputs: segment and hourly reports plus the raw event log.
//!
//! Every output is written to a temporary file beside its destination and
//! only moved into place by an explicit commit.

pub mod raw_log;
pub mod report;
pub mod staged;

// Re-export commonly used types
pub use raw_log::RawEventLog;
pub use report::{read_segments, stage_hourly, stage_segments, REPORT_COLUMNS};
pub use staged::{commit_all, StagedFile};
