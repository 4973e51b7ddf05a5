//! Core aggregation engine.
//!
//! This module contains:
//! - The sensor reading type and its input validation
//! - Segment aggregation (watermark-closed fixed windows)
//! - The append-only segment store
//! - The hourly roll-up over closed segments

pub mod hourly;
pub mod reading;
pub mod segment;
pub mod store;

// Re-export commonly used types
pub use hourly::{HourlyRecord, HourlyRollup};
pub use reading::{SensorReading, ACTIVITY_RANGE, HEART_RATE_RANGE, RESPIRATION_RATE_RANGE};
pub use segment::{SegmentAggregator, SegmentRecord};
pub use store::SegmentStore;
