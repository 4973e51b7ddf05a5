//! Sensor reading type and input validation.
//!
//! A reading is immutable once produced and is consumed exactly once by the
//! segment aggregator.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accepted heart rate range (beats per minute).
pub const HEART_RATE_RANGE: RangeInclusive<u32> = 40..=200;

/// Accepted respiration rate range (breaths per minute).
pub const RESPIRATION_RATE_RANGE: RangeInclusive<u32> = 10..=50;

/// Accepted activity score range.
pub const ACTIVITY_RANGE: RangeInclusive<u32> = 0..=100;

/// A single physiological sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub user_id: String,
    pub heart_rate: u32,
    pub respiration_rate: u32,
    /// Carried through to the raw log; not used by aggregation
    pub activity: u32,
    /// Seconds, non-decreasing within one user's stream
    pub timestamp: u64,
}

impl SensorReading {
    pub fn new(
        user_id: impl Into<String>,
        heart_rate: u32,
        respiration_rate: u32,
        activity: u32,
        timestamp: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            heart_rate,
            respiration_rate,
            activity,
            timestamp,
        }
    }

    /// Check the reading against the accepted input ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingUser {
                timestamp: self.timestamp,
            });
        }
        check_range("heart_rate", self.heart_rate, &HEART_RATE_RANGE, self.timestamp)?;
        check_range(
            "respiration_rate",
            self.respiration_rate,
            &RESPIRATION_RATE_RANGE,
            self.timestamp,
        )?;
        check_range("activity", self.activity, &ACTIVITY_RANGE, self.timestamp)?;
        Ok(())
    }

    /// Parse one line of a raw event log.
    ///
    /// `line` is the 1-based line number, used only for error reporting.
    pub fn from_json_line(text: &str, line: usize) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| ValidationError::Malformed {
            line,
            reason: e.to_string(),
        })
    }
}

fn check_range(
    field: &'static str,
    value: u32,
    range: &RangeInclusive<u32>,
    timestamp: u64,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
            timestamp,
        })
    }
}
