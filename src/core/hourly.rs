//! Hourly roll-up of closed segments.
//!
//! Runs once, after ingestion, over the finalized segment store. Each hour
//! window that fits entirely inside `[run_start, run_end]` is summarized from
//! the segments lying inside it. A final partial hour is never emitted, and
//! an hour with no segments is skipped.
//!
//! Note: the hourly average is the mean of the per-segment averages. It is
//! not re-weighted by how many readings each segment held, so segments with
//! fewer readings count as much as full ones.

use crate::core::segment::SegmentRecord;
use crate::error::WindowError;
use serde::{Deserialize, Serialize};
use tracing::Span;

/// Summary of one fully covered hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub user_id: String,
    pub seg_start: u64,
    /// Inclusive: `seg_start + hour_length - 1`
    pub seg_end: u64,
    pub avg_hr: u32,
    pub min_hr: u32,
    pub max_hr: u32,
    pub avg_rr: u32,
}

/// Re-aggregates segment records into hour-long buckets.
pub struct HourlyRollup {
    hour_length: u64,
    span: Span,
}

impl HourlyRollup {
    pub fn new(hour_length: u64, span: Span) -> Result<Self, WindowError> {
        if hour_length == 0 {
            return Err(WindowError::ZeroLength { window: "hour" });
        }
        Ok(Self { hour_length, span })
    }

    /// Produce one record per fully covered hour, in increasing start order.
    ///
    /// `segments` must be ordered by `seg_start`, as the segment store keeps them.
    pub fn rollup(&self, segments: &[SegmentRecord], run_start: u64, run_end: u64) -> Vec<HourlyRecord> {
        let mut hourly = Vec::new();
        let mut started_on = run_start;

        while let Some(window_end) = started_on
            .checked_add(self.hour_length)
            .filter(|end| *end <= run_end)
        {
            let first = segments.partition_point(|s| s.seg_start < started_on);
            let subset: Vec<&SegmentRecord> = segments[first..]
                .iter()
                .take_while(|s| s.seg_end <= window_end)
                .collect();

            match summarize(&subset, started_on, window_end - 1) {
                Some(record) => {
                    tracing::debug!(
                        parent: &self.span,
                        seg_start = record.seg_start,
                        segments = subset.len(),
                        avg_hr = record.avg_hr,
                        "hour rolled up"
                    );
                    hourly.push(record);
                }
                None => {
                    tracing::debug!(
                        parent: &self.span,
                        seg_start = started_on,
                        "hour has no segments, skipped"
                    );
                }
            }

            started_on = window_end;
        }

        hourly
    }
}

fn summarize(subset: &[&SegmentRecord], seg_start: u64, seg_end: u64) -> Option<HourlyRecord> {
    let first = subset.first()?;

    Some(HourlyRecord {
        user_id: first.user_id.clone(),
        seg_start,
        seg_end,
        avg_hr: rounded_mean(subset.iter().map(|s| f64::from(s.avg_hr))),
        min_hr: subset.iter().map(|s| s.min_hr).fold(u32::MAX, u32::min),
        max_hr: subset.iter().map(|s| s.max_hr).fold(u32::MIN, u32::max),
        avg_rr: rounded_mean(subset.iter().map(|s| f64::from(s.avg_rr))),
    })
}

/// Mean rounded half-to-even. Callers guarantee a non-empty input.
fn rounded_mean(values: impl Iterator<Item = f64>) -> u32 {
    use statrs::statistics::Statistics;

    values.mean().round_ties_even() as u32
}
