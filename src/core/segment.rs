//! Segment aggregation: turn an ordered reading stream into fixed-length
//! segment summaries.
//!
//! Exactly one accumulator is open at a time. A segment closes when an
//! incoming reading's timestamp reaches the last second of the window
//! (a watermark test, so gapped or irregular timestamps still close it).
//! The reading that crosses the watermark belongs to the closing segment.
//!
//! A trailing segment that never sees its watermark is left open when the
//! stream ends. Closing it early is a caller decision, see
//! [`SegmentAggregator::close_segment`].

use crate::core::reading::SensorReading;
use crate::core::store::SegmentStore;
use crate::error::{AggregationError, EmptySegmentError, ValidationError, WindowError};
use serde::{Deserialize, Serialize};
use tracing::Span;

/// Summary of one closed segment.
///
/// Averages are floor-divided so every field stays integral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub user_id: String,
    pub seg_start: u64,
    /// Inclusive: `seg_start + segment_length - 1`
    pub seg_end: u64,
    pub avg_hr: u32,
    pub min_hr: u32,
    pub max_hr: u32,
    pub avg_rr: u32,
}

/// Running statistics for the currently open segment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Accumulator {
    start_timeframe: u64,
    /// Exclusive end of the window
    end_timeframe: u64,
    min_hr: u32,
    max_hr: u32,
    sum_hr: u64,
    sum_rr: u64,
    count: u64,
}

impl Accumulator {
    fn new(start_timeframe: u64, segment_length: u64) -> Result<Self, WindowError> {
        let end_timeframe = start_timeframe
            .checked_add(segment_length)
            .ok_or(WindowError::Overflow {
                window: "segment",
                start: start_timeframe,
            })?;

        Ok(Self {
            start_timeframe,
            end_timeframe,
            min_hr: u32::MAX,
            max_hr: u32::MIN,
            sum_hr: 0,
            sum_rr: 0,
            count: 0,
        })
    }

    fn add(&mut self, reading: &SensorReading) {
        self.min_hr = self.min_hr.min(reading.heart_rate);
        self.max_hr = self.max_hr.max(reading.heart_rate);
        self.sum_hr += u64::from(reading.heart_rate);
        self.sum_rr += u64::from(reading.respiration_rate);
        self.count += 1;
    }

    fn closes_on(&self, timestamp: u64) -> bool {
        timestamp >= self.end_timeframe - 1
    }

    fn to_record(&self, user_id: &str) -> Result<SegmentRecord, EmptySegmentError> {
        if self.count == 0 {
            return Err(EmptySegmentError {
                user_id: user_id.to_string(),
                seg_start: self.start_timeframe,
                seg_end: self.end_timeframe - 1,
            });
        }

        // Floor division of per-reading values in u32 range stays in u32 range.
        Ok(SegmentRecord {
            user_id: user_id.to_string(),
            seg_start: self.start_timeframe,
            seg_end: self.end_timeframe - 1,
            avg_hr: (self.sum_hr / self.count) as u32,
            min_hr: self.min_hr,
            max_hr: self.max_hr,
            avg_rr: (self.sum_rr / self.count) as u32,
        })
    }

    /// An empty accumulator for the following window.
    fn next(&self) -> Result<Self, WindowError> {
        Self::new(self.end_timeframe, self.end_timeframe - self.start_timeframe)
    }
}

/// Consumes one user's reading stream and appends closed segments to its
/// [`SegmentStore`].
pub struct SegmentAggregator {
    user_id: String,
    segment_length: u64,
    accumulator: Accumulator,
    last_timestamp: Option<u64>,
    store: SegmentStore,
    span: Span,
}

impl SegmentAggregator {
    /// Create an aggregator whose first segment opens at `run_start`.
    ///
    /// Fails when `segment_length` is zero or the first window would end
    /// past `u64::MAX`.
    pub fn new(
        user_id: impl Into<String>,
        run_start: u64,
        segment_length: u64,
        span: Span,
    ) -> Result<Self, WindowError> {
        if segment_length == 0 {
            return Err(WindowError::ZeroLength { window: "segment" });
        }

        Ok(Self {
            user_id: user_id.into(),
            segment_length,
            accumulator: Accumulator::new(run_start, segment_length)?,
            last_timestamp: None,
            store: SegmentStore::new(),
            span,
        })
    }

    /// Push one reading into the open segment.
    ///
    /// Returns the closed segment if this reading crossed the watermark.
    /// A rejected reading leaves the accumulator untouched.
    pub fn ingest(
        &mut self,
        reading: &SensorReading,
    ) -> Result<Option<SegmentRecord>, AggregationError> {
        self.check(reading)?;

        self.accumulator.add(reading);
        self.last_timestamp = Some(reading.timestamp);

        if self.accumulator.closes_on(reading.timestamp) {
            return self.close_segment().map(Some);
        }
        Ok(None)
    }

    /// Close the open segment now, regardless of the watermark.
    ///
    /// The emitted record keeps the nominal window span. Fails with
    /// [`EmptySegmentError`] when no reading has been accumulated, or with
    /// [`WindowError::Overflow`] when no following window fits in `u64`; in
    /// both cases nothing is appended and the segment stays open.
    pub fn close_segment(&mut self) -> Result<SegmentRecord, AggregationError> {
        let record = self.accumulator.to_record(&self.user_id)?;
        let next = self.accumulator.next()?;

        tracing::debug!(
            parent: &self.span,
            seg_start = record.seg_start,
            seg_end = record.seg_end,
            readings = self.accumulator.count,
            avg_hr = record.avg_hr,
            "segment closed"
        );

        self.store.push(record.clone());
        self.accumulator = next;
        Ok(record)
    }

    /// Whether the open segment holds any readings.
    pub fn has_pending(&self) -> bool {
        self.accumulator.count > 0
    }

    /// Number of readings in the open segment.
    pub fn pending_count(&self) -> u64 {
        self.accumulator.count
    }

    /// Inclusive bounds of the currently open segment.
    pub fn open_window(&self) -> (u64, u64) {
        (
            self.accumulator.start_timeframe,
            self.accumulator.end_timeframe - 1,
        )
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn segment_length(&self) -> u64 {
        self.segment_length
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    /// End ingestion and hand over the finalized store.
    ///
    /// Any open segment is dropped as-is.
    pub fn finish(self) -> SegmentStore {
        if self.has_pending() {
            tracing::debug!(
                parent: &self.span,
                seg_start = self.accumulator.start_timeframe,
                readings = self.accumulator.count,
                "trailing partial segment left unflushed"
            );
        }
        self.store
    }

    fn check(&self, reading: &SensorReading) -> Result<(), ValidationError> {
        reading.validate()?;

        if reading.user_id != self.user_id {
            return Err(ValidationError::UserMismatch {
                expected: self.user_id.clone(),
                found: reading.user_id.clone(),
                timestamp: reading.timestamp,
            });
        }

        let watermark = self
            .last_timestamp
            .unwrap_or(self.accumulator.start_timeframe)
            .max(self.accumulator.start_timeframe);
        if reading.timestamp < watermark {
            return Err(ValidationError::OutOfOrder {
                timestamp: reading.timestamp,
                watermark,
            });
        }
        Ok(())
    }
}
