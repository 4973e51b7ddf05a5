//! Append-only storage for closed segments.

use crate::core::segment::SegmentRecord;
use crate::error::ValidationError;

/// Ordered, append-only collection of segment records for one user.
///
/// Only the segment aggregator appends. Once ingestion ends the store is
/// handed over by value and read by the hourly roll-up and the exporters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentStore {
    records: Vec<SegmentRecord>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported records.
    ///
    /// The records must belong to a single user, span exactly
    /// `segment_length` seconds each and be contiguous.
    pub fn from_records(
        records: Vec<SegmentRecord>,
        segment_length: u64,
    ) -> Result<Self, ValidationError> {
        if segment_length == 0 {
            return Err(ValidationError::InconsistentSegments(
                "segment length must be at least one second".to_string(),
            ));
        }

        if let Some(first) = records.first() {
            for (index, record) in records.iter().enumerate() {
                if record.user_id != first.user_id {
                    return Err(ValidationError::InconsistentSegments(format!(
                        "row {} belongs to '{}', expected '{}'",
                        index + 1,
                        record.user_id,
                        first.user_id
                    )));
                }
                // Exclusive ends must stay representable for roll-up bounds.
                let Some(exclusive_end) = record.seg_end.checked_add(1) else {
                    return Err(ValidationError::InconsistentSegments(format!(
                        "row {} ends at t={}, past the representable time range",
                        index + 1,
                        record.seg_end
                    )));
                };
                if record.seg_start.checked_add(segment_length) != Some(exclusive_end) {
                    return Err(ValidationError::InconsistentSegments(format!(
                        "row {} spans [{}, {}], expected {} seconds",
                        index + 1,
                        record.seg_start,
                        record.seg_end,
                        segment_length
                    )));
                }
            }

            if let Some(index) = records
                .windows(2)
                .position(|pair| pair[0].seg_end.checked_add(1) != Some(pair[1].seg_start))
            {
                return Err(ValidationError::InconsistentSegments(format!(
                    "gap or overlap between rows {} and {}",
                    index + 1,
                    index + 2
                )));
            }
        }

        Ok(Self { records })
    }

    pub(crate) fn push(&mut self, record: SegmentRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SegmentRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SegmentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&SegmentRecord> {
        self.records.last()
    }

    /// Inclusive span from the first segment's start to the last segment's end.
    pub fn covered_span(&self) -> Option<(u64, u64)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.seg_start, last.seg_end)),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a SegmentStore {
    type Item = &'a SegmentRecord;
    type IntoIter = std::slice::Iter<'a, SegmentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
