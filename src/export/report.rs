//! Tabular reports for segment and hourly records.
//!
//! Both reports share one column layout. Records are accumulated in memory
//! during the run and serialized once, here.

use crate::core::hourly::HourlyRecord;
use crate::core::segment::SegmentRecord;
use crate::error::{PipelineError, ResourceError, ValidationError};
use crate::export::staged::{temp_beside, StagedFile};
use serde::Serialize;
use std::path::Path;

/// Column order shared by segment and hourly reports.
pub const REPORT_COLUMNS: [&str; 7] = [
    "user_id", "seg_start", "seg_end", "avg_hr", "min_hr", "max_hr", "avg_rr",
];

/// Write segment records to a staged CSV file.
pub fn stage_segments(path: &Path, records: &[SegmentRecord]) -> Result<StagedFile, ResourceError> {
    stage_csv(path, records)
}

/// Write hourly records to a staged CSV file.
pub fn stage_hourly(path: &Path, records: &[HourlyRecord]) -> Result<StagedFile, ResourceError> {
    stage_csv(path, records)
}

/// Load a previously exported segment report.
pub fn read_segments(path: &Path) -> Result<Vec<SegmentRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ResourceError::new("open", path, std::io::Error::from(e)))?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<SegmentRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) if e.is_io_error() => {
                return Err(ResourceError::new("read", path, std::io::Error::from(e)).into())
            }
            Err(e) => {
                return Err(ValidationError::Malformed {
                    // Header is line 1.
                    line: index + 2,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
    Ok(records)
}

fn stage_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<StagedFile, ResourceError> {
    let file = temp_beside(path)?;
    let write_err = |e: csv::Error| ResourceError::new("write", path, std::io::Error::from(e));

    // Header written explicitly so an empty report still carries its columns.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(REPORT_COLUMNS).map_err(write_err)?;
    for record in records {
        writer.serialize(record).map_err(write_err)?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| ResourceError::new("flush", path, e.into_error()))?;
    Ok(StagedFile::new(file, path.to_path_buf()))
}
