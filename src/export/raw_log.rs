//! Append-only raw event log, one JSON object per ingested reading.
//!
//! The log is a debugging artifact written alongside aggregation. It is
//! acquired once per run and becomes visible at its destination only after
//! [`RawEventLog::finish`] and a successful commit.

use crate::core::reading::SensorReading;
use crate::error::ResourceError;
use crate::export::staged::{temp_beside, StagedFile};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::Span;

pub struct RawEventLog {
    destination: PathBuf,
    writer: BufWriter<NamedTempFile>,
    written: u64,
    span: Span,
}

impl RawEventLog {
    pub fn create(destination: impl Into<PathBuf>, span: Span) -> Result<Self, ResourceError> {
        let destination = destination.into();
        let file = temp_beside(&destination)?;

        tracing::debug!(parent: &span, path = %destination.display(), "raw event log opened");

        Ok(Self {
            destination,
            writer: BufWriter::new(file),
            written: 0,
            span,
        })
    }

    pub fn append(&mut self, reading: &SensorReading) -> Result<(), ResourceError> {
        serde_json::to_writer(&mut self.writer, reading)
            .map_err(|e| ResourceError::new("write", &self.destination, e.into()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| ResourceError::new("write", &self.destination, e))?;
        self.written += 1;
        Ok(())
    }

    /// Number of readings appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered lines and hand the file over for commit.
    pub fn finish(self) -> Result<StagedFile, ResourceError> {
        let Self {
            destination,
            writer,
            written,
            span,
        } = self;
        let file = writer
            .into_inner()
            .map_err(|e| ResourceError::new("flush", &destination, e.into_error()))?;

        tracing::debug!(parent: &span, lines = written, "raw event log flushed");

        Ok(StagedFile::new(file, destination))
    }
}
