//! Error taxonomy for the aggregation pipeline.
//!
//! Every error here is unrecoverable at the core level: nothing retries
//! internally, and the orchestrating caller decides whether to abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// A sensor reading was rejected before it touched the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("reading at t={timestamp}: {field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
        timestamp: u64,
    },

    #[error("reading at t={timestamp} has an empty user_id")]
    MissingUser { timestamp: u64 },

    #[error("reading at t={timestamp} belongs to user '{found}', stream is for '{expected}'")]
    UserMismatch {
        expected: String,
        found: String,
        timestamp: u64,
    },

    #[error("reading at t={timestamp} is earlier than {watermark} (stream must be ordered)")]
    OutOfOrder { timestamp: u64, watermark: u64 },

    #[error("line {line}: malformed reading: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("segment export is inconsistent: {0}")]
    InconsistentSegments(String),
}

/// A segment tried to close without a single reading in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("segment [{seg_start}, {seg_end}] for user '{user_id}' closed with no readings")]
pub struct EmptySegmentError {
    pub user_id: String,
    pub seg_start: u64,
    pub seg_end: u64,
}

/// Durable output could not be opened, written or flushed.
#[derive(Debug, Error)]
#[error("failed to {action} {}: {source}", .path.display())]
pub struct ResourceError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ResourceError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Window parameters that cannot describe a real window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("{window} length must be at least one second")]
    ZeroLength { window: &'static str },

    #[error("{window} window starting at t={start} ends past the representable time range")]
    Overflow { window: &'static str, start: u64 },
}

/// Errors raised by the segment aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    EmptySegment(#[from] EmptySegmentError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Anything that can abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("aggregation failed: {0}")]
    EmptySegment(#[from] EmptySegmentError),

    #[error("invalid window: {0}")]
    Window(#[from] WindowError),

    #[error("output failed: {0}")]
    Resource(#[from] ResourceError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<AggregationError> for PipelineError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::Validation(e) => PipelineError::Validation(e),
            AggregationError::EmptySegment(e) => PipelineError::EmptySegment(e),
            AggregationError::Window(e) => PipelineError::Window(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segment_message_names_window() {
        let err = EmptySegmentError {
            user_id: "alice".to_string(),
            seg_start: 900,
            seg_end: 1799,
        };
        let msg = err.to_string();
        assert!(msg.contains("[900, 1799]"));
        assert!(msg.contains("alice"));
    }

    #[test]
    fn test_aggregation_error_maps_to_pipeline_variant() {
        let err = AggregationError::from(ValidationError::MissingUser { timestamp: 3 });
        assert!(matches!(
            PipelineError::from(err),
            PipelineError::Validation(ValidationError::MissingUser { timestamp: 3 })
        ));
    }

    #[test]
    fn test_resource_error_mentions_path() {
        let err = ResourceError::new(
            "create",
            "/nowhere/segments.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nowhere/segments.csv"));
        assert!(err.to_string().starts_with("failed to create"));
    }
}
