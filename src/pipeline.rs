//! Run orchestration: readings -> segments -> hourly roll-up -> reports.
//!
//! Ingestion and roll-up never overlap. The aggregator owns the segment
//! store while readings flow in and hands it over by value when the stream
//! ends; only then does the roll-up read it. Outputs are staged and
//! committed together at the very end, so a failed run publishes nothing.

use crate::core::{HourlyRecord, HourlyRollup, SegmentAggregator, SensorReading};
use crate::error::PipelineError;
use crate::export::{self, RawEventLog};
use crate::stats::SharedRunLog;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Span;
use uuid::Uuid;

/// Destinations for one run's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub segments: PathBuf,
    pub hourly: PathBuf,
    /// `None` skips the raw event log (e.g. when replaying one)
    pub raw_log: Option<PathBuf>,
}

/// Settings for a single run over one user's stream.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub user_id: String,
    pub run_start: u64,
    /// Exclusive end of the run; hours ending after it are not rolled up
    pub run_end: u64,
    pub segment_length: u64,
    pub hour_length: u64,
    pub outputs: OutputPaths,
    /// Close a trailing partial segment when the stream ends
    pub flush_partial: bool,
}

/// What a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub user_id: String,
    pub run_start: u64,
    /// End used for the hourly roll-up
    pub run_end: u64,
    pub readings: u64,
    pub segments: usize,
    pub hourly: usize,
    pub flushed_partial: bool,
    pub cancelled: bool,
    pub outputs: OutputPaths,
}

pub struct Pipeline {
    config: PipelineConfig,
    run_id: Uuid,
    span: Span,
    stats: Option<SharedRunLog>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    /// Validate the configuration and open a span for the run under `parent`.
    pub fn new(config: PipelineConfig, parent: &Span) -> Result<Self, PipelineError> {
        if config.user_id.trim().is_empty() {
            return Err(PipelineError::Config("user id must not be empty".to_string()));
        }
        if config.segment_length == 0 || config.hour_length == 0 {
            return Err(PipelineError::Config(
                "segment and hour lengths must be positive".to_string(),
            ));
        }
        if config.run_end < config.run_start {
            return Err(PipelineError::Config(format!(
                "run end {} is before run start {}",
                config.run_end, config.run_start
            )));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            parent: parent,
            "run",
            run_id = %run_id,
            user_id = %config.user_id
        );

        Ok(Self {
            config,
            run_id,
            span,
            stats: None,
            cancel: None,
        })
    }

    /// Count ingested readings and emitted records in `stats`.
    pub fn with_stats(mut self, stats: SharedRunLog) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Stop ingesting once `cancel` becomes `true`.
    ///
    /// A cancelled run never flushes its open segment, and its roll-up ends
    /// at the last closed segment.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Drive `readings` through aggregation, roll-up and export.
    pub fn run<I>(&self, readings: I) -> Result<RunReport, PipelineError>
    where
        I: IntoIterator<Item = Result<SensorReading, PipelineError>>,
    {
        let config = &self.config;
        tracing::info!(
            parent: &self.span,
            run_start = config.run_start,
            run_end = config.run_end,
            segment_length = config.segment_length,
            "run started"
        );

        let mut raw_log = match &config.outputs.raw_log {
            Some(path) => Some(RawEventLog::create(
                path,
                tracing::debug_span!(parent: &self.span, "raw_log"),
            )?),
            None => None,
        };

        let mut aggregator = SegmentAggregator::new(
            config.user_id.clone(),
            config.run_start,
            config.segment_length,
            tracing::debug_span!(parent: &self.span, "segments"),
        )?;

        let mut ingested: u64 = 0;
        for item in readings {
            if self.cancel_requested() {
                break;
            }
            let reading = item.inspect_err(|e| self.log_failure(e))?;

            let closed = aggregator
                .ingest(&reading)
                .map_err(PipelineError::from)
                .inspect_err(|e| self.log_failure(e))?;
            if let Some(raw_log) = raw_log.as_mut() {
                raw_log.append(&reading)?;
            }

            ingested += 1;
            if let Some(stats) = &self.stats {
                stats.record_reading();
                if closed.is_some() {
                    stats.record_segment();
                }
            }
        }

        let cancelled = self.cancel_requested();
        let mut flushed_partial = false;
        if cancelled {
            tracing::warn!(
                parent: &self.span,
                readings = ingested,
                "run cancelled, open segment discarded"
            );
        } else if config.flush_partial && aggregator.has_pending() {
            let record = aggregator.close_segment()?;
            flushed_partial = true;
            if let Some(stats) = &self.stats {
                stats.record_segment();
            }
            tracing::info!(
                parent: &self.span,
                seg_start = record.seg_start,
                "trailing partial segment flushed on request"
            );
        }

        let store = aggregator.finish();

        let run_end = if cancelled {
            store
                .covered_span()
                .map_or(config.run_start, |(_, end)| end + 1)
                .min(config.run_end)
        } else {
            config.run_end
        };

        let rollup = HourlyRollup::new(
            config.hour_length,
            tracing::debug_span!(parent: &self.span, "hourly"),
        )?;
        let hourly: Vec<HourlyRecord> = rollup.rollup(store.records(), config.run_start, run_end);

        let staged_segments = export::stage_segments(&config.outputs.segments, store.records())?;
        let staged_hourly = export::stage_hourly(&config.outputs.hourly, &hourly)?;
        let staged_raw = raw_log.map(RawEventLog::finish).transpose()?;

        let mut staged = vec![staged_segments, staged_hourly];
        staged.extend(staged_raw);
        export::commit_all(staged).inspect_err(|e| {
            tracing::error!(parent: &self.span, "run aborted: {e}");
        })?;

        if let Some(stats) = &self.stats {
            stats.record_hourly(hourly.len() as u64);
            stats.record_rows_exported((store.len() + hourly.len()) as u64);
            stats.record_run_completed();
        }

        let report = RunReport {
            run_id: self.run_id,
            user_id: config.user_id.clone(),
            run_start: config.run_start,
            run_end,
            readings: ingested,
            segments: store.len(),
            hourly: hourly.len(),
            flushed_partial,
            cancelled,
            outputs: config.outputs.clone(),
        };

        tracing::info!(
            parent: &self.span,
            readings = report.readings,
            segments = report.segments,
            hourly = report.hourly,
            "run finished"
        );
        Ok(report)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn log_failure(&self, error: &PipelineError) {
        tracing::error!(parent: &self.span, "run aborted: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn config(dir: &std::path::Path, run_end: u64) -> PipelineConfig {
        PipelineConfig {
            user_id: "alice".to_string(),
            run_start: 0,
            run_end,
            segment_length: 900,
            hour_length: 3600,
            outputs: OutputPaths {
                segments: dir.join("segments.csv"),
                hourly: dir.join("hourly.csv"),
                raw_log: Some(dir.join("raw.jsonl")),
            },
            flush_partial: false,
        }
    }

    fn constant(from: u64, to: u64) -> impl Iterator<Item = Result<SensorReading, PipelineError>> {
        (from..to).map(|t| Ok(SensorReading::new("alice", 80, 20, 5, t)))
    }

    #[test]
    fn test_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 3600);
        cfg.segment_length = 0;
        assert!(matches!(
            Pipeline::new(cfg, &Span::none()),
            Err(PipelineError::Config(_))
        ));

        let mut cfg = config(dir.path(), 3600);
        cfg.run_start = 10;
        cfg.run_end = 5;
        assert!(Pipeline::new(cfg, &Span::none()).is_err());
    }

    #[test]
    fn test_full_hour_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(dir.path(), 3600), &Span::none()).unwrap();
        let report = pipeline.run(constant(0, 3600)).unwrap();

        assert_eq!(report.readings, 3600);
        assert_eq!(report.segments, 4);
        assert_eq!(report.hourly, 1);
        assert!(!report.cancelled);
        assert!(dir.path().join("raw.jsonl").exists());
    }

    #[test]
    fn test_flush_partial_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 1000);
        cfg.flush_partial = true;
        let report = Pipeline::new(cfg, &Span::none())
            .unwrap()
            .run(constant(0, 1000))
            .unwrap();

        assert_eq!(report.segments, 2);
        assert!(report.flushed_partial);
    }

    #[test]
    fn test_failed_run_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(dir.path(), 3600), &Span::none()).unwrap();
        let readings = constant(0, 1000).chain(std::iter::once(Ok(SensorReading::new(
            "alice", 300, 20, 5, 1000,
        ))));

        let err = pipeline.run(readings).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cancelled_run_stops_and_skips_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 7200);
        cfg.flush_partial = true;
        let cancel = Arc::new(AtomicBool::new(false));
        let pipeline = Pipeline::new(cfg, &Span::none())
            .unwrap()
            .with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        let readings = constant(0, 7200).inspect(move |item| {
            if let Ok(reading) = item {
                if reading.timestamp == 4000 {
                    trigger.store(true, Ordering::SeqCst);
                }
            }
        });
        let report = pipeline.run(readings).unwrap();

        assert!(report.cancelled);
        assert!(!report.flushed_partial);
        assert_eq!(report.readings, 4000);
        assert_eq!(report.segments, 4);
        assert_eq!(report.run_end, 3600);
        assert_eq!(report.hourly, 1);
    }

    #[test]
    fn test_stats_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let stats = crate::stats::create_shared_log();
        Pipeline::new(config(dir.path(), 3600), &Span::none())
            .unwrap()
            .with_stats(stats.clone())
            .run(constant(0, 3600))
            .unwrap();

        let snapshot = stats.stats();
        assert_eq!(snapshot.readings_ingested, 3600);
        assert_eq!(snapshot.segments_emitted, 4);
        assert_eq!(snapshot.hourly_emitted, 1);
        assert_eq!(snapshot.rows_exported, 5);
        assert_eq!(snapshot.runs_completed, 1);
    }

    #[test]
    fn test_failed_commit_leaves_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let segments = dir.path().join("segments.csv");
        std::fs::write(&segments, "previous run").unwrap();
        // A non-empty directory cannot be replaced by a file.
        let hourly = dir.path().join("hourly.csv");
        std::fs::create_dir(&hourly).unwrap();
        std::fs::write(hourly.join("keep"), "x").unwrap();

        let err = Pipeline::new(config(dir.path(), 3600), &Span::none())
            .unwrap()
            .run(constant(0, 3600))
            .unwrap_err();

        match err {
            PipelineError::Resource(e) => assert_eq!(e.path, hourly),
            other => panic!("expected a resource error, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&segments).unwrap(), "previous run");
        assert!(hourly.is_dir());
        assert!(!dir.path().join("raw.jsonl").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_window_past_end_of_time_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), u64::MAX);
        cfg.run_start = u64::MAX - 100;

        let err = Pipeline::new(cfg, &Span::none())
            .unwrap()
            .run(std::iter::empty())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Window(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
