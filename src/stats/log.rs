//! Run statistics.
//!
//! Counts what each run ingested and produced, and optionally persists the
//! cumulative totals so `status` can report them across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current process, seeded from persisted totals.
#[derive(Debug)]
pub struct RunLog {
    /// Number of readings accepted by the aggregator
    readings_ingested: AtomicU64,
    /// Number of segment records emitted
    segments_emitted: AtomicU64,
    /// Number of hourly records emitted
    hourly_emitted: AtomicU64,
    /// Number of report rows committed to disk
    rows_exported: AtomicU64,
    /// Number of runs that completed and committed their outputs
    runs_completed: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            readings_ingested: AtomicU64::new(0),
            segments_emitted: AtomicU64::new(0),
            hourly_emitted: AtomicU64::new(0),
            rows_exported: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a run log that loads and saves cumulative totals at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous run stats: {e}");
        }

        log
    }

    pub fn record_reading(&self) {
        self.readings_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment(&self) {
        self.segments_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hourly(&self, count: u64) {
        self.hourly_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rows_exported(&self, count: u64) {
        self.rows_exported.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            readings_ingested: self.readings_ingested.load(Ordering::Relaxed),
            segments_emitted: self.segments_emitted.load(Ordering::Relaxed),
            hourly_emitted: self.hourly_emitted.load(Ordering::Relaxed),
            rows_exported: self.rows_exported.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            started_at: self.started_at,
            elapsed_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Readings ingested: {}\n\
             - Segments emitted: {}\n\
             - Hourly records emitted: {}\n\
             - Report rows exported: {}\n\
             - Runs completed: {}\n\
             - Elapsed: {} seconds",
            stats.readings_ingested,
            stats.segments_emitted,
            stats.hourly_emitted,
            stats.rows_exported,
            stats.runs_completed,
            stats.elapsed_secs
        )
    }

    /// Save cumulative totals to disk (no-op without a persistence path).
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                readings_ingested: stats.readings_ingested,
                segments_emitted: stats.segments_emitted,
                hourly_emitted: stats.hourly_emitted,
                rows_exported: stats.rows_exported,
                runs_completed: stats.runs_completed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.readings_ingested
                    .store(persisted.readings_ingested, Ordering::Relaxed);
                self.segments_emitted
                    .store(persisted.segments_emitted, Ordering::Relaxed);
                self.hourly_emitted
                    .store(persisted.hourly_emitted, Ordering::Relaxed);
                self.rows_exported
                    .store(persisted.rows_exported, Ordering::Relaxed);
                self.runs_completed
                    .store(persisted.runs_completed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub readings_ingested: u64,
    pub segments_emitted: u64,
    pub hourly_emitted: u64,
    pub rows_exported: u64,
    pub runs_completed: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    readings_ingested: u64,
    segments_emitted: u64,
    hourly_emitted: u64,
    rows_exported: u64,
    runs_completed: u64,
    last_updated: DateTime<Utc>,
}

/// Run log shared between the pipeline and the CLI.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedRunLog {
    Arc::new(RunLog::with_persistence(path))
}
