//! vitals-rollup - windowed aggregation of physiological sensor streams.
//!
//! This library turns an ordered stream of heart rate / respiration readings
//! for one user into fixed-length segment summaries, then rolls those
//! segments up into hourly summaries.
//!
//! # Guarantees
//!
//! - **Contiguous segments**: each segment starts one second after the
//!   previous one ends, with no gaps and no overlap
//! - **Integral records**: segment averages are floor-divided, hourly
//!   averages are rounded means of segment averages
//! - **Full hours only**: a trailing partial hour is never emitted
//! - **No silent truncation**: outputs appear on disk only when the whole
//!   run succeeded
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          vitals-rollup                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐   │
//! │  │  Source   │──▶│  Segment   │──▶│  Segment  │──▶│  Hourly  │   │
//! │  │ (sim/log) │   │ Aggregator │   │   Store   │   │  Rollup  │   │
//! │  └───────────┘   └────────────┘   └───────────┘   └──────────┘   │
//! │        │                                │               │        │
//! │        ▼                                ▼               ▼        │
//! │  ┌───────────┐                    ┌──────────────────────────┐   │
//! │  │ Raw event │                    │   CSV reports (staged)   │   │
//! │  │    log    │                    └──────────────────────────┘   │
//! │  └───────────┘                                                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use vitals_rollup::core::{HourlyRollup, SegmentAggregator, SensorReading};
//! use tracing::Span;
//!
//! let mut aggregator = SegmentAggregator::new("alice", 0, 900, Span::none()).unwrap();
//! for t in 0..3600 {
//!     aggregator.ingest(&SensorReading::new("alice", 80, 20, 0, t)).unwrap();
//! }
//! let store = aggregator.finish();
//! assert_eq!(store.len(), 4);
//!
//! let hourly = HourlyRollup::new(3600, Span::none())
//!     .unwrap()
//!     .rollup(store.records(), 0, 3600);
//! assert_eq!(hourly.len(), 1);
//! assert_eq!(hourly[0].avg_hr, 80);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use crate::config::{Config, ConfigError};
pub use crate::core::{
    HourlyRecord, HourlyRollup, SegmentAggregator, SegmentRecord, SegmentStore, SensorReading,
};
pub use crate::error::{
    AggregationError, EmptySegmentError, PipelineError, ResourceError, ValidationError,
    WindowError,
};
pub use crate::pipeline::{OutputPaths, Pipeline, PipelineConfig, RunReport};
pub use crate::source::{RawLogReader, Simulator, SimulatorConfig};
pub use crate::stats::{RunLog, RunStats, SharedRunLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
