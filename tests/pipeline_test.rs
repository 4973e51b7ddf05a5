//! End-to-end tests for the aggregation pipeline.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::Span;
use vitals_rollup::core::{HourlyRollup, SegmentAggregator, SegmentRecord, SensorReading};
use vitals_rollup::error::{AggregationError, PipelineError};
use vitals_rollup::export;
use vitals_rollup::pipeline::{OutputPaths, Pipeline, PipelineConfig};
use vitals_rollup::source::{RawLogReader, ReadingGenerator, Simulator, SimulatorConfig};

fn outputs(dir: &Path) -> OutputPaths {
    OutputPaths {
        segments: dir.join("segments.csv"),
        hourly: dir.join("hourly.csv"),
        raw_log: Some(dir.join("raw_events.jsonl")),
    }
}

fn pipeline_config(dir: &Path, user: &str, run_start: u64, run_end: u64) -> PipelineConfig {
    PipelineConfig {
        user_id: user.to_string(),
        run_start,
        run_end,
        segment_length: 900,
        hour_length: 3600,
        outputs: outputs(dir),
        flush_partial: false,
    }
}

fn seeded(user: &str, run_start: u64, secs: u64, seed: u64) -> Vec<SensorReading> {
    ReadingGenerator::new(user, run_start, secs, StdRng::seed_from_u64(seed)).collect()
}

#[test]
fn test_alice_single_segment_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let readings = (0..900).map(|t| Ok(SensorReading::new("alice", 80, 20, 0, t)));

    let report = Pipeline::new(pipeline_config(dir.path(), "alice", 0, 900), &Span::none())
        .unwrap()
        .run(readings)
        .unwrap();
    assert_eq!(report.segments, 1);
    assert_eq!(report.hourly, 0);

    let segments = export::read_segments(&dir.path().join("segments.csv")).unwrap();
    assert_eq!(
        segments,
        vec![SegmentRecord {
            user_id: "alice".to_string(),
            seg_start: 0,
            seg_end: 899,
            avg_hr: 80,
            min_hr: 80,
            max_hr: 80,
            avg_rr: 20,
        }]
    );
}

#[test]
fn test_segment_boundaries_every_segment_length() {
    let readings = seeded("alice", 1_000, 7_200, 11);
    let mut aggregator = SegmentAggregator::new("alice", 1_000, 900, Span::none()).unwrap();
    for reading in &readings {
        aggregator.ingest(reading).unwrap();
    }
    let store = aggregator.finish();

    assert_eq!(store.len(), 8);
    assert_eq!(store.covered_span(), Some((1_000, 1_000 + 7_200 - 1)));
    for (i, record) in store.iter().enumerate() {
        assert_eq!(record.seg_start, 1_000 + i as u64 * 900);
        assert_eq!(record.seg_end, record.seg_start + 899);
    }
}

#[test]
fn test_segment_stats_match_raw_readings() {
    let readings = seeded("alice", 0, 2_700, 5);
    let mut aggregator = SegmentAggregator::new("alice", 0, 900, Span::none()).unwrap();
    for reading in &readings {
        aggregator.ingest(reading).unwrap();
    }

    for record in aggregator.store() {
        let window: Vec<&SensorReading> = readings
            .iter()
            .filter(|r| r.timestamp >= record.seg_start && r.timestamp <= record.seg_end)
            .collect();
        let count = window.len() as u64;
        let sum_hr: u64 = window.iter().map(|r| u64::from(r.heart_rate)).sum();
        let sum_rr: u64 = window.iter().map(|r| u64::from(r.respiration_rate)).sum();

        assert_eq!(u64::from(record.avg_hr), sum_hr / count);
        assert_eq!(u64::from(record.avg_rr), sum_rr / count);
        assert_eq!(record.min_hr, window.iter().map(|r| r.heart_rate).min().unwrap());
        assert_eq!(record.max_hr, window.iter().map(|r| r.heart_rate).max().unwrap());
        assert!(record.min_hr <= record.avg_hr && record.avg_hr <= record.max_hr);
    }
}

#[test]
fn test_empty_segment_close_appends_nothing() {
    let mut aggregator = SegmentAggregator::new("alice", 0, 900, Span::none()).unwrap();
    assert!(matches!(
        aggregator.close_segment(),
        Err(AggregationError::EmptySegment(_))
    ));
    assert!(aggregator.store().is_empty());
}

#[test]
fn test_hour_from_four_segments_and_partial_trailing_hour() {
    let segments: Vec<SegmentRecord> = (0..6)
        .map(|i| SegmentRecord {
            user_id: "alice".to_string(),
            seg_start: i * 900,
            seg_end: i * 900 + 899,
            avg_hr: 80,
            min_hr: 80,
            max_hr: 80,
            avg_rr: 20,
        })
        .collect();

    let rollup = HourlyRollup::new(3600, Span::none()).unwrap();
    let hourly = rollup.rollup(&segments[..4], 0, 3600);
    assert_eq!(hourly.len(), 1);
    assert_eq!((hourly[0].seg_start, hourly[0].seg_end), (0, 3599));
    assert_eq!(
        (hourly[0].avg_hr, hourly[0].min_hr, hourly[0].max_hr, hourly[0].avg_rr),
        (80, 80, 80, 20)
    );

    // Only two of the four segments of the second hour exist.
    let hourly = rollup.rollup(&segments, 0, 7200);
    assert_eq!(hourly.len(), 2);
    let hourly = rollup.rollup(&segments, 0, 5400);
    assert_eq!(hourly.len(), 1);
}

#[test]
fn test_hourly_never_exceeds_run_end() {
    let dir = tempfile::tempdir().unwrap();
    let readings = seeded("carol", 0, 9_000, 9);

    let report = Pipeline::new(pipeline_config(dir.path(), "carol", 0, 9_000), &Span::none())
        .unwrap()
        .run(readings.into_iter().map(Ok))
        .unwrap();
    assert_eq!(report.segments, 10);
    assert_eq!(report.hourly, 2);

    let content = std::fs::read_to_string(dir.path().join("hourly.csv")).unwrap();
    let mut rows = csv::Reader::from_reader(content.as_bytes());
    for row in rows.records() {
        let row = row.unwrap();
        let seg_end: u64 = row[2].parse().unwrap();
        assert!(seg_end <= 9_000);
    }
}

#[test]
fn test_simulated_run_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim_config = SimulatorConfig::new("dave", 500, 7_200);
    sim_config.seed = Some(21);
    let mut simulator = Simulator::new(sim_config);

    let pipeline =
        Pipeline::new(pipeline_config(dir.path(), "dave", 500, 7_700), &Span::none()).unwrap();
    simulator.start().unwrap();
    let report = pipeline.run(simulator.receiver().iter().map(Ok)).unwrap();
    simulator.stop();

    assert_eq!(report.readings, 7_200);
    assert_eq!(report.segments, 8);
    assert_eq!(report.hourly, 2);

    let raw: Vec<SensorReading> = RawLogReader::open(dir.path().join("raw_events.jsonl"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(raw.len(), 7_200);
    assert_eq!(raw[0].timestamp, 500);
}

#[test]
fn test_replay_reproduces_segments() {
    let first = tempfile::tempdir().unwrap();
    let readings = seeded("erin", 0, 3_600, 3);
    Pipeline::new(pipeline_config(first.path(), "erin", 0, 3_600), &Span::none())
        .unwrap()
        .run(readings.into_iter().map(Ok))
        .unwrap();

    let second = tempfile::tempdir().unwrap();
    let mut replay_config = pipeline_config(second.path(), "erin", 0, 3_600);
    replay_config.outputs.raw_log = None;
    let replayed = RawLogReader::open(first.path().join("raw_events.jsonl")).unwrap();
    Pipeline::new(replay_config, &Span::none())
        .unwrap()
        .run(replayed)
        .unwrap();

    assert_eq!(
        export::read_segments(&first.path().join("segments.csv")).unwrap(),
        export::read_segments(&second.path().join("segments.csv")).unwrap()
    );
    assert!(!second.path().join("raw_events.jsonl").exists());
}

#[test]
fn test_malformed_raw_log_aborts_without_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.jsonl");
    std::fs::write(
        &input,
        concat!(
            r#"{"user_id":"frank","heart_rate":80,"respiration_rate":20,"activity":1,"timestamp":0}"#,
            "\n",
            r#"{"user_id":"frank","respiration_rate":20,"activity":1,"timestamp":1}"#,
            "\n"
        ),
    )
    .unwrap();

    let out = dir.path().join("out");
    let mut config = pipeline_config(&out, "frank", 0, 3_600);
    config.outputs.raw_log = None;
    let err = Pipeline::new(config, &Span::none())
        .unwrap()
        .run(RawLogReader::open(&input).unwrap())
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(!out.join("segments.csv").exists());
    assert!(!out.join("hourly.csv").exists());
}
