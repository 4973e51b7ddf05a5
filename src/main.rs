//! vitals-rollup CLI
//!
//! Simulates or replays a sensor stream and writes segment and hourly reports.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vitals_rollup::{
    config::Config,
    core::{HourlyRollup, SegmentStore, SensorReading},
    export,
    pipeline::{OutputPaths, Pipeline, PipelineConfig, RunReport},
    source::{RawLogReader, Simulator, SimulatorConfig},
    stats::{create_shared_log_with_persistence, RunLog},
    VERSION,
};

#[derive(Parser)]
#[command(name = "vitals-rollup")]
#[command(version = VERSION)]
#[command(about = "Segment and hourly summaries of heart rate and respiration streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a sensor stream and aggregate it
    Run {
        /// User the readings belong to (prompted when omitted)
        #[arg(long)]
        user: Option<String>,

        /// Run length in minutes (prompted when omitted)
        #[arg(long)]
        minutes: Option<u64>,

        /// Timestamp of the first reading (defaults to now)
        #[arg(long)]
        start: Option<u64>,

        /// Seed for reproducible readings
        #[arg(long)]
        seed: Option<u64>,

        /// Delay between readings in milliseconds
        #[arg(long, default_value = "0")]
        pace_ms: u64,

        /// Close the trailing partial segment when the stream ends
        #[arg(long)]
        flush_partial: bool,

        /// Output directory (defaults to the configured one)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Re-aggregate a raw event log
    Replay {
        /// Raw event log (one JSON reading per line)
        #[arg(long, short)]
        input: PathBuf,

        /// Expected user (defaults to the first reading's user)
        #[arg(long)]
        user: Option<String>,

        /// Run start (defaults to the first reading's timestamp)
        #[arg(long)]
        start: Option<u64>,

        /// Exclusive run end (defaults to one past the last reading)
        #[arg(long)]
        end: Option<u64>,

        /// Close the trailing partial segment when the log ends
        #[arg(long)]
        flush_partial: bool,

        /// Output directory (defaults to the configured one)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Roll up an existing segment report into hourly records
    Rollup {
        /// Segment report (CSV)
        #[arg(long)]
        segments: PathBuf,

        /// Run start (defaults to the first segment's start)
        #[arg(long)]
        start: Option<u64>,

        /// Exclusive run end (defaults to one past the last segment)
        #[arg(long)]
        end: Option<u64>,

        /// Output directory (defaults to the configured one)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show cumulative run statistics
    Status,

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            user,
            minutes,
            start,
            seed,
            pace_ms,
            flush_partial,
            output,
        } => cmd_run(user, minutes, start, seed, pace_ms, flush_partial, output),
        Commands::Replay {
            input,
            user,
            start,
            end,
            flush_partial,
            output,
        } => cmd_replay(&input, user, start, end, flush_partial, output),
        Commands::Rollup {
            segments,
            start,
            end,
            output,
        } => cmd_rollup(&segments, start, end, output),
        Commands::Status => cmd_status(),
        Commands::Config { init } => cmd_config(init),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config() -> anyhow::Result<Config> {
    Config::load().with_context(|| format!("loading {}", Config::config_path().display()))
}

fn cmd_run(
    user: Option<String>,
    minutes: Option<u64>,
    start: Option<u64>,
    seed: Option<u64>,
    pace_ms: u64,
    flush_partial: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config()?;

    let user = match user {
        Some(user) => user,
        None => prompt("Enter the name of the user: ")?,
    };
    if user.is_empty() {
        bail!("a user name is required");
    }

    let minutes = match minutes {
        Some(minutes) => minutes,
        None => {
            let answer = prompt(&format!(
                "Enter the time for simulation to run in minutes (default: {}): ",
                config.run_minutes
            ))?;
            if answer.is_empty() {
                config.run_minutes
            } else {
                answer
                    .parse()
                    .with_context(|| format!("'{answer}' is not a whole number of minutes"))?
            }
        }
    };

    let run_start = start.unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);
    let duration_secs = minutes
        .checked_mul(60)
        .with_context(|| format!("{minutes} minutes is too long a run"))?;
    let run_end = run_start
        .checked_add(duration_secs)
        .with_context(|| format!("a {minutes} minute run from t={run_start} ends too late"))?;
    let output_dir = output.as_deref();

    let pipeline_config = PipelineConfig {
        user_id: user.clone(),
        run_start,
        run_end,
        segment_length: config.segment_length.as_secs(),
        hour_length: config.hour_length.as_secs(),
        outputs: OutputPaths {
            segments: config.segments_path(output_dir),
            hourly: config.hourly_path(output_dir),
            raw_log: Some(config.raw_log_path(output_dir)),
        },
        flush_partial: flush_partial || config.flush_partial,
    };

    let mut sim_config = SimulatorConfig::new(user.clone(), run_start, duration_secs);
    sim_config.seed = seed;
    sim_config.pace = Duration::from_millis(pace_ms);
    let mut simulator = Simulator::new(sim_config);

    let stop = simulator.stop_handle();
    ctrlc_handler(stop.clone())?;

    let stats = create_shared_log_with_persistence(config.stats_path());
    let root = tracing::info_span!("vitals-rollup");
    let pipeline = Pipeline::new(pipeline_config, &root)?
        .with_stats(stats.clone())
        .with_cancellation(stop);

    println!("vitals-rollup v{VERSION}");
    println!();
    println!("  User: {user}");
    println!("  Run: {minutes} minute(s) from t={run_start}");
    println!("  Segment length: {}s", config.segment_length.as_secs());
    println!("  Hour length: {}s", config.hour_length.as_secs());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    simulator.start()?;
    let result = pipeline.run(simulator.receiver().iter().map(Ok));
    simulator.stop();
    let report = result?;

    if let Err(e) = stats.save() {
        tracing::warn!("could not save run stats: {e}");
    }

    print_report(&report);
    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_replay(
    input: &Path,
    user: Option<String>,
    start: Option<u64>,
    end: Option<u64>,
    flush_partial: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config()?;

    let readings: Vec<SensorReading> = RawLogReader::open(input)?.collect::<Result<_, _>>()?;
    let (first_user, first_timestamp) = match readings.first() {
        Some(first) => (first.user_id.clone(), first.timestamp),
        None => bail!("{} contains no readings", input.display()),
    };

    let run_start = start.unwrap_or(first_timestamp);
    let run_end = match end {
        Some(end) => end,
        None => readings
            .last()
            .map_or(Some(run_start), |r| r.timestamp.checked_add(1))
            .with_context(|| format!("{} ends past the representable time range", input.display()))?,
    };
    let output_dir = output.as_deref();

    let pipeline_config = PipelineConfig {
        user_id: user.unwrap_or(first_user),
        run_start,
        run_end,
        segment_length: config.segment_length.as_secs(),
        hour_length: config.hour_length.as_secs(),
        outputs: OutputPaths {
            segments: config.segments_path(output_dir),
            hourly: config.hourly_path(output_dir),
            raw_log: None,
        },
        flush_partial: flush_partial || config.flush_partial,
    };

    let stats = create_shared_log_with_persistence(config.stats_path());
    let root = tracing::info_span!("vitals-rollup");
    let report = Pipeline::new(pipeline_config, &root)?
        .with_stats(stats.clone())
        .run(readings.into_iter().map(Ok))?;

    if let Err(e) = stats.save() {
        tracing::warn!("could not save run stats: {e}");
    }

    println!("Replayed {}", input.display());
    print_report(&report);
    Ok(())
}

fn cmd_rollup(
    segments: &Path,
    start: Option<u64>,
    end: Option<u64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config()?;

    let records = export::read_segments(segments)?;
    let store = SegmentStore::from_records(records, config.segment_length.as_secs())?;
    let Some((first_start, last_end)) = store.covered_span() else {
        bail!("{} contains no segments", segments.display());
    };

    let run_start = start.unwrap_or(first_start);
    let run_end = match end {
        Some(end) => end,
        None => last_end
            .checked_add(1)
            .with_context(|| format!("{} ends past the representable time range", segments.display()))?,
    };

    let rollup = HourlyRollup::new(
        config.hour_length.as_secs(),
        tracing::info_span!("vitals-rollup", command = "rollup"),
    )?;
    let hourly = rollup.rollup(store.records(), run_start, run_end);

    let path = config.hourly_path(output.as_deref());
    let path = export::stage_hourly(&path, &hourly)?.commit()?;

    println!(
        "Rolled up {} segment(s) into {} hourly record(s)",
        store.len(),
        hourly.len()
    );
    println!("Hourly report: {}", path.display());
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config()?;

    println!("vitals-rollup Status");
    println!("====================");
    println!();
    println!("Configuration:");
    println!("  Segment length: {}s", config.segment_length.as_secs());
    println!("  Hour length: {}s", config.hour_length.as_secs());
    println!("  Output directory: {}", config.output_dir.display());
    println!("  Flush partial segment: {}", config.flush_partial);
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let stats = RunLog::with_persistence(stats_path).stats();
        println!("Cumulative Statistics:");
        println!("  Runs completed: {}", stats.runs_completed);
        println!("  Readings ingested: {}", stats.readings_ingested);
        println!("  Segments emitted: {}", stats.segments_emitted);
        println!("  Hourly records emitted: {}", stats.hourly_emitted);
        println!("  Report rows exported: {}", stats.rows_exported);
    } else {
        println!("No previous run data found.");
    }
    Ok(())
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let path = Config::config_path();

    if init {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        Config::default().save()?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = load_config()?;
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("Run {} finished", report.run_id);
    if report.cancelled {
        println!("  (cancelled: open segment discarded)");
    }
    println!("  Readings ingested: {}", report.readings);
    println!(
        "  Segments: {}{}",
        report.segments,
        if report.flushed_partial {
            " (last one partial)"
        } else {
            ""
        }
    );
    println!("  Hourly records: {}", report.hourly);
    println!("  Segment report: {}", report.outputs.segments.display());
    println!("  Hourly report: {}", report.outputs.hourly.display());
    if let Some(raw_log) = &report.outputs.raw_log {
        println!("  Raw event log: {}", raw_log.display());
    }
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl+C handler")
}
