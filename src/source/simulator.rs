//! Simulated sensor that emits one random reading per second.
//!
//! Readings are produced on a background thread and delivered through a
//! bounded channel. The channel disconnects once the configured duration is
//! exhausted or a stop is requested, which is how consumers learn the stream
//! has ended.

use crate::core::reading::{SensorReading, ACTIVITY_RANGE, HEART_RATE_RANGE, RESPIRATION_RATE_RANGE};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

const CHANNEL_CAPACITY: usize = 10_000;

/// How long a blocked producer waits before re-checking the stop flag.
const SEND_POLL: Duration = Duration::from_millis(100);

/// Settings for a simulated run.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub user_id: String,
    /// Timestamp of the first reading
    pub run_start: u64,
    /// Number of one-second readings to produce
    pub duration_secs: u64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
    /// Wall-clock delay between readings (zero runs as fast as possible)
    pub pace: Duration,
}

impl SimulatorConfig {
    pub fn new(user_id: impl Into<String>, run_start: u64, duration_secs: u64) -> Self {
        Self {
            user_id: user_id.into(),
            run_start,
            duration_secs,
            seed: None,
            pace: Duration::ZERO,
        }
    }
}

/// Errors that can occur while driving the simulator.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("simulator has already been started")]
    AlreadyStarted,
}

/// Deterministic reading generator, one reading per second.
pub struct ReadingGenerator<R: Rng> {
    user_id: String,
    next_timestamp: u64,
    end: u64,
    rng: R,
}

impl<R: Rng> ReadingGenerator<R> {
    pub fn new(user_id: impl Into<String>, run_start: u64, duration_secs: u64, rng: R) -> Self {
        Self {
            user_id: user_id.into(),
            next_timestamp: run_start,
            end: run_start + duration_secs,
            rng,
        }
    }
}

impl<R: Rng> Iterator for ReadingGenerator<R> {
    type Item = SensorReading;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_timestamp >= self.end {
            return None;
        }
        let reading = SensorReading::new(
            self.user_id.clone(),
            self.rng.gen_range(HEART_RATE_RANGE),
            self.rng.gen_range(RESPIRATION_RATE_RANGE),
            self.rng.gen_range(ACTIVITY_RANGE),
            self.next_timestamp,
        );
        self.next_timestamp += 1;
        Some(reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next_timestamp) as usize;
        (remaining, Some(remaining))
    }
}

/// Background reading producer.
pub struct Simulator {
    config: SimulatorConfig,
    sender: Option<Sender<SensorReading>>,
    receiver: Receiver<SensorReading>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start producing readings on a background thread.
    ///
    /// A simulator runs once; starting it again is an error.
    pub fn start(&mut self) -> Result<(), SimulatorError> {
        let sender = self.sender.take().ok_or(SimulatorError::AlreadyStarted)?;

        self.running.store(true, Ordering::SeqCst);

        let config = self.config.clone();
        let running = self.running.clone();
        let stop_requested = self.stop_requested.clone();

        let handle = thread::spawn(move || {
            let rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let generator =
                ReadingGenerator::new(config.user_id, config.run_start, config.duration_secs, rng);
            produce(generator, &sender, &stop_requested, config.pace);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Request a stop and wait for the producer thread to exit.
    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the producer is still emitting readings.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared flag that stops the producer when set to `true`.
    ///
    /// Suitable for wiring into a Ctrl+C handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_requested.clone()
    }

    /// Get the receiver for sensor readings.
    pub fn receiver(&self) -> &Receiver<SensorReading> {
        &self.receiver
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce(
    generator: impl Iterator<Item = SensorReading>,
    sender: &Sender<SensorReading>,
    stop_requested: &AtomicBool,
    pace: Duration,
) {
    for mut reading in generator {
        loop {
            if stop_requested.load(Ordering::SeqCst) {
                return;
            }
            match sender.send_timeout(reading, SEND_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(r)) => reading = r,
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
        if !pace.is_zero() {
            thread::sleep(pace);
        }
    }
}
