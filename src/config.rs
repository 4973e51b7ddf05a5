//! Configuration for vitals-rollup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Length of each segment window
    #[serde(with = "duration_serde")]
    pub segment_length: Duration,

    /// Length of each hourly roll-up window
    #[serde(with = "duration_serde")]
    pub hour_length: Duration,

    /// Default simulated run length in minutes
    pub run_minutes: u64,

    /// Directory receiving reports and the raw event log
    pub output_dir: PathBuf,

    /// File name of the segment report
    pub segments_file: String,

    /// File name of the hourly report
    pub hourly_file: String,

    /// File name of the raw event log
    pub raw_log_file: String,

    /// Path for storing cumulative run statistics
    pub data_path: PathBuf,

    /// Close a trailing partial segment when the stream ends
    pub flush_partial: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitals-rollup");

        Self {
            segment_length: Duration::from_secs(15 * 60),
            hour_length: Duration::from_secs(3600),
            run_minutes: 120,
            output_dir: data_dir.join("exports"),
            segments_file: "segments.csv".to_string(),
            hourly_file: "hourly.csv".to_string(),
            raw_log_file: "raw_events.jsonl".to_string(),
            data_path: data_dir,
            flush_partial: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitals-rollup")
            .join("config.json")
    }

    /// Check window lengths: both positive, hour a whole number of segments.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let segment = self.segment_length.as_secs();
        let hour = self.hour_length.as_secs();

        if segment == 0 {
            return Err(ConfigError::Invalid("segment_length must be at least 1s".into()));
        }
        if hour == 0 || hour % segment != 0 {
            return Err(ConfigError::Invalid(format!(
                "hour_length ({hour}s) must be a positive multiple of segment_length ({segment}s)"
            )));
        }
        Ok(())
    }

    pub fn segments_path(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .unwrap_or(self.output_dir.as_path())
            .join(&self.segments_file)
    }

    pub fn hourly_path(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .unwrap_or(self.output_dir.as_path())
            .join(&self.hourly_file)
    }

    pub fn raw_log_path(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .unwrap_or(self.output_dir.as_path())
            .join(&self.raw_log_file)
    }

    /// Where cumulative run statistics are persisted.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("run_stats.json")
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
