//! Replay of a newline-delimited raw event log.

use crate::core::reading::SensorReading;
use crate::error::{PipelineError, ResourceError};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Iterates the readings stored in a raw event log, one JSON object per line.
///
/// Blank lines are skipped. A line that cannot be parsed yields a
/// validation error naming its line number.
pub struct RawLogReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
    path: PathBuf,
}

impl RawLogReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ResourceError::new("open", path, e))?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: BufRead> RawLogReader<R> {
    /// Wrap any buffered reader; `path` is only used in error messages.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            path: path.into(),
        }
    }
}

impl<R: BufRead> Iterator for RawLogReader<R> {
    type Item = Result<SensorReading, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(ResourceError::new("read", self.path.clone(), e).into()))
                }
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }
            return Some(SensorReading::from_json_line(&text, self.line).map_err(Into::into));
        }
    }
}
