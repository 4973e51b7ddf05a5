//! Output files that only appear at their destination once complete.

use crate::error::ResourceError;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// A fully written temporary file waiting to be moved into place.
///
/// Dropping it without [`commit`](Self::commit) deletes the temporary file,
/// so an aborted run never leaves a truncated output behind.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    destination: PathBuf,
}

impl StagedFile {
    pub(crate) fn new(file: NamedTempFile, destination: PathBuf) -> Self {
        Self { file, destination }
    }

    /// Atomically move the file to its destination.
    pub fn commit(self) -> Result<PathBuf, ResourceError> {
        self.sync()?;
        self.file
            .persist(&self.destination)
            .map_err(|e| ResourceError::new("persist", &self.destination, e.error))?;
        Ok(self.destination)
    }

    fn sync(&self) -> Result<(), ResourceError> {
        self.file
            .as_file()
            .sync_all()
            .map_err(|e| ResourceError::new("sync", &self.destination, e))
    }
}

/// A destination already moved into place, with the file it replaced.
struct Published {
    destination: PathBuf,
    previous: Option<TempPath>,
}

/// Move every staged file into place, or none of them.
///
/// Existing destinations are set aside first. If any move fails, files
/// already published are removed and the set-aside originals restored.
pub fn commit_all(staged: Vec<StagedFile>) -> Result<Vec<PathBuf>, ResourceError> {
    for file in &staged {
        file.sync()?;
    }

    let mut published: Vec<Published> = Vec::with_capacity(staged.len());
    for StagedFile { file, destination } in staged {
        let previous = match set_aside(&destination) {
            Ok(previous) => previous,
            Err(e) => {
                roll_back(published);
                return Err(e);
            }
        };

        if let Err(e) = file.persist(&destination) {
            if let Some(previous) = previous {
                restore(previous, &destination);
            }
            roll_back(published);
            return Err(ResourceError::new("persist", destination, e.error));
        }
        published.push(Published {
            destination,
            previous,
        });
    }

    Ok(published.into_iter().map(|p| p.destination).collect())
}

/// Rename an existing regular file at `destination` out of the way.
fn set_aside(destination: &Path) -> Result<Option<TempPath>, ResourceError> {
    if !destination.is_file() {
        return Ok(None);
    }
    let backup = temp_beside(destination)?.into_temp_path();
    std::fs::rename(destination, &backup)
        .map_err(|e| ResourceError::new("set aside", destination, e))?;
    Ok(Some(backup))
}

fn roll_back(published: Vec<Published>) {
    for Published {
        destination,
        previous,
    } in published.into_iter().rev()
    {
        if let Err(e) = std::fs::remove_file(&destination) {
            tracing::warn!(path = %destination.display(), "could not withdraw output: {e}");
        }
        if let Some(previous) = previous {
            restore(previous, &destination);
        }
    }
}

fn restore(previous: TempPath, destination: &Path) {
    if let Err(e) = previous.persist(destination) {
        tracing::warn!(path = %destination.display(), "could not restore previous file: {}", e.error);
    }
}

/// Create a temporary file in the destination's directory.
pub(crate) fn temp_beside(destination: &Path) -> Result<NamedTempFile, ResourceError> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ResourceError::new("create directory", dir, e))?;
    NamedTempFile::new_in(dir).map_err(|e| ResourceError::new("create", destination, e))
}
