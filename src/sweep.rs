//! One-time, non-recursive sorting of the files already present in a directory.

use crate::file_category::CategoryMap;
use crate::file_organizer::{RelocateError, Relocation, Relocator};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort a sweep as a whole.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The directory listing could not be opened.
    #[error("error reading directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to each entry visited by a sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Files moved (or, in a dry run, that would be moved), with their category.
    pub moved: Vec<(PathBuf, PathBuf, String)>,
    /// Files left in place because their extension is not mapped.
    pub unmapped: Vec<PathBuf>,
    /// Files that could not be relocated.
    pub failed: Vec<(PathBuf, RelocateError)>,
}

impl SweepReport {
    /// Number of files visited.
    pub fn visited(&self) -> usize {
        self.moved.len() + self.unmapped.len() + self.failed.len()
    }

    /// Moved file counts by category.
    pub fn category_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (_, _, category) in &self.moved {
            *counts.entry(category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Sorts every file directly inside `directory`.
///
/// Subdirectories (including existing category folders) are skipped and not
/// descended into. A failure on one file is recorded in the report and the
/// sweep carries on with the next entry.
///
/// # Errors
///
/// Returns [`SweepError::ReadDir`] if `directory` cannot be listed.
pub fn sweep(
    directory: &Path,
    map: &CategoryMap,
    relocator: &Relocator,
) -> Result<SweepReport, SweepError> {
    let entries = fs::read_dir(directory).map_err(|e| SweepError::ReadDir {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut report = SweepReport::default();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %directory.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let file_path = entry.path();
        if file_path.is_dir() {
            debug!(path = %file_path.display(), "skipping directory");
            continue;
        }

        let category = map.category_for(&file_path);
        match relocator.relocate(&file_path, category) {
            Ok(Relocation::Unmapped) => report.unmapped.push(file_path),
            Ok(Relocation::Moved { from, to, .. }) | Ok(Relocation::WouldMove { from, to }) => {
                report.moved.push((from, to, category.to_string()));
            }
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "could not relocate file");
                report.failed.push((file_path, e));
            }
        }
    }

    Ok(report)
}
