/// Relocation of files into category subdirectories.
///
/// A file `<dir>/<name>` with category `C` is renamed to `<dir>/C/<name>`.
/// The category directory is created on demand: when the rename fails and the
/// directory is missing, it is created (one level only) and the rename is
/// retried exactly once.
use crate::output::OutputFormatter;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Let the platform rename replace the existing destination.
    #[default]
    Overwrite,
    /// Leave the source in place and report the conflict.
    Skip,
}

/// Errors that can occur while relocating a single file.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// The path has no parent directory or no file name component.
    #[error("{}: not a file path that can be relocated", .0.display())]
    InvalidPath(PathBuf),

    /// Failed to create the category directory.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The rename itself failed.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination exists and the conflict policy forbids replacing it.
    #[error("{} already exists, leaving {} in place", to.display(), from.display())]
    DestinationExists { from: PathBuf, to: PathBuf },
}

impl RelocateError {
    /// True when the failure was caused by the source disappearing.
    pub fn is_source_missing(&self) -> bool {
        matches!(
            self,
            Self::FileMoveFailure { source, from, .. }
                if source.kind() == io::ErrorKind::NotFound && !from.exists()
        )
    }
}

/// Result type for relocation operations.
pub type RelocateResult<T> = Result<T, RelocateError>;

/// Outcome of a relocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// The category was empty, the file was left in place.
    Unmapped,
    /// The file was moved.
    Moved {
        from: PathBuf,
        to: PathBuf,
        /// Whether the category directory had to be created for this move.
        created_dir: bool,
    },
    /// Dry run: the file would have been moved.
    WouldMove { from: PathBuf, to: PathBuf },
}

impl Relocation {
    /// Destination of a performed or simulated move.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Unmapped => None,
            Self::Moved { to, .. } | Self::WouldMove { to, .. } => Some(to),
        }
    }
}

/// Moves files into their category directories.
#[derive(Debug, Clone)]
pub struct Relocator {
    on_conflict: ConflictPolicy,
    dry_run: bool,
    announce: bool,
}

impl Default for Relocator {
    fn default() -> Self {
        Self {
            on_conflict: ConflictPolicy::Overwrite,
            dry_run: false,
            announce: true,
        }
    }
}

impl Relocator {
    /// Creates a relocator with the default behavior: overwrite on conflict,
    /// real moves, announced on stdout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the conflict policy.
    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    /// Only report what would move.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Print a timestamped line before each move.
    pub fn announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// Moves `file_path` to `parent(file_path) / category / file_name(file_path)`.
    ///
    /// An empty category is a no-op and returns [`Relocation::Unmapped`].
    ///
    /// # Errors
    ///
    /// Returns a [`RelocateError`] when the path cannot be relocated, the
    /// category directory cannot be created, the rename fails, or the
    /// destination exists under [`ConflictPolicy::Skip`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use organizer::file_organizer::Relocator;
    /// use std::path::Path;
    ///
    /// let relocator = Relocator::new();
    /// match relocator.relocate(Path::new("/home/me/Downloads/a.pdf"), "pdf") {
    ///     Ok(outcome) => println!("{:?}", outcome),
    ///     Err(e) => eprintln!("{}", e),
    /// }
    /// ```
    pub fn relocate(&self, file_path: &Path, category: &str) -> RelocateResult<Relocation> {
        if category.is_empty() {
            return Ok(Relocation::Unmapped);
        }

        let (category_dir, destination) = match (file_path.parent(), file_path.file_name()) {
            (Some(parent), Some(file_name)) => {
                let category_dir = parent.join(category);
                let destination = category_dir.join(file_name);
                (category_dir, destination)
            }
            _ => return Err(RelocateError::InvalidPath(file_path.to_path_buf())),
        };

        if self.announce {
            OutputFormatter::relocation(file_path, &destination, self.dry_run);
        }

        if self.dry_run {
            return Ok(Relocation::WouldMove {
                from: file_path.to_path_buf(),
                to: destination,
            });
        }

        if self.on_conflict == ConflictPolicy::Skip && fs::symlink_metadata(&destination).is_ok() {
            return Err(RelocateError::DestinationExists {
                from: file_path.to_path_buf(),
                to: destination,
            });
        }

        let created_dir = match fs::rename(file_path, &destination) {
            Ok(()) => false,
            Err(first_error) => {
                // Only a missing category directory earns a retry.
                if category_dir.is_dir() || fs::symlink_metadata(file_path).is_err() {
                    return Err(self.move_failure(file_path, &destination, first_error));
                }

                fs::create_dir(&category_dir).map_err(|e| {
                    RelocateError::DirectoryCreationFailed {
                        path: category_dir.clone(),
                        source: e,
                    }
                })?;
                tracing::debug!(dir = %category_dir.display(), "created category directory");

                fs::rename(file_path, &destination)
                    .map_err(|e| self.move_failure(file_path, &destination, e))?;
                true
            }
        };

        Ok(Relocation::Moved {
            from: file_path.to_path_buf(),
            to: destination,
            created_dir,
        })
    }

    fn move_failure(&self, from: &Path, to: &Path, source: io::Error) -> RelocateError {
        RelocateError::FileMoveFailure {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }
}
