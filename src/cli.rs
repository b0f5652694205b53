//! Run orchestration for the organizer binary.
//!
//! This module ties the pieces together:
//! - Configuration loading and category map construction
//! - Watch directory resolution and validation
//! - The initial sweep and its summary
//! - Handing over to the watch loop

use crate::config::{ConfigError, OrganizerConfig};
use crate::file_organizer::{ConflictPolicy, Relocator};
use crate::output::OutputFormatter;
use crate::sweep::{SweepError, SweepReport, sweep};
use crate::watcher::{DEFAULT_POLL_INTERVAL, DirectoryWatcher, StopSignal, WatchError, WatchSummary};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors that end a run. All of them map to exit status 1.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no directory given and no download directory could be determined")]
    NoWatchDirectory,

    #[error("path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot resolve {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Options for one run, as collected from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory to organize; the download directory when `None`.
    pub directory: Option<PathBuf>,
    /// Explicit configuration file, bypassing the XDG lookup.
    pub config_path: Option<PathBuf>,
    /// Overrides `[options] on_conflict` from the configuration.
    pub on_conflict: Option<ConflictPolicy>,
    /// Sweep only and report, without moving anything or watching.
    pub dry_run: bool,
    /// Suppress the per-move lines.
    pub quiet: bool,
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            directory: None,
            config_path: None,
            on_conflict: None,
            dry_run: false,
            quiet: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How a successful run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Dry run: the sweep report, nothing was moved.
    DryRun(SweepReport),
    /// The watch loop was stopped after the sweep.
    Watched {
        sweep: SweepReport,
        watch: WatchSummary,
    },
}

/// Returns the platform download directory, or `~/Downloads`.
pub fn default_watch_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
}

/// Runs the organizer: load configuration, sweep the directory, then watch it.
///
/// Returns only when `stop` is raised, the watch subsystem fails, or after
/// the sweep in dry-run mode.
///
/// # Errors
///
/// Returns a [`RunError`] for setup failures (configuration, invalid
/// directory, watch registration) and for watch subsystem failures.
/// Per-file failures are reported and never end the run.
///
/// # Examples
///
/// ```no_run
/// use organizer::cli::{run, RunOptions};
/// use organizer::watcher::StopSignal;
/// use std::path::PathBuf;
///
/// let options = RunOptions {
///     directory: Some(PathBuf::from("/home/me/Downloads")),
///     dry_run: true,
///     ..RunOptions::default()
/// };
/// match run(&options, |key| std::env::var(key).ok(), &StopSignal::new()) {
///     Ok(_) => println!("done"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(
    options: &RunOptions,
    env_lookup: impl Fn(&str) -> Option<String>,
    stop: &StopSignal,
) -> Result<RunOutcome, RunError> {
    let config = OrganizerConfig::load(options.config_path.as_deref(), env_lookup)?;
    let map = config.category_map();
    if map.is_empty() {
        OutputFormatter::warning("No extensions configured, files will be left in place");
    } else {
        info!(
            extensions = map.len(),
            categories = map.category_count(),
            "loaded category map"
        );
    }

    let directory = watch_directory(options.directory.as_deref())?;

    let relocator = Relocator::new()
        .on_conflict(options.on_conflict.unwrap_or(config.options.on_conflict))
        .dry_run(options.dry_run)
        .announce(!options.quiet);

    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing folder {}", directory.display()));
    } else {
        OutputFormatter::info(&format!("Organizing folder {}", directory.display()));
    }

    let report = sweep(&directory, &map, &relocator)?;
    print_sweep_report(&report, options.dry_run);

    if options.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
        return Ok(RunOutcome::DryRun(report));
    }

    let mut watcher =
        DirectoryWatcher::new(directory, map, relocator).with_poll_interval(options.poll_interval);
    let watch = watcher.run(stop)?;

    Ok(RunOutcome::Watched {
        sweep: report,
        watch,
    })
}

/// Resolves and validates the directory to organize, as an absolute path.
fn watch_directory(requested: Option<&Path>) -> Result<PathBuf, RunError> {
    let directory = match requested {
        Some(dir) => dir.to_path_buf(),
        None => default_watch_dir().ok_or(RunError::NoWatchDirectory)?,
    };

    if !directory.is_dir() {
        return Err(RunError::NotADirectory(directory));
    }

    // Event names are joined onto this path, and removal of the directory
    // itself is detected by comparing against it.
    directory
        .canonicalize()
        .map_err(|e| RunError::Canonicalize {
            path: directory.clone(),
            source: e,
        })
}

fn print_sweep_report(report: &SweepReport, dry_run: bool) {
    if !report.moved.is_empty() {
        OutputFormatter::summary_table(&report.category_counts(), report.moved.len());
    }

    if !report.unmapped.is_empty() {
        info!(count = report.unmapped.len(), "files left in place");
    }

    if !report.failed.is_empty() {
        for (path, error) in &report.failed {
            OutputFormatter::error(&format!("{}: {}", path.display(), error));
        }
        OutputFormatter::warning(&format!(
            "{} of {} files could not be organized",
            report.failed.len(),
            report.visited()
        ));
    } else if !dry_run && !report.moved.is_empty() {
        OutputFormatter::success("Sweep complete");
    }
}
