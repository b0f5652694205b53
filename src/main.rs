use clap::Parser;
use organizer::cli::{RunOptions, run};
use organizer::file_organizer::ConflictPolicy;
use organizer::output::OutputFormatter;
use organizer::watcher::StopSignal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sort the files of a directory into category subfolders, then keep it sorted.
///
/// Categories are read from `organizer.toml` in `$XDG_CONFIG_HOME`
/// (or `~/.config`), under a `[folders]` table mapping each category to its
/// extensions, e.g. `pdf = [".pdf"]`.
#[derive(Parser)]
#[command(name = "organizer", version, about)]
struct Cli {
    /// Directory to organize. Defaults to the user's download directory.
    directory: Option<PathBuf>,

    /// Configuration file to use instead of the default location.
    #[arg(short, long, env = "ORGANIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Show what would be moved, without moving anything or watching.
    #[arg(long)]
    dry_run: bool,

    /// What to do when the destination file already exists.
    #[arg(long, value_enum)]
    on_conflict: Option<ConflictPolicy>,

    /// Longest single wait for filesystem events, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Do not print a line for every moved file.
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let options = RunOptions {
        directory: cli.directory,
        config_path: cli.config,
        on_conflict: cli.on_conflict,
        dry_run: cli.dry_run,
        quiet: cli.quiet,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
    };

    // Nothing raises the signal here; the loop ends on a watch failure or
    // when the process is killed.
    let stop = StopSignal::new();
    match run(&options, |key| std::env::var(key).ok(), &stop) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    }
}
