//! organizer - keep a downloads directory sorted
//!
//! This library sorts the files of one directory into category subfolders
//! chosen by file extension. It sweeps the files already present, then watches
//! the directory and sorts new arrivals as they are moved in or finish being
//! written. Categories come from a TOML configuration file.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod output;
pub mod sweep;
pub mod watcher;

pub use config::{ConfigError, OrganizerConfig};
pub use file_category::CategoryMap;
pub use file_organizer::{ConflictPolicy, Relocation, Relocator};
pub use sweep::{SweepReport, sweep};
pub use watcher::{DirectoryWatcher, StopSignal, WatchError};

pub use cli::{RunOptions, run};
