//! Directory watcher that sorts new arrivals as they land.
//!
//! [`DirectoryWatcher`] subscribes to the platform notification backend
//! through `notify` (inotify on Linux) for one directory, non-recursively.
//! Two event classes are acted upon: a file moved into the directory and a
//! file closed after being written, which is what a finished download looks
//! like. Everything else is ignored.
//!
//! # Lifecycle
//!
//! ```text
//!  Init ──subscribe()──▶ Running ──stop / backend failure──▶ Terminated
//!    │                                                          ▲
//!    └──────────────── registration failure ────────────────────┘
//! ```
//!
//! The loop waits on the event channel with a bounded timeout, so a
//! [`StopSignal`] raised from another thread is seen between drain cycles.

use crate::file_category::CategoryMap;
use crate::file_organizer::{RelocateError, Relocation, Relocator};
use crate::output::OutputFormatter;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default upper bound on a single wait for events.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors that end the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch could not be registered.
    #[error("failed to watch {}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The notification backend reported a failure.
    #[error("notification backend failed: {0}")]
    Backend(#[from] notify::Error),

    /// The watched directory itself was removed.
    #[error("watched directory {} was removed", .0.display())]
    DirectoryRemoved(PathBuf),

    /// The backend hung up its end of the event channel.
    #[error("event channel closed by the notification backend")]
    Disconnected,

    /// The requested transition is not valid from the current state.
    #[error("watcher is {0:?}")]
    InvalidState(WatchState),
}

/// Failure to turn one raw event into a [`PendingEvent`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{kind:?} event carries no file name")]
    MissingName { kind: EventKind },
}

/// Watch loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Not subscribed yet.
    Init,
    /// Subscribed and consuming events.
    Running,
    /// Stopped or failed; the subscription has been released.
    Terminated,
}

/// The event classes the watcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// A file was renamed or moved into the directory.
    MovedInto,
    /// A file opened for writing was closed.
    ClosedAfterWrite,
}

/// A decoded notification, consumed exactly once by [`DirectoryWatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Name of the affected entry, relative to the watched directory.
    pub name: OsString,
    pub class: EventClass,
}

/// Decodes a raw backend event.
///
/// Returns `Ok(None)` for event kinds the watcher does not act on.
///
/// # Errors
///
/// Returns [`DecodeError::MissingName`] when a relevant event has no path
/// with a file name.
pub fn decode(event: &Event) -> Result<Option<PendingEvent>, DecodeError> {
    let class = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => EventClass::ClosedAfterWrite,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
            EventClass::MovedInto
        }
        _ => return Ok(None),
    };

    // For paired renames the destination comes last.
    let name = event
        .paths
        .last()
        .and_then(|path| path.file_name())
        .ok_or(DecodeError::MissingName { kind: event.kind })?;

    Ok(Some(PendingEvent {
        name: name.to_os_string(),
        class,
    }))
}

/// What dispatching one [`PendingEvent`] amounted to.
#[derive(Debug)]
pub enum Dispatch {
    /// The relocator ran (the file may have been unmapped).
    Handled(Relocation),
    /// The entry is a directory and was left alone.
    Directory(PathBuf),
    /// The entry no longer exists, e.g. it was already moved.
    Vanished(PathBuf),
    /// The relocation failed.
    Failed(PathBuf, RelocateError),
}

/// Running totals of a watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub moved: usize,
    pub unmapped: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Cooperative cancellation flag for [`DirectoryWatcher::run`].
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the watch loop to return after its current drain cycle.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Subscription {
    // Dropping the watcher unregisters the watch.
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

/// Watches one directory and relocates files as they arrive.
pub struct DirectoryWatcher {
    dir: PathBuf,
    map: CategoryMap,
    relocator: Relocator,
    poll_interval: Duration,
    state: WatchState,
    subscription: Option<Subscription>,
    summary: WatchSummary,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("dir", &self.dir)
            .field("state", &self.state)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Creates a watcher for `dir` in the [`WatchState::Init`] state.
    ///
    /// `dir` should be absolute; event names are joined onto it.
    pub fn new(dir: impl Into<PathBuf>, map: CategoryMap, relocator: Relocator) -> Self {
        Self {
            dir: dir.into(),
            map,
            relocator,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: WatchState::Init,
            subscription: None,
            summary: WatchSummary::default(),
        }
    }

    /// Sets the upper bound on one wait for events.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Registers the watch: `Init` to `Running`, or `Terminated` on failure.
    ///
    /// Registration is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Register`] if the backend refuses the watch and
    /// [`WatchError::InvalidState`] if the watcher is not in `Init`.
    pub fn subscribe(&mut self) -> Result<(), WatchError> {
        if self.state != WatchState::Init {
            return Err(WatchError::InvalidState(self.state));
        }

        let (tx, rx) = mpsc::channel();
        let registered = notify::recommended_watcher(tx).and_then(|mut watcher| {
            watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });

        match registered {
            Ok(watcher) => {
                self.subscription = Some(Subscription {
                    _watcher: watcher,
                    events: rx,
                });
                self.state = WatchState::Running;
                OutputFormatter::info(&format!("Watching directory {}", self.dir.display()));
                Ok(())
            }
            Err(e) => {
                self.state = WatchState::Terminated;
                error!(dir = %self.dir.display(), error = %e, "watch registration failed");
                Err(WatchError::Register {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        }
    }

    /// Runs the watch loop until `stop` is raised or the backend fails.
    ///
    /// Subscribes first when still in `Init`. Every ready event is drained
    /// before waiting again; each wait lasts at most the poll interval. Ends
    /// in `Terminated` either way.
    ///
    /// # Errors
    ///
    /// Returns a [`WatchError`] on registration or backend failure. Failures
    /// that concern a single event or file are logged and do not end the loop.
    pub fn run(&mut self, stop: &StopSignal) -> Result<WatchSummary, WatchError> {
        if self.state == WatchState::Init {
            self.subscribe()?;
        }
        let subscription = match (self.state, self.subscription.take()) {
            (WatchState::Running, Some(subscription)) => subscription,
            (state, _) => return Err(WatchError::InvalidState(state)),
        };

        let result = self.drain_until_stopped(&subscription.events, stop);
        self.state = WatchState::Terminated;
        drop(subscription);

        match &result {
            Ok(summary) => info!(?summary, "watch stopped"),
            Err(e) => error!(error = %e, "watch terminated"),
        }
        result
    }

    fn drain_until_stopped(
        &mut self,
        events: &Receiver<notify::Result<Event>>,
        stop: &StopSignal,
    ) -> Result<WatchSummary, WatchError> {
        loop {
            if stop.is_stopped() {
                return Ok(self.summary);
            }

            let first = match events.recv_timeout(self.poll_interval) {
                Ok(first) => first,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
            };
            self.handle(first)?;

            loop {
                match events.try_recv() {
                    Ok(next) => self.handle(next)?,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Err(WatchError::Disconnected),
                }
            }
        }
    }

    fn handle(&mut self, received: notify::Result<Event>) -> Result<(), WatchError> {
        let event = match received {
            Ok(event) => event,
            Err(e) if matches!(e.kind, notify::ErrorKind::PathNotFound) => {
                warn!(error = %e, "dropping event");
                self.summary.failed += 1;
                return Ok(());
            }
            Err(e) => return Err(WatchError::Backend(e)),
        };

        if matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == &self.dir)
        {
            return Err(WatchError::DirectoryRemoved(self.dir.clone()));
        }

        match decode(&event) {
            Ok(Some(pending)) => {
                let outcome = self.dispatch(&pending);
                self.record(&outcome);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "could not decode event");
                self.summary.failed += 1;
            }
        }
        Ok(())
    }

    /// Relocates the entry named by `pending`.
    ///
    /// Whether the entry is a directory is checked here, at dispatch time, so
    /// category folders created by the relocator never feed back into it.
    pub fn dispatch(&self, pending: &PendingEvent) -> Dispatch {
        let path = self.dir.join(&pending.name);

        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => return Dispatch::Directory(path),
            Ok(_) => {}
            Err(_) => return Dispatch::Vanished(path),
        }

        let category = self.map.category_for(&path);
        match self.relocator.relocate(&path, category) {
            Ok(relocation) => Dispatch::Handled(relocation),
            Err(e) if e.is_source_missing() => Dispatch::Vanished(path),
            Err(e) => Dispatch::Failed(path, e),
        }
    }

    fn record(&mut self, outcome: &Dispatch) {
        match outcome {
            Dispatch::Handled(Relocation::Unmapped) => self.summary.unmapped += 1,
            Dispatch::Handled(_) => self.summary.moved += 1,
            Dispatch::Directory(path) => {
                debug!(path = %path.display(), "ignoring directory");
                self.summary.ignored += 1;
            }
            Dispatch::Vanished(path) => {
                debug!(path = %path.display(), "entry gone before dispatch");
                self.summary.ignored += 1;
            }
            Dispatch::Failed(path, e) => {
                OutputFormatter::error(&format!("{}: {}", path.display(), e));
                warn!(path = %path.display(), error = %e, "relocation failed");
                self.summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;
    use std::path::Path;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn pdf_map() -> CategoryMap {
        CategoryMap::build([("pdf".to_string(), vec![".pdf".to_string()])])
    }

    fn watcher_for(dir: &Path) -> DirectoryWatcher {
        DirectoryWatcher::new(dir, pdf_map(), Relocator::new().announce(false))
            .with_poll_interval(Duration::from_millis(50))
    }

    fn wait_for(path: &Path) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if path.exists() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_decode_close_write() {
        let event = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(PathBuf::from("/dl/d.pdf"));

        let pending = decode(&event).unwrap().unwrap();

        assert_eq!(pending.name, OsString::from("d.pdf"));
        assert_eq!(pending.class, EventClass::ClosedAfterWrite);
    }

    #[test]
    fn test_decode_rename_uses_destination() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/dl/d.pdf.part"))
            .add_path(PathBuf::from("/dl/d.pdf"));

        let pending = decode(&event).unwrap().unwrap();

        assert_eq!(pending.name, OsString::from("d.pdf"));
        assert_eq!(pending.class, EventClass::MovedInto);
    }

    #[test]
    fn test_decode_ignores_other_kinds() {
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path("/dl/x.pdf".into());
        let moved_away = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path("/dl/x.pdf".into());

        assert_eq!(decode(&create).unwrap(), None);
        assert_eq!(decode(&moved_away).unwrap(), None);
    }

    #[test]
    fn test_decode_without_path_is_error() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)));
        assert!(matches!(
            decode(&event),
            Err(DecodeError::MissingName { .. })
        ));
    }

    #[test]
    fn test_dispatch_ignores_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("scans.pdf")).unwrap();
        let watcher = watcher_for(temp_dir.path());

        let outcome = watcher.dispatch(&PendingEvent {
            name: "scans.pdf".into(),
            class: EventClass::MovedInto,
        });

        assert!(matches!(outcome, Dispatch::Directory(_)));
        assert!(temp_dir.path().join("scans.pdf").is_dir());
        assert!(!temp_dir.path().join("pdf").exists());
    }

    #[test]
    fn test_dispatch_relocates_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("d.pdf"), "pdf").unwrap();
        let watcher = watcher_for(temp_dir.path());

        let outcome = watcher.dispatch(&PendingEvent {
            name: "d.pdf".into(),
            class: EventClass::ClosedAfterWrite,
        });

        assert!(matches!(outcome, Dispatch::Handled(Relocation::Moved { .. })));
        assert!(temp_dir.path().join("pdf").join("d.pdf").is_file());
    }

    #[test]
    fn test_dispatch_vanished_file() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = watcher_for(temp_dir.path());

        let outcome = watcher.dispatch(&PendingEvent {
            name: "gone.pdf".into(),
            class: EventClass::MovedInto,
        });

        assert!(matches!(outcome, Dispatch::Vanished(_)));
        assert!(!temp_dir.path().join("pdf").exists());
    }

    #[test]
    fn test_dispatch_unmapped_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "txt").unwrap();
        let watcher = watcher_for(temp_dir.path());

        let outcome = watcher.dispatch(&PendingEvent {
            name: "notes.txt".into(),
            class: EventClass::ClosedAfterWrite,
        });

        assert!(matches!(outcome, Dispatch::Handled(Relocation::Unmapped)));
        assert!(temp_dir.path().join("notes.txt").is_file());
    }

    #[test]
    fn test_subscribe_missing_directory_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = watcher_for(&temp_dir.path().join("missing"));

        let result = watcher.subscribe();

        assert!(matches!(result, Err(WatchError::Register { .. })));
        assert_eq!(watcher.state(), WatchState::Terminated);
        assert!(matches!(
            watcher.run(&StopSignal::new()),
            Err(WatchError::InvalidState(WatchState::Terminated))
        ));
    }

    #[test]
    fn test_stop_signal_ends_loop() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = watcher_for(temp_dir.path());
        let stop = StopSignal::new();
        stop.stop();

        let summary = watcher.run(&stop).unwrap();

        assert_eq!(summary, WatchSummary::default());
        assert_eq!(watcher.state(), WatchState::Terminated);
    }

    #[test]
    fn test_live_close_write_is_relocated() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().canonicalize().unwrap();
        let mut watcher = watcher_for(&dir);
        watcher.subscribe().unwrap();
        assert_eq!(watcher.state(), WatchState::Running);

        let stop = StopSignal::new();
        let loop_stop = stop.clone();
        let handle = thread::spawn(move || watcher.run(&loop_stop));

        fs::write(dir.join("d.pdf"), "downloaded").unwrap();
        fs::write(dir.join("e.txt"), "left alone").unwrap();
        let arrived = wait_for(&dir.join("pdf").join("d.pdf"));

        stop.stop();
        let summary = handle.join().unwrap().unwrap();

        assert!(arrived, "d.pdf was not relocated");
        assert!(summary.moved >= 1);
        assert!(dir.join("e.txt").is_file());
    }

    #[test]
    fn test_live_move_into_directory_is_relocated() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("watched");
        fs::create_dir(&dir).unwrap();
        let dir = dir.canonicalize().unwrap();
        let staging = temp_dir.path().join("staging");
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("m.pdf"), "moved in").unwrap();

        let mut watcher = watcher_for(&dir);
        watcher.subscribe().unwrap();
        let stop = StopSignal::new();
        let loop_stop = stop.clone();
        let handle = thread::spawn(move || watcher.run(&loop_stop));

        fs::rename(staging.join("m.pdf"), dir.join("m.pdf")).unwrap();
        let arrived = wait_for(&dir.join("pdf").join("m.pdf"));

        stop.stop();
        handle.join().unwrap().unwrap();

        assert!(arrived, "m.pdf was not relocated");
    }
}
