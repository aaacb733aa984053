use std::io;
use std::path::{Path, PathBuf};

use crossbeam_channel as channel;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One raw file system change. Renames arrive normalized as a
/// `Deleted`/`Created` pair for the two paths involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Event batch delivered by a watcher.
///
/// `Rescan` means events were lost (queue overflow or backend hiccup) and
/// the consumer must re-enumerate the watched roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changes { changes: Vec<FileChange> },
    Rescan,
}

/// Message type delivered by a [`FileWatcher`]. Backends may surface errors
/// asynchronously through the same stream.
pub type WatchMessage = io::Result<WatchEvent>;

/// Event-driven watcher abstraction.
///
/// Watchers may coalesce events; consumers treat them as hints and consult
/// the file system for authoritative state.
pub trait FileWatcher: Send {
    /// Begin watching `root` and all descendants.
    fn watch(&mut self, root: &Path) -> io::Result<()>;

    /// Returns the receiver used to consume watcher events.
    fn receiver(&self) -> &channel::Receiver<WatchMessage>;

    /// Drains all currently pending events without blocking.
    fn poll(&mut self) -> io::Result<Vec<WatchEvent>> {
        let mut out = Vec::new();
        for msg in self.receiver().try_iter() {
            match msg {
                Ok(event) => out.push(event),
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}

impl<W: ?Sized + FileWatcher> FileWatcher for Box<W> {
    fn watch(&mut self, root: &Path) -> io::Result<()> {
        self.as_mut().watch(root)
    }

    fn receiver(&self) -> &channel::Receiver<WatchMessage> {
        self.as_ref().receiver()
    }
}

const MANUAL_WATCH_QUEUE_CAPACITY: usize = 1024;

/// Deterministic watcher for tests and for hosts that push their own
/// events. Does not touch the OS.
///
/// Delivery uses a bounded queue; injection is non-blocking and reports
/// `WouldBlock` when the queue is full.
#[derive(Debug)]
pub struct ManualFileWatcher {
    tx: channel::Sender<WatchMessage>,
    rx: channel::Receiver<WatchMessage>,
    watched: Vec<PathBuf>,
}

/// Cloneable handle for injecting events after the watcher has been moved
/// into another thread.
#[derive(Debug, Clone)]
pub struct ManualFileWatcherHandle {
    tx: channel::Sender<WatchMessage>,
}

impl ManualFileWatcherHandle {
    pub fn push(&self, event: WatchEvent) -> io::Result<()> {
        self.send(Ok(event))
    }

    pub fn push_error(&self, error: io::Error) -> io::Result<()> {
        self.send(Err(error))
    }

    fn send(&self, message: WatchMessage) -> io::Result<()> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(channel::TrySendError::Full(_)) => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "watch queue is full",
            )),
            Err(channel::TrySendError::Disconnected(_)) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "watch receiver dropped",
            )),
        }
    }
}

impl Default for ManualFileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualFileWatcher {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(MANUAL_WATCH_QUEUE_CAPACITY);
        Self {
            tx,
            rx,
            watched: Vec::new(),
        }
    }

    pub fn handle(&self) -> ManualFileWatcherHandle {
        ManualFileWatcherHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn push(&self, event: WatchEvent) -> io::Result<()> {
        self.handle().push(event)
    }

    pub fn push_error(&self, error: io::Error) -> io::Result<()> {
        self.handle().push_error(error)
    }

    /// Roots passed to [`FileWatcher::watch`], in call order.
    pub fn watched_roots(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl FileWatcher for ManualFileWatcher {
    fn watch(&mut self, root: &Path) -> io::Result<()> {
        self.watched.push(root.to_path_buf());
        Ok(())
    }

    fn receiver(&self) -> &channel::Receiver<WatchMessage> {
        &self.rx
    }
}

#[cfg(any(test, feature = "watch-notify"))]
mod notify_impl {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use notify::event::{ModifyKind, RenameMode};
    use notify::{EventKind, RecursiveMode, Watcher};

    use super::*;

    const RAW_QUEUE_CAPACITY: usize = 4096;
    const EVENT_QUEUE_CAPACITY: usize = 1024;

    /// OS-backed watcher built on `notify`.
    ///
    /// Raw backend events land in a bounded queue drained by a dedicated
    /// thread; if the queue ever overflows the next delivered event is
    /// preceded by [`WatchEvent::Rescan`] so consumers re-enumerate instead
    /// of silently missing changes.
    pub struct NotifyFileWatcher {
        watcher: notify::RecommendedWatcher,
        rx: channel::Receiver<WatchMessage>,
    }

    impl NotifyFileWatcher {
        pub fn new() -> io::Result<Self> {
            let (raw_tx, raw_rx) = channel::bounded(RAW_QUEUE_CAPACITY);
            let overflowed = Arc::new(AtomicBool::new(false));

            let callback_overflow = Arc::clone(&overflowed);
            let watcher = notify::recommended_watcher(
                move |result: notify::Result<notify::Event>| {
                    if raw_tx.try_send(result).is_err() {
                        callback_overflow.store(true, Ordering::Relaxed);
                    }
                },
            )
            .map_err(into_io_error)?;

            let (events_tx, events_rx) = channel::bounded(EVENT_QUEUE_CAPACITY);
            thread::Builder::new()
                .name("sextant-watch-drain".to_owned())
                .spawn(move || drain_loop(raw_rx, events_tx, overflowed))?;

            Ok(Self {
                watcher,
                rx: events_rx,
            })
        }
    }

    impl FileWatcher for NotifyFileWatcher {
        fn watch(&mut self, root: &Path) -> io::Result<()> {
            self.watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(into_io_error)
        }

        fn receiver(&self) -> &channel::Receiver<WatchMessage> {
            &self.rx
        }
    }

    fn drain_loop(
        raw_rx: channel::Receiver<notify::Result<notify::Event>>,
        events_tx: channel::Sender<WatchMessage>,
        overflowed: Arc<AtomicBool>,
    ) {
        while let Ok(result) = raw_rx.recv() {
            // The flag was set while the raw queue was full, so this loop is
            // guaranteed to run again and deliver the rescan.
            if overflowed.swap(false, Ordering::Relaxed)
                && events_tx.send(Ok(WatchEvent::Rescan)).is_err()
            {
                return;
            }
            let message = match result {
                Ok(event) => {
                    let changes = translate_event(event);
                    if changes.is_empty() {
                        continue;
                    }
                    Ok(WatchEvent::Changes { changes })
                }
                Err(err) => Err(into_io_error(err)),
            };
            if events_tx.send(message).is_err() {
                return;
            }
        }
        tracing::debug!(target: "sextant.vfs", "notify stream closed; watch drain exiting");
    }

    /// Flattens one backend event into change records. Renames become a
    /// `Deleted`/`Created` pair; access-only events are dropped.
    pub(super) fn translate_event(event: notify::Event) -> Vec<FileChange> {
        let kinds: Vec<FileChangeKind> = match event.kind {
            EventKind::Create(_) => vec![FileChangeKind::Created; event.paths.len()],
            EventKind::Remove(_) => vec![FileChangeKind::Deleted; event.paths.len()],
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => vec![FileChangeKind::Deleted; event.paths.len()],
                RenameMode::To => vec![FileChangeKind::Created; event.paths.len()],
                RenameMode::Both if event.paths.len() == 2 => {
                    vec![FileChangeKind::Deleted, FileChangeKind::Created]
                }
                // Ambiguous rename reporting: let the file's existence decide.
                _ => event
                    .paths
                    .iter()
                    .map(|path| {
                        if path.exists() {
                            FileChangeKind::Created
                        } else {
                            FileChangeKind::Deleted
                        }
                    })
                    .collect(),
            },
            EventKind::Modify(_) | EventKind::Any => {
                vec![FileChangeKind::Modified; event.paths.len()]
            }
            EventKind::Access(_) | EventKind::Other => Vec::new(),
        };

        event
            .paths
            .into_iter()
            .zip(kinds)
            .map(|(path, kind)| FileChange { path, kind })
            .collect()
    }

    fn into_io_error(err: notify::Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

#[cfg(feature = "watch-notify")]
pub use notify_impl::NotifyFileWatcher;
