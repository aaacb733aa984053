//! Virtual file system layer for Sextant.
//!
//! The VFS is responsible for:
//! - Reading artifact bytes from the OS file system.
//! - Providing in-memory overlays (editor buffers) that take precedence over disk.
//! - Translating UTF-16 editor positions into byte offsets, with clamping.
//! - Representing file change events and a pluggable watcher interface.

mod buffer;
mod buffers;
mod fs;
mod watch;

pub use buffer::{Buffer, BufferError, ContentChange};
pub use buffers::Buffers;
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use watch::{
    FileChange, FileChangeKind, FileWatcher, ManualFileWatcher, ManualFileWatcherHandle,
    WatchEvent, WatchMessage,
};

#[cfg(feature = "watch-notify")]
pub use watch::NotifyFileWatcher;
