use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use sextant_core::{FileKey, Position, Range};

use crate::buffer::{Buffer, BufferError, ContentChange};
use crate::fs::FileSystem;

/// Overlay cache of open documents on top of a [`FileSystem`].
///
/// While a document is open its buffer is the source of truth for text and
/// position mapping; everything else falls back to disk. Closing reverts to
/// disk truth.
#[derive(Debug)]
pub struct Buffers<F> {
    fs: F,
    open: Mutex<HashMap<FileKey, Buffer>>,
}

impl<F: FileSystem> Buffers<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Opens `key` with the given initial text and version.
    pub fn open(&self, key: FileKey, text: impl Into<String>, version: i32) {
        self.lock_open().insert(key, Buffer::new(text, version));
    }

    /// Replaces (or creates) the overlay entry for `key` and bumps its
    /// version.
    pub fn changed(&self, key: FileKey, text: impl Into<String>) {
        let mut open = self.lock_open();
        let version = open.get(&key).map_or(1, |buffer| buffer.version() + 1);
        open.insert(key, Buffer::new(text, version));
    }

    /// Applies incremental edits to an open document.
    pub fn apply_edits(
        &self,
        key: &FileKey,
        version: i32,
        changes: Vec<ContentChange>,
    ) -> Result<(), BufferError> {
        let mut open = self.lock_open();
        let buffer = open
            .get_mut(key)
            .ok_or_else(|| BufferError::NotOpen(key.clone()))?;
        buffer.apply(version, changes)
    }

    /// Drops the overlay for `key`, reverting to disk truth.
    pub fn closed(&self, key: &FileKey) {
        self.lock_open().remove(key);
    }

    pub fn is_open(&self, key: &FileKey) -> bool {
        self.lock_open().contains_key(key)
    }

    pub fn version(&self, key: &FileKey) -> Option<i32> {
        self.lock_open().get(key).map(Buffer::version)
    }

    /// A point-in-time copy of the open buffer for `key`.
    pub fn buffer(&self, key: &FileKey) -> Option<Buffer> {
        self.lock_open().get(key).cloned()
    }

    /// Overlay text if open, else the file read from disk.
    pub fn read(&self, key: &FileKey) -> io::Result<Arc<String>> {
        if let Some(buffer) = self.buffer(key) {
            return Ok(buffer.text().clone());
        }
        self.fs.read_to_string(key).map(Arc::new)
    }

    /// Like [`Buffers::read`], but absence is a normal case.
    pub fn source(&self, key: &FileKey) -> Option<Arc<String>> {
        if let Some(buffer) = self.buffer(key) {
            return Some(buffer.text().clone());
        }
        self.fs.read_to_string(key).ok().map(Arc::new)
    }

    /// Byte offset of `position` in the current text of `key` (overlay
    /// first, then disk). `None` when no text is available.
    pub fn offset(&self, key: &FileKey, position: Position) -> Option<usize> {
        if let Some(buffer) = self.buffer(key) {
            return Some(buffer.position_to_offset(position));
        }
        let text = self.fs.read_to_string(key).ok()?;
        Some(Buffer::new(text, 0).position_to_offset(position))
    }

    /// Clamps `range` against the live buffer when `key` is open; indexed
    /// coordinates for closed files pass through untouched.
    pub fn clamp_range(&self, key: &FileKey, range: Range) -> Range {
        match self.buffer(key) {
            Some(buffer) => buffer.clamp_range(range),
            None => range,
        }
    }

    #[track_caller]
    fn lock_open(&self) -> MutexGuard<'_, HashMap<FileKey, Buffer>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(err) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    target: "sextant.vfs",
                    file = loc.file(),
                    line = loc.line(),
                    column = loc.column(),
                    error = %err,
                    "mutex poisoned; continuing with recovered guard"
                );
                err.into_inner()
            }
        }
    }
}
