use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Mutex, MutexGuard};

use sextant_core::FileKey;

/// File system abstraction for Sextant.
///
/// Intentionally small so it can be implemented for different backends
/// (local disk, in-memory fixtures).
pub trait FileSystem: Send + Sync {
    /// Reads the file contents as raw bytes.
    fn read_bytes(&self, key: &FileKey) -> io::Result<Vec<u8>>;

    /// Reads the file contents as UTF-8 text.
    fn read_to_string(&self, key: &FileKey) -> io::Result<String>;

    /// Returns whether the file exists.
    fn exists(&self, key: &FileKey) -> bool;

    /// Returns basic metadata for a path.
    ///
    /// Implementations may return `ErrorKind::Unsupported`.
    fn metadata(&self, key: &FileKey) -> io::Result<fs::Metadata>;

    /// Lists directory entries. Implementations may return `ErrorKind::Unsupported`.
    fn read_dir(&self, key: &FileKey) -> io::Result<Vec<FileKey>>;
}

/// Local OS file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn read_bytes(&self, key: &FileKey) -> io::Result<Vec<u8>> {
        fs::read(key.as_path())
    }

    fn read_to_string(&self, key: &FileKey) -> io::Result<String> {
        fs::read_to_string(key.as_path())
    }

    fn exists(&self, key: &FileKey) -> bool {
        key.as_path().exists()
    }

    fn metadata(&self, key: &FileKey) -> io::Result<fs::Metadata> {
        fs::metadata(key.as_path())
    }

    fn read_dir(&self, key: &FileKey) -> io::Result<Vec<FileKey>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(key.as_path())? {
            let entry = entry?;
            out.push(FileKey::local(entry.path()));
        }
        Ok(out)
    }
}

/// In-memory file system for tests and synthetic documents.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<FileKey, String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: FileKey, text: impl Into<String>) {
        self.lock_files().insert(key, text.into());
    }

    pub fn remove(&self, key: &FileKey) {
        self.lock_files().remove(key);
    }

    #[track_caller]
    fn lock_files(&self) -> MutexGuard<'_, HashMap<FileKey, String>> {
        match self.files.lock() {
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

impl FileSystem for MemoryFs {
    fn read_bytes(&self, key: &FileKey) -> io::Result<Vec<u8>> {
        self.read_to_string(key).map(String::into_bytes)
    }

    fn read_to_string(&self, key: &FileKey) -> io::Result<String> {
        self.lock_files()
            .get(key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {key}")))
    }

    fn exists(&self, key: &FileKey) -> bool {
        self.lock_files().contains_key(key)
    }

    fn metadata(&self, key: &FileKey) -> io::Result<fs::Metadata> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("in-memory metadata not supported ({key})"),
        ))
    }

    fn read_dir(&self, key: &FileKey) -> io::Result<Vec<FileKey>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("in-memory directory listing not supported ({key})"),
        ))
    }
}
