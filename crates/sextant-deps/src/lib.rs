//! Dependency source handling for Sextant.
//!
//! A compiler config artifact lists classpath entries; the entries flagged
//! as source archives are extracted into a process-owned scratch directory
//! so their files (semantic artifact sidecars included) can flow through
//! the same ingestion pipeline as workspace files. Extraction results are
//! keyed by archive fingerprint and persist across runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod extract;
mod resolver;
mod scratch;

pub use extract::{extract_if_needed, ExtractOutcome, SourceExtractor, ZipSourceExtractor};
pub use resolver::{DependencyResolver, ResolveReport};
pub use scratch::{ScratchConfig, ScratchDir};

/// Errors produced by scratch-directory management and archive extraction.
#[derive(Debug, Error)]
pub enum DepsError {
    #[error("failed to determine home directory for default scratch path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("archive entry {entry:?} escapes the extraction directory")]
    UnsafeArchiveEntry { entry: String },
}

/// Identity of a dependency archive, hashed over its path, length, and
/// mtime. Matching fingerprints mean the archive is plausibly unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveFingerprint(u64);

impl ArchiveFingerprint {
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mut hasher = DefaultHasher::new();
        path.to_string_lossy().hash(&mut hasher);
        meta.len().hash(&mut hasher);
        hash_mtime(&mut hasher, &meta.modified()?);
        Ok(Self(hasher.finish()))
    }

    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

fn hash_mtime(hasher: &mut DefaultHasher, time: &SystemTime) {
    let duration = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0));
    duration.as_secs().hash(hasher);
    duration.subsec_nanos().hash(hasher);
}
