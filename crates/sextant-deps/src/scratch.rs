use std::path::{Path, PathBuf};

use crate::{ArchiveFingerprint, DepsError};

/// Configuration for selecting the on-disk scratch root.
#[derive(Clone, Debug, Default)]
pub struct ScratchConfig {
    /// Override the scratch directory (the per-archive layout is unchanged).
    pub scratch_root_override: Option<PathBuf>,
}

impl ScratchConfig {
    pub fn from_env() -> Self {
        Self {
            scratch_root_override: std::env::var_os("SEXTANT_CACHE_DIR").map(PathBuf::from),
        }
    }
}

/// Process-owned directory holding extracted dependency sources.
///
/// Layout: one `<stem>-<fingerprint16>/` subdirectory per archive plus a
/// sibling `<stem>-<fingerprint16>.stamp` file recording the fingerprint
/// the directory was extracted from. Contents survive restarts.
#[derive(Clone, Debug)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(config: ScratchConfig) -> Result<Self, DepsError> {
        let base = match config.scratch_root_override {
            Some(root) => root,
            None => default_scratch_root()?,
        };

        let root = base.join("sources");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extraction directory for one archive identity.
    pub fn archive_dir(&self, archive: &Path, fingerprint: ArchiveFingerprint) -> PathBuf {
        self.root.join(archive_dir_name(archive, fingerprint))
    }

    /// Stamp file recording a completed extraction of `archive`.
    pub fn stamp_path(&self, archive: &Path, fingerprint: ArchiveFingerprint) -> PathBuf {
        self.root
            .join(format!("{}.stamp", archive_dir_name(archive, fingerprint)))
    }
}

fn archive_dir_name(archive: &Path, fingerprint: ArchiveFingerprint) -> String {
    let stem = archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_owned());
    format!("{stem}-{}", fingerprint.to_hex())
}

fn default_scratch_root() -> Result<PathBuf, DepsError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(DepsError::MissingHomeDir)?;

    Ok(home.join(".sextant").join("cache"))
}
