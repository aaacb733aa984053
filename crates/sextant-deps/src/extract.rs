use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::{ArchiveFingerprint, DepsError, ScratchDir};

/// Size cap for stamp files. Anything larger is treated as corrupted.
const MAX_STAMP_LEN_BYTES: u64 = 4096;

/// Pluggable archive extraction, so resolver tests can count invocations
/// without shipping real archives.
pub trait SourceExtractor: Send + Sync {
    /// Extracts `archive` into `dest`, returning the extracted file paths.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, DepsError>;
}

/// Extracts zip source archives (including jar-shaped ones).
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipSourceExtractor;

impl SourceExtractor for ZipSourceExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, DepsError> {
        let file = File::open(archive)?;
        let mut zip = ZipArchive::new(file)?;

        let mut out = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if !entry.is_file() {
                continue;
            }

            // `enclosed_name` rejects absolute paths and `..` components.
            let Some(rel) = entry.enclosed_name().map(Path::to_path_buf) else {
                return Err(DepsError::UnsafeArchiveEntry {
                    entry: entry.name().to_owned(),
                });
            };

            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            std::fs::write(&target, bytes)?;
            out.push(target);
        }

        Ok(out)
    }
}

/// Bincode record written next to an extraction directory once the archive
/// has been fully extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExtractionStamp {
    fingerprint: ArchiveFingerprint,
    archive_path: String,
    file_count: u64,
    saved_at_millis: u64,
}

/// Result of [`extract_if_needed`].
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    /// Extraction directory for this archive identity.
    pub dir: PathBuf,
    /// Files available under `dir`, whether extracted now or reused.
    pub files: Vec<PathBuf>,
    /// Whether the extractor actually ran.
    pub extracted: bool,
}

/// Extracts `archive` into the scratch directory unless a valid stamp shows
/// the same fingerprint was already extracted there.
///
/// A stamp that is missing, unreadable, or recorded for a different
/// fingerprint forces re-extraction; the stale extraction directory is
/// replaced wholesale. The stamp is written only after the extractor
/// succeeds, so partial extractions are never mistaken for complete ones.
pub fn extract_if_needed(
    scratch: &ScratchDir,
    archive: &Path,
    fingerprint: ArchiveFingerprint,
    extractor: &dyn SourceExtractor,
) -> Result<ExtractOutcome, DepsError> {
    let dir = scratch.archive_dir(archive, fingerprint);
    let stamp_path = scratch.stamp_path(archive, fingerprint);

    if load_stamp(&stamp_path, fingerprint).is_some() {
        let files = sextant_core::collect_files(&dir)?;
        tracing::debug!(
            target: "sextant.deps",
            archive = %archive.display(),
            dir = %dir.display(),
            files = files.len(),
            "source archive already extracted; reusing scratch contents"
        );
        return Ok(ExtractOutcome {
            dir,
            files,
            extracted: false,
        });
    }

    match std::fs::remove_dir_all(&dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    std::fs::create_dir_all(&dir)?;

    let files = extractor.extract(archive, &dir)?;

    if let Err(err) = write_stamp(&stamp_path, fingerprint, archive, files.len() as u64) {
        // Next run re-extracts; extraction itself succeeded.
        tracing::debug!(
            target: "sextant.deps",
            path = %stamp_path.display(),
            error = %err,
            "failed to write extraction stamp"
        );
    }

    tracing::debug!(
        target: "sextant.deps",
        archive = %archive.display(),
        dir = %dir.display(),
        files = files.len(),
        "extracted source archive"
    );

    Ok(ExtractOutcome {
        dir,
        files,
        extracted: true,
    })
}

fn load_stamp(path: &Path, fingerprint: ArchiveFingerprint) -> Option<ExtractionStamp> {
    // Avoid following symlinks out of the scratch directory.
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::debug!(
                target: "sextant.deps",
                path = %path.display(),
                error = %err,
                "failed to stat extraction stamp"
            );
            return None;
        }
    };
    if meta.file_type().is_symlink() {
        remove_file_best_effort(path, "symlink");
        return None;
    }
    if !meta.is_file() {
        return None;
    }
    if meta.len() > MAX_STAMP_LEN_BYTES {
        remove_file_best_effort(path, "oversize");
        return None;
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(
                target: "sextant.deps",
                path = %path.display(),
                error = %err,
                "failed to read extraction stamp"
            );
            return None;
        }
    };

    let stamp: ExtractionStamp = match bincode::deserialize(&bytes) {
        Ok(stamp) => stamp,
        Err(err) => {
            tracing::debug!(
                target: "sextant.deps",
                path = %path.display(),
                error = %err,
                "failed to decode extraction stamp"
            );
            remove_file_best_effort(path, "decode_failed");
            return None;
        }
    };

    if stamp.fingerprint != fingerprint {
        remove_file_best_effort(path, "fingerprint_mismatch");
        return None;
    }

    Some(stamp)
}

fn write_stamp(
    path: &Path,
    fingerprint: ArchiveFingerprint,
    archive: &Path,
    file_count: u64,
) -> Result<(), DepsError> {
    let stamp = ExtractionStamp {
        fingerprint,
        archive_path: archive.to_string_lossy().into_owned(),
        file_count,
        saved_at_millis: now_millis(),
    };
    let bytes = bincode::serialize(&stamp)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn remove_file_best_effort(path: &Path, reason: &'static str) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::debug!(
                target: "sextant.deps",
                path = %path.display(),
                reason,
                error = %err,
                "failed to delete extraction stamp"
            );
        }
    }
}
