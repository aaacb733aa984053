use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sextant_artifacts::BuildConfigArtifact;

use crate::extract::{extract_if_needed, SourceExtractor, ZipSourceExtractor};
use crate::{ArchiveFingerprint, ScratchDir};

/// Resolves the source archives of compiler config artifacts into extracted
/// scratch directories.
///
/// The resolver keeps an in-process record of which archive identities it
/// has already handled, so re-pushing a config is cheap; the on-disk stamp
/// protocol covers reuse across restarts.
pub struct DependencyResolver {
    scratch: ScratchDir,
    extractor: Arc<dyn SourceExtractor>,
    extracted: HashMap<PathBuf, ArchiveFingerprint>,
}

/// Outcome of resolving one config.
#[derive(Debug, Clone, Default)]
pub struct ResolveReport {
    /// Files that should (re-)enter the ingestion pipeline. Empty for
    /// archives this resolver instance already processed.
    pub files: Vec<PathBuf>,
    /// Archives the extractor ran for.
    pub extracted: usize,
    /// Archives reused, either in-process or via a valid stamp.
    pub reused: usize,
    /// Archives skipped because fingerprinting or extraction failed.
    pub failed: usize,
}

impl DependencyResolver {
    pub fn new(scratch: ScratchDir) -> Self {
        Self::with_extractor(scratch, Arc::new(ZipSourceExtractor))
    }

    pub fn with_extractor(scratch: ScratchDir, extractor: Arc<dyn SourceExtractor>) -> Self {
        Self {
            scratch,
            extractor,
            extracted: HashMap::new(),
        }
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Processes one compiler config: extracts every source archive it
    /// enables and reports the files that should enter the pipeline.
    ///
    /// Failures are isolated per archive; an unreadable archive is logged
    /// and counted, and the remaining archives still resolve.
    pub fn resolve(&mut self, config: &BuildConfigArtifact) -> ResolveReport {
        let mut report = ResolveReport::default();
        for archive in enabled_archives(config) {
            self.process_archive(&archive, &mut report);
        }

        tracing::debug!(
            target: "sextant.deps",
            config = %config.name,
            extracted = report.extracted,
            reused = report.reused,
            failed = report.failed,
            "resolved config source archives"
        );
        report
    }

    fn process_archive(&mut self, archive: &Path, report: &mut ResolveReport) {
        let fingerprint = match ArchiveFingerprint::of_file(archive) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                tracing::warn!(
                    target: "sextant.deps",
                    archive = %archive.display(),
                    error = %err,
                    "failed to fingerprint source archive; skipping"
                );
                report.failed += 1;
                return;
            }
        };

        if self.extracted.get(archive) == Some(&fingerprint) {
            report.reused += 1;
            return;
        }

        match extract_if_needed(&self.scratch, archive, fingerprint, self.extractor.as_ref()) {
            Ok(outcome) => {
                // TODO: sweep superseded `<stem>-*` extraction dirs once a
                // scratch GC pass exists.
                self.extracted.insert(archive.to_path_buf(), fingerprint);
                if outcome.extracted {
                    report.extracted += 1;
                } else {
                    report.reused += 1;
                }
                report.files.extend(outcome.files);
            }
            Err(err) => {
                tracing::warn!(
                    target: "sextant.deps",
                    archive = %archive.display(),
                    error = %err,
                    "failed to extract source archive; skipping"
                );
                report.failed += 1;
            }
        }
    }
}

/// Source archives a config enables, in config order: dependency archives
/// first (when `index_dependency_sources`), then the platform archive (when
/// `index_jdk_sources`).
fn enabled_archives(config: &BuildConfigArtifact) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    if config.index_dependency_sources {
        archives.extend(config.source_archives().map(|entry| entry.path.clone()));
    }
    if config.index_jdk_sources {
        if let Some(jdk) = &config.jdk_sources {
            archives.push(jdk.clone());
        }
    }
    archives
}
