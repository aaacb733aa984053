use std::path::{Path, PathBuf};

/// Suffix of semantic artifact sidecars: `<source>.sym.json` describes
/// `<source>`.
pub const SEMANTIC_SUFFIX: &str = ".sym.json";

/// Suffix of compiler config artifacts, one per build module.
pub const BUILD_CONFIG_SUFFIX: &str = ".build.json";

/// Closed classification of a changed path.
///
/// Everything the pipeline admits routes through this function; unrecognized
/// paths are handed to the fallback stream rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Semantic,
    BuildConfig,
    Unrecognized,
}

pub fn classify(path: &Path) -> ArtifactKind {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return ArtifactKind::Unrecognized;
    };
    if name.ends_with(BUILD_CONFIG_SUFFIX) {
        ArtifactKind::BuildConfig
    } else if name.ends_with(SEMANTIC_SUFFIX) {
        ArtifactKind::Semantic
    } else {
        ArtifactKind::Unrecognized
    }
}

/// The source file a semantic sidecar describes, derived by stripping the
/// suffix. `None` when the path is not a semantic artifact or nothing is
/// left after stripping.
pub fn described_source(artifact_path: &Path) -> Option<PathBuf> {
    let name = artifact_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(SEMANTIC_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(artifact_path.with_file_name(stem))
}
