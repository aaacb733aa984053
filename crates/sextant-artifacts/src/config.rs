use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ArtifactError;

/// One classpath element of a build module: either an ordinary entry
/// (directory or binary archive) or a source archive eligible for
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClasspathEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub source_archive: bool,
}

/// Parsed form of one compiler config artifact (`<module>.build.json`).
///
/// `index_dependency_sources` and `index_jdk_sources` are switches the
/// dependency resolver honors; they do not change index behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigArtifact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entries: Vec<ClasspathEntry>,
    #[serde(default)]
    pub index_jdk_sources: bool,
    #[serde(default = "default_index_dependency_sources")]
    pub index_dependency_sources: bool,
    /// Platform source archive (e.g. the JDK's `src.zip`), extracted only
    /// when `index_jdk_sources` is set.
    #[serde(default)]
    pub jdk_sources: Option<PathBuf>,
}

impl BuildConfigArtifact {
    pub fn parse(bytes: &[u8]) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Source archives the resolver should extract, in config order.
    pub fn source_archives(&self) -> impl Iterator<Item = &ClasspathEntry> {
        self.entries.iter().filter(|entry| entry.source_archive)
    }
}

fn default_index_dependency_sources() -> bool {
    true
}
