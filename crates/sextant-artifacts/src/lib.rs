//! Artifact schemas and parsing.
//!
//! The external compiler pipeline emits two kinds of JSON artifacts into the
//! workspace:
//!
//! - one semantic artifact per compiled source, as a `<source>.sym.json`
//!   sidecar listing every symbol occurrence in that source;
//! - one `<module>.build.json` compiler config per build module, naming
//!   classpath entries and the resolver switches.
//!
//! This crate parses bytes into structured records and classifies changed
//! paths by suffix. It does no file I/O of its own.

mod classify;
mod config;
mod semantic;

pub use classify::{classify, described_source, ArtifactKind, BUILD_CONFIG_SUFFIX, SEMANTIC_SUFFIX};
pub use config::{BuildConfigArtifact, ClasspathEntry};
pub use semantic::{
    ArtifactDiagnostic, DiagnosticSeverity, Occurrence, Role, SemanticArtifact,
};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("malformed artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("occurrence {index}: range end precedes start")]
    InvertedRange { index: usize },
    #[error("cannot derive the described file for artifact {path}")]
    MissingIdentity { path: PathBuf },
}
