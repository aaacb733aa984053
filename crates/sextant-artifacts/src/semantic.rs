use std::path::Path;

use serde::{Deserialize, Serialize};
use sextant_core::{FileKey, Position, Range, SymbolId};

use crate::classify::described_source;
use crate::ArtifactError;

/// How a symbol appears at an occurrence site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Definition,
    Reference,
}

/// One recorded appearance of a symbol inside the described file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub symbol: SymbolId,
    pub range: Range,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Compiler diagnostic carried alongside the occurrences. The index ignores
/// these; they are retained for downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub range: Option<Range>,
}

/// Parsed form of one semantic artifact: everything the compiler pipeline
/// recorded about one source file, plus the version stamp the index uses to
/// drop out-of-order deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticArtifact {
    pub file: FileKey,
    pub version: u64,
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<ArtifactDiagnostic>,
}

impl SemanticArtifact {
    /// Parses artifact bytes read from `artifact_path`.
    ///
    /// The described file's identity comes from the artifact's explicit
    /// `file` field when present, otherwise from the sidecar path with the
    /// `.sym.json` suffix stripped.
    pub fn parse(bytes: &[u8], artifact_path: &Path) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_slice(bytes)?;

        let file = match raw.file {
            Some(explicit) => FileKey::new(explicit),
            None => match described_source(artifact_path) {
                Some(source) => FileKey::local(source),
                None => {
                    return Err(ArtifactError::MissingIdentity {
                        path: artifact_path.to_path_buf(),
                    })
                }
            },
        };

        let mut occurrences = Vec::with_capacity(raw.occurrences.len());
        for (index, occ) in raw.occurrences.into_iter().enumerate() {
            let range = decode_range(occ.range).ok_or(ArtifactError::InvertedRange { index })?;
            occurrences.push(Occurrence {
                symbol: SymbolId::new(occ.symbol),
                range,
                role: occ.role,
            });
        }

        let diagnostics = raw
            .diagnostics
            .into_iter()
            .map(|diag| ArtifactDiagnostic {
                severity: diag.severity,
                message: diag.message,
                range: diag.range.and_then(decode_range),
            })
            .collect();

        Ok(Self {
            file,
            version: raw.version,
            occurrences,
            diagnostics,
        })
    }
}

/// Wire form. Ranges come as `[startLine, startCol, endLine, endCol]`.
#[derive(Deserialize)]
struct RawArtifact {
    version: u64,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    occurrences: Vec<RawOccurrence>,
    #[serde(default)]
    diagnostics: Vec<RawDiagnostic>,
}

#[derive(Deserialize)]
struct RawOccurrence {
    symbol: String,
    range: [u32; 4],
    role: Role,
}

#[derive(Deserialize)]
struct RawDiagnostic {
    severity: DiagnosticSeverity,
    message: String,
    #[serde(default)]
    range: Option<[u32; 4]>,
}

fn decode_range(raw: [u32; 4]) -> Option<Range> {
    let range = Range::new(Position::new(raw[0], raw[1]), Position::new(raw[2], raw[3]));
    if range.end < range.start {
        return None;
    }
    Some(range)
}
