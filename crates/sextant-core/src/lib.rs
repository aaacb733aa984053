//! Core shared types for Sextant.
//!
//! Every other Sextant crate depends on this one, so it stays small: file
//! identities, symbol identities, text positions, and the workspace walk
//! helper used for startup seeding.

mod fs;
mod key;

pub use fs::{collect_files, collect_files_with_suffix};
pub use key::FileKey;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A position in a text document expressed as (line, UTF-16 code unit offset).
///
/// This matches the Language Server Protocol definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open range in a text document expressed with LSP positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether `position` falls inside this range (`start` inclusive, `end`
    /// exclusive).
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Whether `other` lies entirely inside this range.
    #[inline]
    pub fn encloses(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Globally unique, stable identifier of one declared program entity.
///
/// Produced by the external semantic-analysis pipeline; equality is exact
/// string equality, and two artifacts that mean the same entity must emit
/// identical values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(Arc<str>);

impl SymbolId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SymbolId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SymbolId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SymbolId::new)
    }
}

#[cfg(feature = "lsp")]
mod lsp_compat {
    use super::{Position, Range};

    impl From<Position> for lsp_types::Position {
        fn from(value: Position) -> Self {
            lsp_types::Position {
                line: value.line,
                character: value.character,
            }
        }
    }

    impl From<lsp_types::Position> for Position {
        fn from(value: lsp_types::Position) -> Self {
            Position {
                line: value.line,
                character: value.character,
            }
        }
    }

    impl From<Range> for lsp_types::Range {
        fn from(value: Range) -> Self {
            lsp_types::Range {
                start: value.start.into(),
                end: value.end.into(),
            }
        }
    }

    impl From<lsp_types::Range> for Range {
        fn from(value: lsp_types::Range) -> Self {
            Range {
                start: value.start.into(),
                end: value.end.into(),
            }
        }
    }
}
