//! The symbol index: Sextant's core mutable store.
//!
//! One [`SymbolIndex`] holds, per symbol, the definition site and the
//! reference set, and per indexed file the bookkeeping needed to evict that
//! file's contribution again. All mutation goes through [`SymbolIndex::fold`]
//! and [`SymbolIndex::evict`]; both are fully replacing and leave no residue
//! of a file's earlier state behind.
//!
//! The index is a plain single-threaded structure. Concurrent use is the
//! engine's concern: it owns the index behind a lock and issues all writes
//! from its driver threads.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sextant_artifacts::{Role, SemanticArtifact};
use sextant_core::{FileKey, Position, Range, SymbolId};

/// A resolved (file, range) pair, the shape navigation results are made of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: FileKey,
    pub range: Range,
}

impl Location {
    pub fn new(file: FileKey, range: Range) -> Self {
        Self { file, range }
    }
}

/// Counts reported by one fold or evict, for logs and the CLI report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FoldStats {
    pub definitions_added: usize,
    pub definitions_removed: usize,
    pub references_added: usize,
    pub references_removed: usize,
}

/// Result of [`SymbolIndex::fold`].
///
/// `Stale` is the out-of-order guard firing: the artifact's version was not
/// newer than the recorded one and the index is unchanged. It is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Applied(FoldStats),
    Stale { recorded: u64, incoming: u64 },
}

impl FoldOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FoldOutcome::Applied(_))
    }
}

/// Point-in-time size of the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub symbols: usize,
    pub definitions: usize,
    pub references: usize,
}

#[derive(Debug, Default)]
struct SymbolEntry {
    definition: Option<Location>,
    references: Vec<Location>,
}

impl SymbolEntry {
    fn is_empty(&self) -> bool {
        self.definition.is_none() && self.references.is_empty()
    }
}

#[derive(Debug)]
struct FileOccurrence {
    symbol: SymbolId,
    range: Range,
    role: Role,
}

/// Per-file bookkeeping: the last folded version plus the exact occurrences
/// this file contributed, so eviction visits only the symbols it touched.
#[derive(Debug)]
struct IndexedFile {
    version: u64,
    occurrences: Vec<FileOccurrence>,
}

#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: HashMap<SymbolId, SymbolEntry>,
    files: HashMap<FileKey, IndexedFile>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one parsed artifact: removes every occurrence the file
    /// previously contributed, then inserts the new ones, as one step under
    /// the caller's `&mut` borrow.
    ///
    /// Artifacts whose version is not newer than the recorded one are
    /// dropped (`FoldOutcome::Stale`).
    pub fn fold(&mut self, artifact: SemanticArtifact) -> FoldOutcome {
        if let Some(existing) = self.files.get(&artifact.file) {
            if artifact.version <= existing.version {
                tracing::debug!(
                    target: "sextant.index",
                    file = %artifact.file,
                    recorded = existing.version,
                    incoming = artifact.version,
                    "stale artifact dropped"
                );
                return FoldOutcome::Stale {
                    recorded: existing.version,
                    incoming: artifact.version,
                };
            }
        }

        let mut stats = FoldStats::default();
        self.remove_contribution(&artifact.file, &mut stats);

        let mut occurrences = Vec::with_capacity(artifact.occurrences.len());
        for occ in artifact.occurrences {
            let location = Location::new(artifact.file.clone(), occ.range);
            let entry = self.symbols.entry(occ.symbol.clone()).or_default();
            match occ.role {
                Role::Definition => match entry.definition.replace(location) {
                    None => stats.definitions_added += 1,
                    // Duplicate emission within this artifact: last write wins,
                    // already counted.
                    Some(prev) if prev.file == artifact.file => {}
                    // Redefinition displaces another file's definition.
                    Some(_) => {
                        stats.definitions_removed += 1;
                        stats.definitions_added += 1;
                    }
                },
                Role::Reference => {
                    if !entry.references.contains(&location) {
                        entry.references.push(location);
                        stats.references_added += 1;
                    }
                }
            }
            occurrences.push(FileOccurrence {
                symbol: occ.symbol,
                range: occ.range,
                role: occ.role,
            });
        }

        self.files.insert(
            artifact.file,
            IndexedFile {
                version: artifact.version,
                occurrences,
            },
        );
        FoldOutcome::Applied(stats)
    }

    /// Removes all of `file`'s contributions, version bookkeeping included.
    ///
    /// Returns `None` when the file was never indexed. A file indexed again
    /// after eviction starts a fresh version sequence.
    pub fn evict(&mut self, file: &FileKey) -> Option<FoldStats> {
        if !self.files.contains_key(file) {
            return None;
        }
        let mut stats = FoldStats::default();
        self.remove_contribution(file, &mut stats);
        Some(stats)
    }

    pub fn definition(&self, symbol: &SymbolId) -> Option<&Location> {
        self.symbols.get(symbol)?.definition.as_ref()
    }

    /// Reference sites of `symbol`, in fold order, optionally with the
    /// declaration site first.
    pub fn references(&self, symbol: &SymbolId, include_declaration: bool) -> Vec<Location> {
        let Some(entry) = self.symbols.get(symbol) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(entry.references.len() + 1);
        if include_declaration {
            if let Some(definition) = &entry.definition {
                out.push(definition.clone());
            }
        }
        for reference in &entry.references {
            if !out.contains(reference) {
                out.push(reference.clone());
            }
        }
        out
    }

    /// Resolves a cursor position to the symbol occurring there.
    ///
    /// The innermost containing range wins (latest start, then earliest
    /// end); an exact-range tie prefers Definition over Reference; identical
    /// range and role resolve to the occurrence folded last.
    pub fn symbol_at(&self, file: &FileKey, position: Position) -> Option<&SymbolId> {
        let indexed = self.files.get(file)?;
        let mut best: Option<&FileOccurrence> = None;
        for occ in &indexed.occurrences {
            if !occ.range.contains(position) {
                continue;
            }
            let wins = match best {
                None => true,
                Some(current) => match occ.range.start.cmp(&current.range.start) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => match occ.range.end.cmp(&current.range.end) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => match (occ.role, current.role) {
                            (Role::Definition, Role::Reference) => true,
                            (Role::Reference, Role::Definition) => false,
                            // Identical range and role: last write wins.
                            _ => true,
                        },
                    },
                },
            };
            if wins {
                best = Some(occ);
            }
        }
        best.map(|occ| &occ.symbol)
    }

    /// The version recorded for `file`, if it is indexed.
    pub fn indexed_version(&self, file: &FileKey) -> Option<u64> {
        self.files.get(file).map(|indexed| indexed.version)
    }

    /// Files currently contributing occurrences, in no particular order.
    pub fn indexed_files(&self) -> impl Iterator<Item = &FileKey> {
        self.files.keys()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            files: self.files.len(),
            symbols: self.symbols.len(),
            ..IndexStats::default()
        };
        for entry in self.symbols.values() {
            if entry.definition.is_some() {
                stats.definitions += 1;
            }
            stats.references += entry.references.len();
        }
        stats
    }

    fn remove_contribution(&mut self, file: &FileKey, stats: &mut FoldStats) {
        let Some(indexed) = self.files.remove(file) else {
            return;
        };
        for occ in &indexed.occurrences {
            let Some(entry) = self.symbols.get_mut(&occ.symbol) else {
                continue;
            };
            match occ.role {
                Role::Definition => {
                    // Only clear a definition this file still owns; a later
                    // fold of another file may have displaced it already.
                    if entry
                        .definition
                        .as_ref()
                        .is_some_and(|loc| loc.file == *file)
                    {
                        entry.definition = None;
                        stats.definitions_removed += 1;
                    }
                }
                Role::Reference => {
                    let before = entry.references.len();
                    entry.references.retain(|loc| loc.file != *file);
                    stats.references_removed += before - entry.references.len();
                }
            }
            if entry.is_empty() {
                self.symbols.remove(&occ.symbol);
            }
        }
    }
}
