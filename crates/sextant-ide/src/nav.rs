use serde::Serialize;
use sextant_artifacts::Role;
use sextant_core::{FileKey, Position, Range};
use sextant_index::{Location, SymbolIndex};
use sextant_vfs::{Buffers, FileSystem};

/// One occurrence of the queried symbol inside the query file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightSpan {
    pub range: Range,
    pub role: Role,
}

/// Resolves the symbol under the cursor to its definition site.
///
/// The result range is clamped against the target file's live buffer when
/// that document is open; closed files keep their indexed coordinates.
pub fn definition<F: FileSystem>(
    index: &SymbolIndex,
    buffers: &Buffers<F>,
    file: &FileKey,
    position: Position,
) -> Option<Location> {
    let symbol = index.symbol_at(file, position)?;
    let location = index.definition(symbol)?.clone();
    Some(clamp(buffers, location))
}

/// Every recorded reference site of the symbol under the cursor, in fold
/// order, with the declaration site first when `include_declaration` is
/// set.
pub fn references<F: FileSystem>(
    index: &SymbolIndex,
    buffers: &Buffers<F>,
    file: &FileKey,
    position: Position,
    include_declaration: bool,
) -> Vec<Location> {
    let Some(symbol) = index.symbol_at(file, position) else {
        return Vec::new();
    };
    index
        .references(symbol, include_declaration)
        .into_iter()
        .map(|location| clamp(buffers, location))
        .collect()
}

/// References restricted to the query file, declaration included: the
/// "highlight all occurrences" view. Spans come back in document order,
/// each tagged with the role it holds at that site.
pub fn document_highlight<F: FileSystem>(
    index: &SymbolIndex,
    buffers: &Buffers<F>,
    file: &FileKey,
    position: Position,
) -> Vec<HighlightSpan> {
    let Some(symbol) = index.symbol_at(file, position) else {
        return Vec::new();
    };
    let mut spans = Vec::new();
    if let Some(declaration) = index.definition(symbol) {
        if &declaration.file == file {
            spans.push(HighlightSpan {
                range: buffers.clamp_range(file, declaration.range),
                role: Role::Definition,
            });
        }
    }
    for location in index.references(symbol, false) {
        if &location.file == file {
            spans.push(HighlightSpan {
                range: buffers.clamp_range(file, location.range),
                role: Role::Reference,
            });
        }
    }
    spans.sort_by_key(|span| (span.range.start, span.range.end));
    spans
}

fn clamp<F: FileSystem>(buffers: &Buffers<F>, location: Location) -> Location {
    let range = buffers.clamp_range(&location.file, location.range);
    Location::new(location.file, range)
}
