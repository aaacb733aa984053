use sextant_artifacts::{Occurrence, Role, SemanticArtifact};
use sextant_core::{FileKey, Position, Range, SymbolId};
use sextant_index::SymbolIndex;

fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range::new(Position::new(sl, sc), Position::new(el, ec))
}

fn occ(symbol: &str, r: Range, role: Role) -> Occurrence {
    Occurrence {
        symbol: SymbolId::new(symbol),
        range: r,
        role,
    }
}

fn index_of(occurrences: Vec<Occurrence>) -> (SymbolIndex, FileKey) {
    let file = FileKey::new("/ws/F.x");
    let mut index = SymbolIndex::new();
    index.fold(SemanticArtifact {
        file: file.clone(),
        version: 1,
        occurrences,
        diagnostics: Vec::new(),
    });
    (index, file)
}

#[test]
fn innermost_range_wins_over_an_enclosing_definition() {
    let (index, file) = index_of(vec![
        occ("outer", range(0, 0, 0, 10), Role::Definition),
        occ("inner", range(0, 2, 0, 5), Role::Reference),
    ]);

    let hit = index.symbol_at(&file, Position::new(0, 3)).unwrap();
    assert_eq!(hit, &SymbolId::new("inner"));

    // Outside the inner span the enclosing occurrence resolves.
    let hit = index.symbol_at(&file, Position::new(0, 7)).unwrap();
    assert_eq!(hit, &SymbolId::new("outer"));
}

#[test]
fn nested_ranges_prefer_the_latest_start_then_earliest_end() {
    let (index, file) = index_of(vec![
        occ("a", range(1, 0, 5, 0), Role::Reference),
        occ("b", range(2, 0, 5, 0), Role::Reference),
        occ("c", range(2, 0, 4, 0), Role::Reference),
    ]);

    let hit = index.symbol_at(&file, Position::new(3, 0)).unwrap();
    assert_eq!(hit, &SymbolId::new("c"));
}

#[test]
fn equal_ranges_prefer_definition_over_reference() {
    // Both orders, so the preference is not an artifact of fold order.
    let (index, file) = index_of(vec![
        occ("def", range(0, 0, 0, 4), Role::Definition),
        occ("ref", range(0, 0, 0, 4), Role::Reference),
    ]);
    assert_eq!(
        index.symbol_at(&file, Position::new(0, 1)).unwrap(),
        &SymbolId::new("def")
    );

    let (index, file) = index_of(vec![
        occ("ref", range(0, 0, 0, 4), Role::Reference),
        occ("def", range(0, 0, 0, 4), Role::Definition),
    ]);
    assert_eq!(
        index.symbol_at(&file, Position::new(0, 1)).unwrap(),
        &SymbolId::new("def")
    );
}

#[test]
fn identical_range_and_role_resolve_to_the_last_fold_entry() {
    let (index, file) = index_of(vec![
        occ("first", range(0, 0, 0, 4), Role::Reference),
        occ("second", range(0, 0, 0, 4), Role::Reference),
    ]);
    assert_eq!(
        index.symbol_at(&file, Position::new(0, 0)).unwrap(),
        &SymbolId::new("second")
    );
}

#[test]
fn positions_outside_every_range_miss() {
    let (index, file) = index_of(vec![occ("s", range(1, 2, 1, 6), Role::Definition)]);
    assert!(index.symbol_at(&file, Position::new(1, 6)).is_none());
    assert!(index.symbol_at(&file, Position::new(0, 0)).is_none());
    assert!(index
        .symbol_at(&FileKey::new("/ws/other.x"), Position::new(1, 3))
        .is_none());
}

#[test]
fn multi_line_occurrences_contain_interior_lines() {
    let (index, file) = index_of(vec![occ("block", range(1, 4, 3, 2), Role::Reference)]);
    assert_eq!(
        index.symbol_at(&file, Position::new(2, 77)).unwrap(),
        &SymbolId::new("block")
    );
}
