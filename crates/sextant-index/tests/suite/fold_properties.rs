use sextant_artifacts::{Occurrence, Role, SemanticArtifact};
use sextant_core::{FileKey, Position, Range, SymbolId};
use sextant_index::{FoldOutcome, IndexStats, SymbolIndex};

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

fn artifact(file: &str, version: u64, occurrences: Vec<Occurrence>) -> SemanticArtifact {
    SemanticArtifact {
        file: FileKey::new(file),
        version,
        occurrences,
        diagnostics: Vec::new(),
    }
}

/// Observable index state for equality assertions across folds.
fn observe(index: &SymbolIndex, symbols: &[&str]) -> Vec<(String, Option<String>, Vec<String>)> {
    symbols
        .iter()
        .map(|name| {
            let id = SymbolId::new(*name);
            let def = index
                .definition(&id)
                .map(|loc| format!("{}@{:?}", loc.file, loc.range));
            let mut refs: Vec<String> = index
                .references(&id, false)
                .into_iter()
                .map(|loc| format!("{}@{:?}", loc.file, loc.range))
                .collect();
            refs.sort();
            (name.to_string(), def, refs)
        })
        .collect()
}

#[test]
fn folding_the_same_artifact_twice_is_a_noop() {
    let make = || {
        artifact(
            "/ws/A.x",
            1,
            vec![
                occ("a", range(0, 0, 0, 4), Role::Definition),
                occ("b", range(2, 1, 2, 5), Role::Reference),
            ],
        )
    };

    let mut index = SymbolIndex::new();
    assert!(index.fold(make()).is_applied());
    let first = observe(&index, &["a", "b"]);
    let first_stats = index.stats();

    let outcome = index.fold(make());
    assert_eq!(
        outcome,
        FoldOutcome::Stale {
            recorded: 1,
            incoming: 1
        }
    );
    assert_eq!(observe(&index, &["a", "b"]), first);
    assert_eq!(index.stats(), first_stats);
}

#[test]
fn refolding_identical_content_under_a_newer_version_is_idempotent() {
    let make = |version| {
        artifact(
            "/ws/A.x",
            version,
            vec![
                occ("a", range(0, 0, 0, 4), Role::Definition),
                occ("a", range(3, 0, 3, 4), Role::Reference),
            ],
        )
    };

    let mut index = SymbolIndex::new();
    index.fold(make(1));
    let before = observe(&index, &["a"]);

    assert!(index.fold(make(2)).is_applied());
    assert_eq!(observe(&index, &["a"]), before);
    assert_eq!(index.indexed_version(&FileKey::new("/ws/A.x")), Some(2));
}

#[test]
fn refold_fully_replaces_the_old_contribution() {
    let mut index = SymbolIndex::new();
    index.fold(artifact(
        "/ws/F.x",
        1,
        vec![
            occ("A", range(0, 0, 0, 1), Role::Definition),
            occ("B", range(1, 0, 1, 1), Role::Reference),
        ],
    ));
    let outcome = index.fold(artifact(
        "/ws/F.x",
        2,
        vec![
            occ("A", range(5, 0, 5, 1), Role::Reference),
            occ("C", range(6, 0, 6, 1), Role::Definition),
        ],
    ));

    let FoldOutcome::Applied(stats) = outcome else {
        panic!("expected applied fold");
    };
    assert_eq!(stats.definitions_removed, 1);
    assert_eq!(stats.references_removed, 1);
    assert_eq!(stats.definitions_added, 1);
    assert_eq!(stats.references_added, 1);

    // A: old definition gone, new reference present.
    let a = SymbolId::new("A");
    assert!(index.definition(&a).is_none());
    let refs = index.references(&a, true);
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].range, range(5, 0, 5, 1));

    // B: no residue at all.
    assert!(index.references(&SymbolId::new("B"), true).is_empty());

    // C: new definition present.
    assert_eq!(
        index.definition(&SymbolId::new("C")).unwrap().range,
        range(6, 0, 6, 1)
    );
}

#[test]
fn out_of_order_versions_are_dropped() {
    let mut index = SymbolIndex::new();
    index.fold(artifact(
        "/ws/F.x",
        3,
        vec![occ("s", range(0, 0, 0, 4), Role::Definition)],
    ));
    let outcome = index.fold(artifact(
        "/ws/F.x",
        2,
        vec![occ("s", range(9, 0, 9, 4), Role::Definition)],
    ));

    assert_eq!(
        outcome,
        FoldOutcome::Stale {
            recorded: 3,
            incoming: 2
        }
    );
    assert_eq!(
        index.definition(&SymbolId::new("s")).unwrap().range,
        range(0, 0, 0, 4)
    );
    assert_eq!(index.indexed_version(&FileKey::new("/ws/F.x")), Some(3));
}

#[test]
fn at_most_one_definition_per_symbol() {
    let s = SymbolId::new("s");
    let mut index = SymbolIndex::new();
    index.fold(artifact(
        "/ws/A.x",
        1,
        vec![occ("s", range(0, 0, 0, 4), Role::Definition)],
    ));
    index.fold(artifact(
        "/ws/B.x",
        1,
        vec![occ("s", range(7, 0, 7, 4), Role::Definition)],
    ));

    // The later fold owns the single definition.
    let def = index.definition(&s).unwrap();
    assert_eq!(def.file, FileKey::new("/ws/B.x"));
    assert_eq!(index.stats().definitions, 1);

    // Evicting the owner leaves the symbol undefined until a refold; the
    // displaced definition does not silently come back.
    index.evict(&FileKey::new("/ws/B.x"));
    assert!(index.definition(&s).is_none());

    index.fold(artifact(
        "/ws/A.x",
        2,
        vec![occ("s", range(0, 0, 0, 4), Role::Definition)],
    ));
    assert_eq!(index.definition(&s).unwrap().file, FileKey::new("/ws/A.x"));
}

#[test]
fn eviction_restarts_the_version_sequence() {
    let file = FileKey::new("/ws/F.x");
    let mut index = SymbolIndex::new();
    index.fold(artifact(
        "/ws/F.x",
        5,
        vec![occ("s", range(0, 0, 0, 4), Role::Definition)],
    ));
    index.evict(&file);
    assert_eq!(index.indexed_version(&file), None);

    // A recreated file may legitimately restart at a low version.
    assert!(index
        .fold(artifact(
            "/ws/F.x",
            1,
            vec![occ("s", range(0, 0, 0, 4), Role::Definition)],
        ))
        .is_applied());
    assert_eq!(index.indexed_version(&file), Some(1));
}

#[test]
fn evicting_one_file_leaves_other_files_intact() {
    let mut index = SymbolIndex::new();
    index.fold(artifact(
        "/ws/A.x",
        1,
        vec![
            occ("s", range(0, 0, 0, 4), Role::Definition),
            occ("t", range(1, 0, 1, 4), Role::Reference),
        ],
    ));
    index.fold(artifact(
        "/ws/B.x",
        1,
        vec![occ("s", range(3, 0, 3, 4), Role::Reference)],
    ));

    index.evict(&FileKey::new("/ws/A.x"));

    let s = SymbolId::new("s");
    assert!(index.definition(&s).is_none());
    let refs = index.references(&s, true);
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].file, FileKey::new("/ws/B.x"));
    assert_eq!(
        index.stats(),
        IndexStats {
            files: 1,
            symbols: 1,
            definitions: 0,
            references: 1,
        }
    );
}
