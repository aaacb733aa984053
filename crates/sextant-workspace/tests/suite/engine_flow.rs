//! Seeding, rescan reconciliation, config-driven extraction, and the
//! buffer overlay as seen through [`Engine`] queries.

use std::fs;

use sextant_core::FileKey;
use sextant_workspace::StreamEvent;

use crate::suite::util::{
    engine_at, engine_with_scratch, pos, recv_event, semantic_json, write_config, write_semantic,
    write_zip,
};

#[test]
fn seed_folds_workspace_artifacts() {
    let workspace = tempfile::tempdir().unwrap();
    let src = workspace.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("Widget.x"), "module widget\n").unwrap();
    write_semantic(&src, "Widget.x", 1, &[("x/Widget#", [0, 6, 0, 12], "definition")]);
    write_semantic(&src, "Main.x", 1, &[("x/Widget#", [3, 4, 3, 10], "reference")]);

    let (engine, _scratch) = engine_at(workspace.path());
    let report = engine.seed().unwrap();

    assert_eq!(report.index.files, 2);
    assert_eq!(report.index.symbols, 1);
    assert_eq!(report.index.definitions, 1);
    assert_eq!(report.index.references, 1);
    assert_eq!(report.plain_files, 1);
    assert_eq!(report.parse_failures, 0);
    assert_eq!(report.configs_loaded, 0);

    let main = FileKey::local(src.join("Main.x"));
    let widget = FileKey::local(src.join("Widget.x"));
    let definition = engine.definition(&main, pos(3, 5)).expect("cross-file definition");
    assert_eq!(definition.file, widget);
    assert_eq!(definition.range.start, pos(0, 6));

    let references = engine.references(&main, pos(3, 5), true);
    assert_eq!(references.len(), 2);
}

#[test]
fn malformed_sidecars_are_isolated() {
    let workspace = tempfile::tempdir().unwrap();
    let src = workspace.path().join("src");
    write_semantic(&src, "Good.x", 1, &[("x/Good#", [0, 0, 0, 4], "definition")]);
    fs::write(src.join("Bad.x.sym.json"), b"{ definitely not json").unwrap();

    let (engine, _scratch) = engine_at(workspace.path());
    let report = engine.seed().unwrap();

    assert_eq!(report.index.files, 1);
    assert_eq!(report.parse_failures, 1);

    let good = FileKey::local(src.join("Good.x"));
    assert!(engine.definition(&good, pos(0, 1)).is_some());
}

#[test]
fn rescan_reconciles_deleted_sidecars() {
    let workspace = tempfile::tempdir().unwrap();
    let src = workspace.path().join("src");
    let widget_sidecar =
        write_semantic(&src, "Widget.x", 1, &[("x/Widget#", [0, 0, 0, 6], "definition")]);
    write_semantic(&src, "Main.x", 1, &[("x/Widget#", [2, 0, 2, 6], "reference")]);

    let (engine, _scratch) = engine_at(workspace.path());
    engine.seed().unwrap();

    let widget = FileKey::local(src.join("Widget.x"));
    let main = FileKey::local(src.join("Main.x"));
    assert!(engine.definition(&main, pos(2, 1)).is_some());

    // The sidecar vanishes without a watch event; a rescan has to notice.
    fs::remove_file(&widget_sidecar).unwrap();
    let events = engine.subscribe_semantic();
    engine.rescan();

    match recv_event(&events) {
        StreamEvent::Removed(key) => assert_eq!(key, widget),
        other => panic!("expected a removal, got {other:?}"),
    }
    assert!(engine.definition(&main, pos(2, 1)).is_none());
    assert_eq!(engine.report().index.files, 1);
}

#[test]
fn config_extraction_feeds_the_index() {
    let workspace = tempfile::tempdir().unwrap();
    let archives = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();

    let archive = archives.path().join("widgets-sources.zip");
    write_zip(
        &archive,
        &[
            ("lib/Dep.x", "module dep\n"),
            (
                "lib/Dep.x.sym.json",
                &semantic_json(1, &[("dep/Dep#", [0, 7, 0, 10], "definition")]),
            ),
        ],
    );
    write_config(
        workspace.path(),
        "app",
        &serde_json::json!({
            "name": "app",
            "entries": [{ "path": archive, "sourceArchive": true }],
        }),
    );

    let engine = engine_with_scratch(workspace.path(), scratch.path());
    let events = engine.subscribe_semantic();
    let report = engine.seed().unwrap();

    assert_eq!(report.configs_loaded, 1);
    assert_eq!(report.archives_extracted, 1);
    assert_eq!(report.archive_failures, 0);
    assert_eq!(report.index.files, 1);

    let dep = match recv_event(&events) {
        StreamEvent::Updated(artifact) => artifact.file.clone(),
        other => panic!("expected an extracted artifact, got {other:?}"),
    };
    assert!(dep.as_path().ends_with("lib/Dep.x"));
    let definition = engine.definition(&dep, pos(0, 8)).expect("Dep#");
    assert_eq!(definition.file, dep);

    // A fresh engine over the same scratch reuses the extraction stamp but
    // still replays the extracted files into its index.
    let restarted = engine_with_scratch(workspace.path(), scratch.path());
    let report = restarted.seed().unwrap();
    assert_eq!(report.archives_extracted, 0);
    assert_eq!(report.index.files, 1);
    assert!(restarted.definition(&dep, pos(0, 8)).is_some());
}

#[test]
fn open_buffers_clamp_query_results() {
    let workspace = tempfile::tempdir().unwrap();
    let src = workspace.path().join("src");
    write_semantic(&src, "Widget.x", 1, &[("x/Widget#", [0, 6, 0, 12], "definition")]);

    let (engine, _scratch) = engine_at(workspace.path());
    engine.seed().unwrap();

    let widget = FileKey::local(src.join("Widget.x"));
    let on_disk = engine.definition(&widget, pos(0, 7)).expect("definition");
    assert_eq!(on_disk.range.end, pos(0, 12));

    // The open buffer is shorter than the indexed coordinates; results
    // clamp to what the editor can actually highlight.
    engine.open_document(widget.clone(), "short\n", 1);
    let clamped = engine.definition(&widget, pos(0, 7)).expect("definition");
    assert_eq!(clamped.range.start, pos(0, 5));
    assert_eq!(clamped.range.end, pos(0, 5));

    engine.close_document(&widget);
    let reverted = engine.definition(&widget, pos(0, 7)).expect("definition");
    assert_eq!(reverted.range.end, pos(0, 12));
}
