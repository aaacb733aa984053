//! End-to-end pipeline behavior under an injected watcher: folds, evictions,
//! stale-version drops, rescan degradation, and shutdown.

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use sextant_core::FileKey;
use sextant_vfs::{FileChange, FileChangeKind, ManualFileWatcher, WatchEvent};
use sextant_workspace::{Engine, StreamEvent, WatchDebounce, WatcherHandle};
use tempfile::TempDir;

use crate::suite::util::{engine_at, pos, recv_event, write_config, write_semantic};

struct Rig {
    engine: Arc<Engine>,
    pusher: sextant_vfs::ManualFileWatcherHandle,
    handle: WatcherHandle,
    workspace: TempDir,
    _scratch: TempDir,
}

/// Engine with pipeline threads running behind a manual watcher.
fn start_rig(debounce: WatchDebounce) -> Rig {
    let workspace = tempfile::tempdir().unwrap();
    let (engine, scratch) = engine_at(workspace.path());
    let engine = Arc::new(engine);
    let watcher = ManualFileWatcher::new();
    let pusher = watcher.handle();
    let handle = engine
        .start_watching_with(Box::new(watcher), debounce)
        .expect("pipeline start");
    Rig {
        engine,
        pusher,
        handle,
        workspace,
        _scratch: scratch,
    }
}

fn changed(path: impl Into<std::path::PathBuf>, kind: FileChangeKind) -> WatchEvent {
    WatchEvent::Changes {
        changes: vec![FileChange::new(path, kind)],
    }
}

#[test]
fn watched_sidecars_fold_and_evict() {
    let rig = start_rig(WatchDebounce::ZERO);
    let src = rig.workspace.path().join("src");
    let events = rig.engine.subscribe_semantic();

    let sidecar = write_semantic(&src, "Widget.x", 1, &[("x/Widget#", [0, 0, 0, 6], "definition")]);
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Created))
        .unwrap();

    let widget = FileKey::local(src.join("Widget.x"));
    match recv_event(&events) {
        StreamEvent::Updated(artifact) => assert_eq!(artifact.file, widget),
        other => panic!("expected a fold, got {other:?}"),
    }
    assert!(rig.engine.definition(&widget, pos(0, 1)).is_some());

    fs::remove_file(&sidecar).unwrap();
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Deleted))
        .unwrap();

    match recv_event(&events) {
        StreamEvent::Removed(key) => assert_eq!(key, widget),
        other => panic!("expected an eviction, got {other:?}"),
    }
    assert!(rig.engine.definition(&widget, pos(0, 1)).is_none());
}

#[test]
fn stale_artifact_versions_never_regress() {
    let rig = start_rig(WatchDebounce::ZERO);
    let src = rig.workspace.path().join("src");
    let events = rig.engine.subscribe_semantic();

    let sidecar = write_semantic(&src, "Alpha.x", 3, &[("x/Alpha#", [5, 0, 5, 6], "definition")]);
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Created))
        .unwrap();
    match recv_event(&events) {
        StreamEvent::Updated(artifact) => assert_eq!(artifact.version, 3),
        other => panic!("expected a fold, got {other:?}"),
    }

    // An older artifact lands on disk afterwards; folding it must be a
    // no-op, which we observe through the next event belonging to Beta.
    write_semantic(&src, "Alpha.x", 2, &[("x/Alpha#", [9, 0, 9, 6], "definition")]);
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Modified))
        .unwrap();
    let beta_sidecar = write_semantic(&src, "Beta.x", 1, &[("x/Beta#", [0, 0, 0, 4], "definition")]);
    rig.pusher
        .push(changed(&beta_sidecar, FileChangeKind::Created))
        .unwrap();

    match recv_event(&events) {
        StreamEvent::Updated(artifact) => {
            assert_eq!(artifact.file, FileKey::local(src.join("Beta.x")));
        }
        other => panic!("expected Beta's fold, got {other:?}"),
    }

    let alpha = FileKey::local(src.join("Alpha.x"));
    assert!(rig.engine.definition(&alpha, pos(5, 1)).is_some());
    assert!(rig.engine.definition(&alpha, pos(9, 1)).is_none());
}

#[test]
fn rescan_events_resync_from_disk() {
    let rig = start_rig(WatchDebounce::ZERO);
    let src = rig.workspace.path().join("src");
    let events = rig.engine.subscribe_semantic();

    // The sidecar appears without any change notification, as after a
    // watcher overflow.
    write_semantic(&src, "Quiet.x", 1, &[("x/Quiet#", [0, 0, 0, 5], "definition")]);
    rig.pusher.push(WatchEvent::Rescan).unwrap();

    match recv_event(&events) {
        StreamEvent::Updated(artifact) => {
            assert_eq!(artifact.file, FileKey::local(src.join("Quiet.x")));
        }
        other => panic!("expected a rescan fold, got {other:?}"),
    }
}

#[test]
fn watch_errors_degrade_to_rescan() {
    let rig = start_rig(WatchDebounce::ZERO);
    let src = rig.workspace.path().join("src");
    let events = rig.engine.subscribe_semantic();

    write_semantic(&src, "Quiet.x", 1, &[("x/Quiet#", [0, 0, 0, 5], "definition")]);
    rig.pusher
        .push_error(io::Error::new(io::ErrorKind::Other, "backend overflowed"))
        .unwrap();

    match recv_event(&events) {
        StreamEvent::Updated(artifact) => {
            assert_eq!(artifact.file, FileKey::local(src.join("Quiet.x")));
        }
        other => panic!("expected a recovery fold, got {other:?}"),
    }
}

#[test]
fn each_stream_sees_its_own_kind() {
    let rig = start_rig(WatchDebounce::ZERO);
    let root = rig.workspace.path();
    let semantic_events = rig.engine.subscribe_semantic();
    let config_events = rig.engine.subscribe_config();

    let sidecar = write_semantic(root, "Widget.x", 1, &[("x/Widget#", [0, 0, 0, 6], "definition")]);
    let config = write_config(root, "app", &serde_json::json!({ "name": "app", "entries": [] }));
    let notes = root.join("notes.txt");
    fs::write(&notes, "scratchpad\n").unwrap();

    rig.pusher
        .push(WatchEvent::Changes {
            changes: vec![
                FileChange::new(&sidecar, FileChangeKind::Created),
                FileChange::new(&config, FileChangeKind::Created),
                FileChange::new(&notes, FileChangeKind::Created),
            ],
        })
        .unwrap();

    match recv_event(&semantic_events) {
        StreamEvent::Updated(artifact) => {
            assert_eq!(artifact.file, FileKey::local(root.join("Widget.x")));
        }
        other => panic!("expected a fold, got {other:?}"),
    }
    match recv_event(&config_events) {
        StreamEvent::Updated(config) => assert_eq!(config.name, "app"),
        other => panic!("expected a config load, got {other:?}"),
    }
    assert_eq!(rig.engine.report().plain_files, 1);

    fs::remove_file(&config).unwrap();
    rig.pusher
        .push(changed(&config, FileChangeKind::Deleted))
        .unwrap();
    match recv_event(&config_events) {
        StreamEvent::Removed(key) => assert_eq!(key, FileKey::local(&config)),
        other => panic!("expected a config removal, got {other:?}"),
    }
}

#[test]
fn debounce_coalesces_bursts() {
    let rig = start_rig(WatchDebounce {
        semantic: Duration::from_millis(500),
        config: Duration::ZERO,
    });
    let src = rig.workspace.path().join("src");
    let events = rig.engine.subscribe_semantic();

    let sidecar = write_semantic(&src, "Busy.x", 1, &[("x/Busy#", [0, 0, 0, 4], "definition")]);
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Modified))
        .unwrap();
    write_semantic(&src, "Busy.x", 2, &[("x/Busy#", [0, 0, 0, 4], "definition")]);
    rig.pusher
        .push(changed(&sidecar, FileChangeKind::Modified))
        .unwrap();

    // Both pushes land inside one quiet period; the flush reads the latest
    // contents once.
    match recv_event(&events) {
        StreamEvent::Updated(artifact) => assert_eq!(artifact.version, 2),
        other => panic!("expected one coalesced fold, got {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

#[test]
fn shutdown_stops_the_pipeline() {
    let rig = start_rig(WatchDebounce::ZERO);
    let engine = Arc::clone(&rig.engine);
    let pusher = rig.pusher.clone();

    rig.handle.shutdown();

    // The watcher thread is gone, so injection has no receiver left.
    assert!(pusher.push(WatchEvent::Rescan).is_err());
    assert_eq!(engine.report().index.files, 0);
}
