//! Shared fixtures: on-disk artifact builders and engines with isolated
//! scratch directories.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::Receiver;
use sextant_core::Position;
use sextant_deps::ScratchConfig;
use sextant_workspace::{Engine, EngineConfig};
use tempfile::TempDir;

/// An occurrence row for [`semantic_json`]: symbol, packed range, role.
pub type OccurrenceRow<'a> = (&'a str, [u32; 4], &'a str);

pub fn engine_with_scratch(root: &Path, scratch: &Path) -> Engine {
    Engine::new(EngineConfig {
        workspace_root: root.to_path_buf(),
        scratch: ScratchConfig {
            scratch_root_override: Some(scratch.to_path_buf()),
        },
    })
    .expect("engine construction")
}

/// Engine rooted at `root` whose scratch lives in a fresh tempdir. The
/// tempdir must outlive the engine, so it is handed back to the caller.
pub fn engine_at(root: &Path) -> (Engine, TempDir) {
    let scratch = tempfile::tempdir().expect("scratch tempdir");
    let engine = engine_with_scratch(root, scratch.path());
    (engine, scratch)
}

pub fn semantic_json(version: u64, occurrences: &[OccurrenceRow<'_>]) -> String {
    let rows: Vec<serde_json::Value> = occurrences
        .iter()
        .map(|(symbol, range, role)| {
            serde_json::json!({ "symbol": symbol, "range": range, "role": role })
        })
        .collect();
    serde_json::json!({ "version": version, "occurrences": rows }).to_string()
}

/// Writes `<source_name>.sym.json` under `dir` and returns the sidecar path.
pub fn write_semantic(
    dir: &Path,
    source_name: &str,
    version: u64,
    occurrences: &[OccurrenceRow<'_>],
) -> PathBuf {
    fs::create_dir_all(dir).expect("artifact dir");
    let path = dir.join(format!("{source_name}.sym.json"));
    fs::write(&path, semantic_json(version, occurrences)).expect("write sidecar");
    path
}

/// Writes `<module>.build.json` under `dir` and returns the config path.
pub fn write_config(dir: &Path, module: &str, body: &serde_json::Value) -> PathBuf {
    fs::create_dir_all(dir).expect("config dir");
    let path = dir.join(format!("{module}.build.json"));
    fs::write(&path, body.to_string()).expect("write config");
    path
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        zip.start_file(*name, options).expect("start entry");
        zip.write_all(contents.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish archive");
}

pub fn pos(line: u32, character: u32) -> Position {
    Position::new(line, character)
}

/// Receives the next stream event, failing the test after a generous grace
/// period rather than hanging the suite.
pub fn recv_event<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(Duration::from_secs(5)).expect("stream event")
}
