use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, Receiver, Sender, TrySendError};
use serde::Serialize;
use sextant_artifacts::{
    classify, described_source, ArtifactKind, BuildConfigArtifact, SemanticArtifact,
    BUILD_CONFIG_SUFFIX, SEMANTIC_SUFFIX,
};
use sextant_core::{collect_files, collect_files_with_suffix, FileKey, Position};
use sextant_deps::{DependencyResolver, ScratchConfig, ScratchDir};
use sextant_ide::HighlightSpan;
use sextant_index::{IndexStats, Location, SymbolIndex};
use sextant_vfs::{
    BufferError, Buffers, ContentChange, FileChange, FileChangeKind, FileSystem, FileWatcher,
    LocalFs, NotifyFileWatcher, WatchEvent,
};

use crate::debounce::Debouncer;
use crate::multicast::{ConfigEvent, Multicast, SemanticEvent, StreamEvent};
use crate::WorkspaceError;

const BATCH_QUEUE_CAPACITY: usize = 256;
const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;
const OVERFLOW_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Construction-time settings for [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Root directory that seeding and rescans enumerate.
    pub workspace_root: PathBuf,
    /// Where extracted dependency sources live.
    pub scratch: ScratchConfig,
}

impl EngineConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            scratch: ScratchConfig::from_env(),
        }
    }
}

/// Quiet periods applied to raw watch events before a batch is forwarded,
/// one per artifact stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchDebounce {
    pub semantic: Duration,
    pub config: Duration,
}

impl WatchDebounce {
    /// No batching delay. For tests and hosts that pre-batch their events.
    pub const ZERO: WatchDebounce = WatchDebounce {
        semantic: Duration::ZERO,
        config: Duration::ZERO,
    };
}

impl Default for WatchDebounce {
    fn default() -> Self {
        Self {
            semantic: Duration::from_millis(200),
            config: Duration::from_millis(200),
        }
    }
}

/// Point-in-time snapshot of what the engine has ingested, for logs and the
/// CLI report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    #[serde(flatten)]
    pub index: IndexStats,
    pub plain_files: usize,
    pub parse_failures: usize,
    pub configs_loaded: usize,
    pub archives_extracted: usize,
    pub archive_failures: usize,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    parse_failures: AtomicUsize,
    configs_loaded: AtomicUsize,
    archives_extracted: AtomicUsize,
    archive_failures: AtomicUsize,
}

/// The batch stream a classified change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StreamKind {
    Semantic,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WatcherMessage {
    Batch(Vec<FileChange>),
    Rescan,
}

/// Owns the workspace state: the symbol index, open-buffer overlay,
/// dependency resolver, and the two artifact event streams.
///
/// Ingestion entry points ([`Engine::seed`], the watcher started by
/// [`Engine::start_watching`], [`Engine::rescan`]) funnel every mutation
/// through the same classify/parse/fold path. Queries take a read guard on
/// the index and consult buffers for live text; they never touch the disk
/// for index state and never observe a half-applied fold.
pub struct Engine {
    workspace_root: PathBuf,
    buffers: Buffers<LocalFs>,
    index: RwLock<SymbolIndex>,
    resolver: Mutex<DependencyResolver>,
    semantic_events: Multicast<SemanticEvent>,
    config_events: Multicast<ConfigEvent>,
    /// Artifact sidecar -> the file it described, recorded on fold so a
    /// deleted sidecar with an explicit `file` field still evicts cleanly.
    described: Mutex<HashMap<FileKey, FileKey>>,
    plain_files: Mutex<HashSet<FileKey>>,
    counters: PipelineCounters,
}

impl Engine {
    /// Builds an engine with the standard collaborators: local disk access
    /// and zip extraction into the scratch directory.
    pub fn new(config: EngineConfig) -> Result<Self, WorkspaceError> {
        let scratch = ScratchDir::new(config.scratch)?;
        Ok(Self::with_resolver(
            config.workspace_root,
            DependencyResolver::new(scratch),
        ))
    }

    /// Like [`Engine::new`] with a caller-supplied resolver, for injecting
    /// extraction collaborators.
    pub fn with_resolver(
        workspace_root: impl Into<PathBuf>,
        resolver: DependencyResolver,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            buffers: Buffers::new(LocalFs::new()),
            index: RwLock::new(SymbolIndex::new()),
            resolver: Mutex::new(resolver),
            semantic_events: Multicast::new(),
            config_events: Multicast::new(),
            described: Mutex::new(HashMap::new()),
            plain_files: Mutex::new(HashSet::new()),
            counters: PipelineCounters::default(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// The open-document overlay shared with navigation queries.
    pub fn buffers(&self) -> &Buffers<LocalFs> {
        &self.buffers
    }

    /// Future semantic-stream deliveries. No replay of earlier ones.
    pub fn subscribe_semantic(&self) -> Receiver<SemanticEvent> {
        self.semantic_events.subscribe(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Future config-stream deliveries. No replay of earlier ones.
    pub fn subscribe_config(&self) -> Receiver<ConfigEvent> {
        self.config_events.subscribe(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Enumerates the workspace once and pushes everything through the
    /// pipeline: semantic artifacts fold into the index, configs resolve
    /// their archives, anything else lands in the plain-file set. Run this
    /// before relying on the watcher for steady-state updates.
    pub fn seed(&self) -> Result<EngineReport, WorkspaceError> {
        let files = collect_files(&self.workspace_root)?;
        let mut semantic = 0usize;
        let mut configs = 0usize;
        for path in &files {
            match classify(path) {
                ArtifactKind::Semantic => {
                    semantic += 1;
                    self.ingest_semantic_path(&FileKey::local(path));
                }
                ArtifactKind::BuildConfig => {
                    configs += 1;
                    self.ingest_config_path(&FileKey::local(path));
                }
                ArtifactKind::Unrecognized => self.track_plain_file(FileKey::local(path)),
            }
        }
        let report = self.report();
        tracing::info!(
            target: "sextant.workspace",
            root = %self.workspace_root.display(),
            semantic_artifacts = semantic,
            configs,
            indexed_files = report.index.files,
            symbols = report.index.symbols,
            "workspace seeded"
        );
        Ok(report)
    }

    pub fn report(&self) -> EngineReport {
        EngineReport {
            index: self.read_index().stats(),
            plain_files: self.lock_plain_files().len(),
            parse_failures: self.counters.parse_failures.load(Ordering::Relaxed),
            configs_loaded: self.counters.configs_loaded.load(Ordering::Relaxed),
            archives_extracted: self.counters.archives_extracted.load(Ordering::Relaxed),
            archive_failures: self.counters.archive_failures.load(Ordering::Relaxed),
        }
    }

    /// Re-enumerates the workspace and re-pushes every artifact.
    ///
    /// Safe at any time: the version guard drops unchanged semantic
    /// artifacts and the extraction cache absorbs config re-pushes. Indexed
    /// workspace files whose sidecar vanished are evicted.
    pub fn rescan(&self) {
        self.rescan_semantics();
        self.rescan_configs();
    }

    // ---- documents ----

    /// Opens an editor overlay for `file`.
    pub fn open_document(&self, file: FileKey, text: impl Into<String>, version: i32) {
        self.buffers.open(file, text, version);
    }

    /// Replaces the overlay text wholesale.
    pub fn change_document(&self, file: FileKey, text: impl Into<String>) {
        self.buffers.changed(file, text);
    }

    /// Applies incremental edits to an open overlay.
    pub fn apply_document_edits(
        &self,
        file: &FileKey,
        version: i32,
        changes: Vec<ContentChange>,
    ) -> Result<(), BufferError> {
        self.buffers.apply_edits(file, version, changes)
    }

    /// Drops the overlay, reverting to disk truth.
    pub fn close_document(&self, file: &FileKey) {
        self.buffers.closed(file);
    }

    // ---- queries ----

    /// Definition site of the symbol under the cursor.
    pub fn definition(&self, file: &FileKey, position: Position) -> Option<Location> {
        let index = self.read_index();
        sextant_ide::definition(&index, &self.buffers, file, position)
    }

    /// Reference sites of the symbol under the cursor.
    pub fn references(
        &self,
        file: &FileKey,
        position: Position,
        include_declaration: bool,
    ) -> Vec<Location> {
        let index = self.read_index();
        sextant_ide::references(&index, &self.buffers, file, position, include_declaration)
    }

    /// Occurrences of the symbol under the cursor within `file`.
    pub fn document_highlight(&self, file: &FileKey, position: Position) -> Vec<HighlightSpan> {
        let index = self.read_index();
        sextant_ide::document_highlight(&index, &self.buffers, file, position)
    }

    // ---- watching ----

    /// Starts watching the workspace root with the platform watcher and
    /// spawns the pipeline threads. Dropping the returned handle stops
    /// them.
    pub fn start_watching(self: &Arc<Self>) -> Result<WatcherHandle, WorkspaceError> {
        let mut watcher = NotifyFileWatcher::new()?;
        watcher.watch(&self.workspace_root)?;
        self.start_watching_with(Box::new(watcher), WatchDebounce::default())
    }

    /// Starts the pipeline threads over a caller-supplied watcher, already
    /// pointed at whatever roots it should observe.
    pub fn start_watching_with(
        self: &Arc<Self>,
        watcher: Box<dyn FileWatcher>,
        debounce: WatchDebounce,
    ) -> Result<WatcherHandle, WorkspaceError> {
        let (semantic_tx, semantic_rx) = channel::bounded(BATCH_QUEUE_CAPACITY);
        let (config_tx, config_rx) = channel::bounded(BATCH_QUEUE_CAPACITY);

        let (watcher_stop, watcher_stop_rx) = channel::bounded(0);
        let watcher_engine = Arc::clone(self);
        let watcher_thread = thread::Builder::new()
            .name("sextant-watcher".into())
            .spawn(move || {
                watcher_loop(
                    watcher_engine,
                    watcher,
                    debounce,
                    watcher_stop_rx,
                    semantic_tx,
                    config_tx,
                );
            })?;

        let (semantic_stop, semantic_stop_rx) = channel::bounded(0);
        let semantic_engine = Arc::clone(self);
        let semantic_thread = thread::Builder::new()
            .name("sextant-semantic-driver".into())
            .spawn(move || {
                driver_loop(semantic_stop_rx, semantic_rx, |message| match message {
                    WatcherMessage::Batch(changes) => {
                        semantic_engine.apply_semantic_changes(changes)
                    }
                    WatcherMessage::Rescan => semantic_engine.rescan_semantics(),
                });
            })?;

        let (config_stop, config_stop_rx) = channel::bounded(0);
        let config_engine = Arc::clone(self);
        let config_thread = thread::Builder::new()
            .name("sextant-config-driver".into())
            .spawn(move || {
                driver_loop(config_stop_rx, config_rx, |message| match message {
                    WatcherMessage::Batch(changes) => config_engine.apply_config_changes(changes),
                    WatcherMessage::Rescan => config_engine.rescan_configs(),
                });
            })?;

        tracing::info!(
            target: "sextant.workspace",
            root = %self.workspace_root.display(),
            "file watcher started"
        );
        Ok(WatcherHandle {
            watcher_stop,
            watcher_thread: Some(watcher_thread),
            semantic_stop,
            semantic_thread: Some(semantic_thread),
            config_stop,
            config_thread: Some(config_thread),
        })
    }

    // ---- ingestion ----

    fn ingest_semantic_path(&self, artifact_key: &FileKey) {
        let bytes = match self.buffers.fs().read_bytes(artifact_key) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Deleted between the event and the read.
                self.evict_for_artifact(artifact_key);
                return;
            }
            Err(err) => {
                self.counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "sextant.pipeline",
                    artifact = %artifact_key,
                    error = %err,
                    "failed to read semantic artifact"
                );
                return;
            }
        };
        let artifact = match SemanticArtifact::parse(&bytes, artifact_key.as_path()) {
            Ok(artifact) => artifact,
            Err(err) => {
                self.counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "sextant.pipeline",
                    artifact = %artifact_key,
                    error = %err,
                    "dropping malformed semantic artifact"
                );
                return;
            }
        };

        let artifact = Arc::new(artifact);
        self.lock_described()
            .insert(artifact_key.clone(), artifact.file.clone());
        let outcome = self.write_index().fold((*artifact).clone());
        if outcome.is_applied() {
            self.semantic_events.publish(StreamEvent::Updated(artifact));
        }
    }

    fn ingest_config_path(&self, config_key: &FileKey) {
        let bytes = match self.buffers.fs().read_bytes(config_key) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.config_events
                    .publish(StreamEvent::Removed(config_key.clone()));
                return;
            }
            Err(err) => {
                self.counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "sextant.pipeline",
                    config = %config_key,
                    error = %err,
                    "failed to read compiler config"
                );
                return;
            }
        };
        let config = match BuildConfigArtifact::parse(&bytes) {
            Ok(config) => config,
            Err(err) => {
                self.counters.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "sextant.pipeline",
                    config = %config_key,
                    error = %err,
                    "dropping malformed compiler config"
                );
                return;
            }
        };

        let config = Arc::new(config);
        self.counters.configs_loaded.fetch_add(1, Ordering::Relaxed);
        self.config_events
            .publish(StreamEvent::Updated(Arc::clone(&config)));

        let resolved = self.lock_resolver().resolve(&config);
        self.counters
            .archives_extracted
            .fetch_add(resolved.extracted, Ordering::Relaxed);
        self.counters
            .archive_failures
            .fetch_add(resolved.failed, Ordering::Relaxed);

        // Extracted files re-enter the pipeline like any other change.
        for path in resolved.files {
            let key = FileKey::local(&path);
            match classify(&path) {
                ArtifactKind::Semantic => self.ingest_semantic_path(&key),
                ArtifactKind::BuildConfig => self.ingest_config_path(&key),
                ArtifactKind::Unrecognized => self.track_plain_file(key),
            }
        }
    }

    fn apply_semantic_changes(&self, changes: Vec<FileChange>) {
        for change in changes {
            let key = FileKey::local(&change.path);
            match change.kind {
                FileChangeKind::Created | FileChangeKind::Modified => {
                    self.ingest_semantic_path(&key)
                }
                FileChangeKind::Deleted => self.evict_for_artifact(&key),
            }
        }
    }

    fn apply_config_changes(&self, changes: Vec<FileChange>) {
        for change in changes {
            let key = FileKey::local(&change.path);
            match change.kind {
                FileChangeKind::Created | FileChangeKind::Modified => {
                    self.ingest_config_path(&key)
                }
                FileChangeKind::Deleted => {
                    self.config_events.publish(StreamEvent::Removed(key));
                }
            }
        }
    }

    /// Evicts whatever file the sidecar at `artifact_key` described.
    fn evict_for_artifact(&self, artifact_key: &FileKey) {
        let source = self
            .lock_described()
            .remove(artifact_key)
            .or_else(|| described_source(artifact_key.as_path()).map(FileKey::local));
        if let Some(source) = source {
            self.evict_file(&source);
        }
    }

    fn evict_file(&self, file: &FileKey) {
        let removed = self.write_index().evict(file);
        if let Some(stats) = removed {
            tracing::debug!(
                target: "sextant.pipeline",
                file = %file,
                definitions_removed = stats.definitions_removed,
                references_removed = stats.references_removed,
                "evicted deleted file"
            );
            self.semantic_events
                .publish(StreamEvent::Removed(file.clone()));
        }
    }

    fn rescan_semantics(&self) {
        let paths = match collect_files_with_suffix(&self.workspace_root, SEMANTIC_SUFFIX) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!(
                    target: "sextant.workspace",
                    root = %self.workspace_root.display(),
                    error = %err,
                    "semantic rescan enumeration failed"
                );
                return;
            }
        };

        let root_key = FileKey::local(&self.workspace_root);
        let sidecars: HashSet<FileKey> = paths.iter().map(FileKey::local).collect();
        let mut on_disk = HashSet::with_capacity(paths.len());
        {
            let mut described = self.lock_described();
            for path in &paths {
                let source = described
                    .get(&FileKey::local(path))
                    .cloned()
                    .or_else(|| described_source(path).map(FileKey::local));
                if let Some(source) = source {
                    on_disk.insert(source);
                }
            }
            described.retain(|artifact_key, _| {
                !artifact_key.as_path().starts_with(root_key.as_path())
                    || sidecars.contains(artifact_key)
            });
        }

        let stale: Vec<FileKey> = self
            .read_index()
            .indexed_files()
            .filter(|file| {
                file.as_path().starts_with(root_key.as_path()) && !on_disk.contains(*file)
            })
            .cloned()
            .collect();
        for file in &stale {
            self.evict_file(file);
        }

        for path in &paths {
            self.ingest_semantic_path(&FileKey::local(path));
        }
        tracing::info!(
            target: "sextant.workspace",
            artifacts = paths.len(),
            evicted = stale.len(),
            "semantic rescan complete"
        );
    }

    fn rescan_configs(&self) {
        let paths = match collect_files_with_suffix(&self.workspace_root, BUILD_CONFIG_SUFFIX) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!(
                    target: "sextant.workspace",
                    root = %self.workspace_root.display(),
                    error = %err,
                    "config rescan enumeration failed"
                );
                return;
            }
        };
        for path in &paths {
            self.ingest_config_path(&FileKey::local(path));
        }
        tracing::info!(
            target: "sextant.workspace",
            configs = paths.len(),
            "config rescan complete"
        );
    }

    fn track_plain_change(&self, change: &FileChange) {
        let key = FileKey::local(&change.path);
        match change.kind {
            FileChangeKind::Created | FileChangeKind::Modified => self.track_plain_file(key),
            FileChangeKind::Deleted => {
                self.lock_plain_files().remove(&key);
            }
        }
    }

    fn track_plain_file(&self, key: FileKey) {
        self.lock_plain_files().insert(key);
    }

    // ---- locks ----

    #[track_caller]
    fn read_index(&self) -> RwLockReadGuard<'_, SymbolIndex> {
        recover(self.index.read())
    }

    #[track_caller]
    fn write_index(&self) -> RwLockWriteGuard<'_, SymbolIndex> {
        recover(self.index.write())
    }

    #[track_caller]
    fn lock_resolver(&self) -> MutexGuard<'_, DependencyResolver> {
        recover(self.resolver.lock())
    }

    #[track_caller]
    fn lock_described(&self) -> MutexGuard<'_, HashMap<FileKey, FileKey>> {
        recover(self.described.lock())
    }

    #[track_caller]
    fn lock_plain_files(&self) -> MutexGuard<'_, HashSet<FileKey>> {
        recover(self.plain_files.lock())
    }
}

#[track_caller]
fn recover<G>(result: Result<G, PoisonError<G>>) -> G {
    match result {
        Ok(guard) => guard,
        Err(err) => {
            let loc = std::panic::Location::caller();
            tracing::error!(
                target: "sextant.workspace",
                file = loc.file(),
                line = loc.line(),
                "engine lock poisoned; continuing with recovered guard"
            );
            err.into_inner()
        }
    }
}

/// Owns the watcher and driver threads. Dropping it stops the pipeline:
/// stop signals first, then joins, the watcher ahead of the drivers so no
/// batch is produced after its consumer is gone.
pub struct WatcherHandle {
    watcher_stop: Sender<()>,
    watcher_thread: Option<JoinHandle<()>>,
    semantic_stop: Sender<()>,
    semantic_thread: Option<JoinHandle<()>>,
    config_stop: Sender<()>,
    config_thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Stops the threads and waits for them. Equivalent to dropping the
    /// handle, as an explicit call site.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.watcher_stop.send(());
        if let Some(thread) = self.watcher_thread.take() {
            let _ = thread.join();
        }
        let _ = self.semantic_stop.send(());
        if let Some(thread) = self.semantic_thread.take() {
            let _ = thread.join();
        }
        let _ = self.config_stop.send(());
        if let Some(thread) = self.config_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn watcher_loop(
    engine: Arc<Engine>,
    watcher: Box<dyn FileWatcher>,
    debounce: WatchDebounce,
    stop: Receiver<()>,
    semantic_tx: Sender<WatcherMessage>,
    config_tx: Sender<WatcherMessage>,
) {
    // `watcher` must stay owned here for the whole loop: dropping it stops
    // the backend event stream.
    let watch_rx = watcher.receiver().clone();
    let debouncer = Debouncer::new([
        (StreamKind::Semantic, debounce.semantic),
        (StreamKind::Config, debounce.config),
    ]);
    let mut rescan_semantic = false;
    let mut rescan_config = false;

    loop {
        if rescan_semantic {
            match semantic_tx.try_send(WatcherMessage::Rescan) {
                Ok(()) => rescan_semantic = false,
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        if rescan_config {
            match config_tx.try_send(WatcherMessage::Rescan) {
                Ok(()) => rescan_config = false,
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
        }

        let now = Instant::now();
        let mut deadline = debouncer
            .next_deadline()
            .unwrap_or_else(|| now + Duration::from_secs(3600));
        if rescan_semantic || rescan_config {
            deadline = deadline.min(now + OVERFLOW_RETRY_INTERVAL);
        }
        let tick = channel::after(deadline.saturating_duration_since(now));

        channel::select! {
            recv(stop) -> _ => {
                for (kind, changes) in debouncer.flush_all() {
                    let tx = match kind {
                        StreamKind::Semantic => &semantic_tx,
                        StreamKind::Config => &config_tx,
                    };
                    let _ = tx.try_send(WatcherMessage::Batch(changes));
                }
                break;
            }
            recv(watch_rx) -> message => {
                let Ok(message) = message else { break };
                match message {
                    Ok(WatchEvent::Changes { changes }) => {
                        let now = Instant::now();
                        for change in changes {
                            match classify(&change.path) {
                                ArtifactKind::Semantic => {
                                    debouncer.push(&StreamKind::Semantic, change, now)
                                }
                                ArtifactKind::BuildConfig => {
                                    debouncer.push(&StreamKind::Config, change, now)
                                }
                                ArtifactKind::Unrecognized => engine.track_plain_change(&change),
                            }
                        }
                        if !dispatch_due(
                            &debouncer,
                            Instant::now(),
                            &semantic_tx,
                            &config_tx,
                            &mut rescan_semantic,
                            &mut rescan_config,
                        ) {
                            break;
                        }
                    }
                    Ok(WatchEvent::Rescan) => {
                        // The backing watcher lost events.
                        rescan_semantic = true;
                        rescan_config = true;
                        debouncer.clear();
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "sextant.workspace",
                            error = %err,
                            "watch error; scheduling rescan"
                        );
                        rescan_semantic = true;
                        rescan_config = true;
                        debouncer.clear();
                    }
                }
            }
            recv(tick) -> _ => {
                if !dispatch_due(
                    &debouncer,
                    Instant::now(),
                    &semantic_tx,
                    &config_tx,
                    &mut rescan_semantic,
                    &mut rescan_config,
                ) {
                    break;
                }
            }
        }
    }
}

/// Forwards due batches to their drivers. A full queue degrades to a
/// rescan so nothing is silently lost. Returns false when a driver hung
/// up.
fn dispatch_due(
    debouncer: &Debouncer<StreamKind>,
    now: Instant,
    semantic_tx: &Sender<WatcherMessage>,
    config_tx: &Sender<WatcherMessage>,
    rescan_semantic: &mut bool,
    rescan_config: &mut bool,
) -> bool {
    for (kind, changes) in debouncer.flush_due(now) {
        let tx = match kind {
            StreamKind::Semantic => semantic_tx,
            StreamKind::Config => config_tx,
        };
        match tx.try_send(WatcherMessage::Batch(changes)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    target: "sextant.workspace",
                    stream = ?kind,
                    "batch queue full; degrading to rescan"
                );
                *rescan_semantic = true;
                *rescan_config = true;
                debouncer.clear();
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
    true
}

fn driver_loop(
    stop: Receiver<()>,
    messages: Receiver<WatcherMessage>,
    mut handle: impl FnMut(WatcherMessage),
) {
    loop {
        channel::select! {
            recv(stop) -> _ => break,
            recv(messages) -> message => {
                let Ok(message) = message else { break };
                handle(message);
            }
        }
    }
}
