use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sextant_vfs::{FileChange, FileChangeKind};

/// Batches file changes per key until the key's quiet period elapses.
///
/// Every `push` re-arms the key's deadline (trailing edge) and coalesces
/// repeated changes to the same path, so a storm of writes to one file
/// flushes as a single change. Callers poll with [`Debouncer::flush_due`]
/// using [`Debouncer::next_deadline`] as the wakeup hint.
pub struct Debouncer<K> {
    delays: HashMap<K, Duration>,
    pending: Mutex<HashMap<K, PendingBatch>>,
}

struct PendingBatch {
    deadline: Instant,
    changes: Vec<FileChange>,
    by_path: HashMap<PathBuf, usize>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(delays: impl IntoIterator<Item = (K, Duration)>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Adds `change` to `key`'s batch and pushes the batch deadline out by
    /// the key's delay. Keys never registered flush immediately.
    pub fn push(&self, key: &K, change: FileChange, now: Instant) {
        let delay = self.delays.get(key).copied().unwrap_or(Duration::ZERO);
        let mut pending = self.pending.lock();
        let batch = pending.entry(key.clone()).or_insert_with(|| PendingBatch {
            deadline: now + delay,
            changes: Vec::new(),
            by_path: HashMap::new(),
        });
        batch.deadline = now + delay;
        match batch.by_path.get(&change.path) {
            Some(&slot) => {
                let previous = batch.changes[slot].kind;
                batch.changes[slot].kind = coalesce(previous, change.kind);
            }
            None => {
                batch.by_path.insert(change.path.clone(), batch.changes.len());
                batch.changes.push(change);
            }
        }
    }

    /// Removes and returns every batch whose deadline has passed.
    pub fn flush_due(&self, now: Instant) -> Vec<(K, Vec<FileChange>)> {
        let mut due = Vec::new();
        self.pending.lock().retain(|key, batch| {
            if batch.deadline <= now {
                due.push((key.clone(), std::mem::take(&mut batch.changes)));
                false
            } else {
                true
            }
        });
        due
    }

    /// Removes and returns every batch regardless of deadline.
    pub fn flush_all(&self) -> Vec<(K, Vec<FileChange>)> {
        self.pending
            .lock()
            .drain()
            .map(|(key, batch)| (key, batch.changes))
            .collect()
    }

    /// Drops all pending batches. Used when the consumer falls back to a
    /// full rescan and buffered changes would only be redundant.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }

    /// Earliest pending deadline, if any batch is buffered.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.lock().values().map(|batch| batch.deadline).min()
    }
}

/// Collapses two observations of one path into the change the consumer
/// should act on. Anything after a delete means the path exists again, so
/// the pair reads as a creation.
fn coalesce(previous: FileChangeKind, next: FileChangeKind) -> FileChangeKind {
    use FileChangeKind::{Created, Deleted, Modified};
    match (previous, next) {
        (_, Deleted) => Deleted,
        (Deleted, _) | (Created, _) => Created,
        (Modified, Created) => Created,
        (Modified, Modified) => Modified,
    }
}
