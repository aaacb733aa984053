use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{self as channel, Receiver, Sender};
use sextant_artifacts::{BuildConfigArtifact, SemanticArtifact};
use sextant_core::FileKey;

/// One delivery on an artifact stream.
///
/// `Updated` carries the parsed artifact that was just applied; `Removed`
/// reports that a file's contribution left the pipeline. Payloads are
/// shared, so fanning out to many subscribers never copies artifact bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent<T> {
    Updated(Arc<T>),
    Removed(FileKey),
}

/// Deliveries on the semantic-artifact stream.
pub type SemanticEvent = StreamEvent<SemanticArtifact>;

/// Deliveries on the compiler-config stream.
pub type ConfigEvent = StreamEvent<BuildConfigArtifact>;

/// Fan-out of one event stream to any number of subscribers.
///
/// There is no replay: a subscriber joined after an event was published
/// never sees it. Publishing blocks while a live subscriber's queue is
/// full; subscribers whose receiver is gone are pruned on the next publish.
pub struct Multicast<T> {
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T> Multicast<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Opens a subscription with its own bounded queue.
    pub fn subscribe(&self, capacity: usize) -> Receiver<T> {
        let (tx, rx) = channel::bounded(capacity);
        self.lock_subscribers().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    #[track_caller]
    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<T>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(err) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    target: "sextant.workspace",
                    file = loc.file(),
                    line = loc.line(),
                    "subscriber list mutex poisoned; continuing with recovered guard"
                );
                err.into_inner()
            }
        }
    }
}

impl<T: Clone> Multicast<T> {
    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: T) {
        self.lock_subscribers()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl<T> Default for Multicast<T> {
    fn default() -> Self {
        Self::new()
    }
}
