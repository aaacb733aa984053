//! Workspace engine: wires the watcher, artifact streams, dependency
//! resolver, symbol index, and buffer overlay into one reactive pipeline.
//!
//! [`Engine`] owns the mutable state. A watcher thread classifies and
//! debounces raw file events; one driver thread per artifact stream parses
//! and folds them, so semantic and config processing never block each
//! other. Queries read the index through a shared lock and never touch the
//! disk. Hosts subscribe to the parsed-artifact streams for their own
//! bookkeeping; subscriptions see only future deliveries.

mod debounce;
mod engine;
mod multicast;

pub use debounce::Debouncer;
pub use engine::{Engine, EngineConfig, EngineReport, WatchDebounce, WatcherHandle};
pub use multicast::{ConfigEvent, Multicast, SemanticEvent, StreamEvent};

// Types hosts handle when consuming events and query results.
pub use sextant_artifacts::{BuildConfigArtifact, Role, SemanticArtifact};
pub use sextant_ide::HighlightSpan;
pub use sextant_index::{IndexStats, Location};

use thiserror::Error;

/// Failures surfaced by engine construction and seeding.
///
/// Steady-state pipeline failures never reach this type: they are isolated
/// per item, logged, and counted instead.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Deps(#[from] sextant_deps::DepsError),
}
