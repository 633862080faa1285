//! Error types shared by both pools.

use std::io;
use thiserror::Error;

/// Errors reported by pool creation and teardown.
///
/// Task failures never show up here: a panicking task unwinds the thread that
/// ran it and the pool only reports the dead worker when it is destroyed.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A pool needs at least one worker thread.
    #[error("invalid thread count {0}: a pool needs at least one worker")]
    InvalidThreadCount(usize),

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread {index}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// Teardown finished, but some worker threads had panicked.
    #[error("{count} worker thread(s) panicked")]
    WorkerPanicked { count: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PoolError>;
