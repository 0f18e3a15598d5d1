//! # Core Error Types
//!
//! All errors that can occur in the frame pipelining primitives.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the core primitives.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The arena does not have room for the requested block.
    #[error("arena exhausted: requested {requested} bytes, {remaining} remaining of {capacity}")]
    ArenaExhausted {
        /// Bytes requested (before alignment padding).
        requested: usize,
        /// Bytes still free.
        remaining: usize,
        /// Total arena capacity.
        capacity: usize,
    },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread {index}: {source}")]
    WorkerSpawn {
        /// Index of the worker in the pool.
        index: usize,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked outside of task execution.
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),

    /// The render side did not catch up with the update side in time.
    #[error("render stalled: update frame {update}, render frame {render}, waited {waited:?}")]
    RenderStalled {
        /// Update counter at the time of the timeout.
        update: u64,
        /// Render counter at the time of the timeout.
        render: u64,
        /// How long the caller waited.
        waited: Duration,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
