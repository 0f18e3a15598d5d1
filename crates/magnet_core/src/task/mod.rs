//! # Task Execution
//!
//! Deferred work shared between the update thread and the worker pool.
//!
//! ```text
//! Update thread ──enqueue──> [ TaskQueue ] <──claim── Worker 0..N
//!       │                          ▲
//!       └────── help: claim ───────┘
//! ```

mod queue;
mod worker;

pub use queue::{ClaimedTask, Task, TaskOutcome, TaskQueue, TaskQueueStats};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolReport};
