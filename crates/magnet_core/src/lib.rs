//! # MAGNET Core
//!
//! Threading and synchronization primitives for a two-stage frame
//! pipeline: the update side builds frame N+1 while the render side draws
//! frame N.
//!
//! ## Building Blocks
//!
//! 1. **[`TaskQueue`] + [`WorkerPool`]** - deferred work run by a fixed set
//!    of background threads, with in-flight tracking
//! 2. **[`DoubleBuffer`]** - two slots and a swap-only role assignment
//! 3. **[`FrameSynchronizer`]** - update/render counters whose lag is 0 or 1
//! 4. **[`Arena`]** - bump storage for per-frame constant blocks
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use magnet_core::{TaskQueue, WorkerPool, WorkerPoolConfig};
//!
//! let queue = Arc::new(TaskQueue::new());
//! let pool = WorkerPool::start(Arc::clone(&queue), WorkerPoolConfig::default()).unwrap();
//! queue.enqueue_fn(|| println!("hello from a worker"));
//! pool.shutdown().unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod sync;
pub mod task;

pub use error::{CoreError, CoreResult};
pub use memory::{Arena, BlobRange, BLOCK_ALIGN};
pub use sync::{DoubleBuffer, FrameCounters, FrameSynchronizer, SlotReadHandle, SlotWriteHandle};
pub use task::{
    ClaimedTask, Task, TaskOutcome, TaskQueue, TaskQueueStats, WorkerPool, WorkerPoolConfig,
    WorkerPoolReport,
};
