//! # Synchronization Primitives for Frame Pipelining
//!
//! ## The Problem
//!
//! ```text
//! Update thread:  WRITES frame N+1 submissions
//! Render thread:  READS  frame N   submissions
//!
//! One shared buffer:  the renderer sees a half-built frame
//! One global lock:    the two sides serialize and pipelining is gone
//! ```
//!
//! ## The Solution: Double Buffering + a Frame Handshake
//!
//! ```text
//! Frame N:
//!   Update writes slot A
//!   Render reads slot B (last frame)
//!
//! Swap (only while the renderer is idle):
//!   Update writes slot B
//!   Render reads slot A
//! ```
//!
//! [`DoubleBuffer`] owns the two slots. [`FrameSynchronizer`] decides when
//! swapping is allowed.

mod double_buffer;
mod frame_sync;

pub use double_buffer::{DoubleBuffer, SlotReadHandle, SlotWriteHandle};
pub use frame_sync::{FrameCounters, FrameSynchronizer};
