//! # Memory Management
//!
//! Per-frame constant data lives in pre-allocated arenas. Each submission
//! slot owns one; the slot resets it after the renderer consumes the slot,
//! so steady-state frames do not touch the heap for constant data.

mod arena;

pub use arena::{Arena, BlobRange, BLOCK_ALIGN};
