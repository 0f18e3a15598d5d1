//! # MAGNET
//!
//! Frame pipelining for a real-time renderer: the update side builds frame
//! N+1 on a worker pool while a dedicated thread draws frame N.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  update thread                       worker threads (N)              │
//! │  ┌───────────────────┐  enqueue     ┌──────────────────────────┐     │
//! │  │ FrameOrchestrator │ ───────────> │ TaskQueue                │     │
//! │  │  help / swap /    │ <── help ─── │  Updatable::update(ctx)  │     │
//! │  │  advance_update   │              │   └─> group.append       │     │
//! │  └─────────┬─────────┘              └──────────────────────────┘     │
//! │            │ update_count        render thread                       │
//! │            ▼                     ┌──────────────────────────┐        │
//! │  ┌───────────────────┐ ◄──────── │ RenderLoop               │        │
//! │  │ FrameSynchronizer │ render_   │  passes over read slots  │        │
//! │  └───────────────────┘ count     │  present, advance_render │        │
//! │                                  └──────────────────────────┘        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `application`: the context object owning every piece
//! - `orchestrator`: the update thread's per-frame step
//! - `scene`: updatable objects and what they can write
//! - `config`: TOML engine configuration
//! - `logging`: `tracing` subscriber setup

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod application;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod scene;

// Re-export the lower layers
pub use magnet_core as core;
pub use magnet_render as render;

pub use application::{Application, ShutdownReport};
pub use config::EngineConfig;
pub use error::{AppError, AppResult, ConfigError, OrchestratorError, UpdateError};
pub use orchestrator::{FrameOrchestrator, FrameStep, OrchestratorParts, OrchestratorStats};
pub use scene::{OrbitCamera, Scene, SpinningObject, Updatable, UpdateContext};
