//! # MAGNET Render
//!
//! Render-side half of the frame pipeline: per-shader submission groups
//! that update tasks append into, and the dedicated thread that draws them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ worker threads                                                │
//! │   SubmissionRegistry::submit(key, layout, draft)              │
//! │        └─> SubmissionGroup(key).append ──> write slot         │
//! ├───────────────────────────────────────────────────────────────┤
//! │ orchestrator (renderer idle):  swap_all + view swap           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ render thread                                                 │
//! │   RenderPass::Opaque: for group in key order                  │
//! │        draw read slot ──> GpuDevice::draw ──> clear slot      │
//! │   GpuDevice::present ──> FrameReport ──> advance_render       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! No graphics API is linked here. A real backend implements
//! [`GpuDevice`]; [`HeadlessDevice`] stands in for tests and tools.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod device;
pub mod error;
pub mod group;
pub mod pass;
pub mod registry;
pub mod render_loop;
pub mod stats;
pub mod submission;
pub mod view;

pub use device::{BufferHandle, DrawRecord, GpuDevice, GroupResources, HeadlessDevice, PipelineHandle};
pub use error::{DeviceError, RenderError, RenderResult};
pub use group::{GroupDrawStats, GroupLayout, SubmissionGroup, SubmissionSlot};
pub use pass::RenderPass;
pub use registry::SubmissionRegistry;
pub use render_loop::{RenderController, RenderLoop, RenderLoopConfig, RenderShared, RenderState};
pub use stats::{FrameReport, PassStats, RenderStats};
pub use submission::{
    DrawPacket, DrawSubmission, GeometryHandle, ShaderKey, ShaderStage, SubmissionDraft, SubmissionLimits,
    TextureBinding, Viewport,
};
pub use view::{Mat4, SharedView, ViewData, IDENTITY};
