//! # Render Error Types

use magnet_core::CoreError;
use thiserror::Error;

use crate::submission::{ShaderKey, ShaderStage};

/// Errors reported by a [`GpuDevice`](crate::GpuDevice).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Pipeline or constant-buffer creation failed for a shader key.
    #[error("failed to create resources for shader '{key}': {reason}")]
    ResourceCreation {
        /// Shader key the resources were for.
        key: ShaderKey,
        /// Device-specific reason.
        reason: String,
    },

    /// A single draw call was rejected.
    #[error("draw '{name}' failed: {reason}")]
    Draw {
        /// Submission name.
        name: String,
        /// Device-specific reason.
        reason: String,
    },

    /// Presenting a finished frame failed.
    #[error("present of frame {frame} failed: {reason}")]
    Present {
        /// Frame number being presented.
        frame: u64,
        /// Device-specific reason.
        reason: String,
    },
}

/// Errors from submission groups, the registry and the render loop.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The group already holds its maximum number of submissions this frame.
    #[error("shader '{key}' accepts at most {capacity} submissions per frame")]
    CapacityExceeded {
        /// Group key.
        key: ShaderKey,
        /// Configured per-group capacity.
        capacity: usize,
    },

    /// A submission carries more constant blocks than a stage allows.
    #[error("{stage} stage allows at most {max} constant buffers, got {got}")]
    TooManyConstantBuffers {
        /// Shader stage.
        stage: ShaderStage,
        /// Configured maximum.
        max: usize,
        /// Blocks supplied.
        got: usize,
    },

    /// A submission binds more textures than allowed.
    #[error("at most {max} texture bindings allowed, got {got}")]
    TooManyTextures {
        /// Configured maximum.
        max: usize,
        /// Bindings supplied.
        got: usize,
    },

    /// The group's GPU resources could not be created; it takes no draws.
    #[error("shader '{key}' is unavailable: resource creation failed")]
    GroupUnavailable {
        /// Group key.
        key: ShaderKey,
    },

    /// The key is already registered with a different layout.
    #[error("shader '{key}' is already registered with a different layout")]
    LayoutMismatch {
        /// Group key.
        key: ShaderKey,
    },

    /// Constant data did not fit the slot arena.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The device reported a failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The render thread could not be spawned.
    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The render thread panicked.
    #[error("render thread panicked")]
    ThreadPanicked,
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
