//! # Application Error Types

use std::path::PathBuf;

use magnet_core::CoreError;
use magnet_render::RenderError;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML did not parse or did not match the schema.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {field} {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Failure reported by an updatable object.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The object's submission was rejected.
    #[error(transparent)]
    Submission(#[from] RenderError),

    /// Object-specific failure.
    #[error("{0}")]
    Object(String),
}

/// Errors from the frame orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Frame handshake failure, such as [`CoreError::RenderStalled`] when
    /// the render side did not catch up within the stall timeout.
    #[error(transparent)]
    Sync(#[from] CoreError),
}

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Worker pool failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Render thread failure.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Orchestrator failure.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Logging could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
