//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [workers]
//! count = 3
//! idle_poll_ms = 10
//!
//! [frame]
//! render_poll_ms = 5
//! render_stall_timeout_ms = 0   # 0 waits forever
//! report_channel_capacity = 128
//!
//! [submissions]
//! max_per_group = 1024
//! constant_arena_bytes = 262144
//! max_constant_buffers = 8
//! max_textures = 8
//! ```

use std::path::Path;
use std::time::Duration;

use magnet_core::WorkerPoolConfig;
use magnet_render::{RenderLoopConfig, SubmissionLimits};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSettings {
    /// Background worker threads. Zero means the update thread does all
    /// the work by helping.
    pub count: usize,
    /// Longest an idle worker parks before re-checking the queue.
    pub idle_poll_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: 3,
            idle_poll_ms: 10,
        }
    }
}

/// Frame handshake settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameSettings {
    /// Longest single wait in the handshake and render loop.
    pub render_poll_ms: u64,
    /// How long the orchestrator waits for the renderer before reporting a
    /// stall. Zero waits forever.
    pub render_stall_timeout_ms: u64,
    /// Frame reports buffered before new ones are dropped.
    pub report_channel_capacity: usize,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            render_poll_ms: 5,
            render_stall_timeout_ms: 0,
            report_channel_capacity: 128,
        }
    }
}

/// Submission group capacity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionSettings {
    /// Submissions a group accepts per frame.
    pub max_per_group: usize,
    /// Constant bytes per group slot.
    pub constant_arena_bytes: usize,
    /// Constant blocks per stage per submission.
    pub max_constant_buffers: usize,
    /// Texture bindings per submission.
    pub max_textures: usize,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        let limits = SubmissionLimits::default();
        Self {
            max_per_group: limits.max_per_group,
            constant_arena_bytes: limits.constant_arena_bytes,
            max_constant_buffers: limits.max_constant_buffers,
            max_textures: limits.max_textures,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// `[workers]`
    pub workers: WorkerSettings,
    /// `[frame]`
    pub frame: FrameSettings,
    /// `[submissions]`
    pub submissions: SubmissionSettings,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(bool, &'static str); 6] = [
            (self.workers.idle_poll_ms == 0, "workers.idle_poll_ms"),
            (self.frame.render_poll_ms == 0, "frame.render_poll_ms"),
            (self.frame.report_channel_capacity == 0, "frame.report_channel_capacity"),
            (self.submissions.max_per_group == 0, "submissions.max_per_group"),
            (self.submissions.constant_arena_bytes == 0, "submissions.constant_arena_bytes"),
            (self.submissions.max_constant_buffers == 0, "submissions.max_constant_buffers"),
        ];
        match checks.into_iter().find(|(bad, _)| *bad) {
            Some((_, field)) => Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }

    /// Worker pool configuration.
    #[must_use]
    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            worker_count: self.workers.count,
            idle_poll: Duration::from_millis(self.workers.idle_poll_ms),
            ..WorkerPoolConfig::default()
        }
    }

    /// Handshake poll interval.
    #[must_use]
    pub fn render_poll(&self) -> Duration {
        Duration::from_millis(self.frame.render_poll_ms)
    }

    /// Orchestrator stall timeout, `None` to wait forever.
    #[must_use]
    pub fn render_stall_timeout(&self) -> Option<Duration> {
        match self.frame.render_stall_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Render loop configuration.
    #[must_use]
    pub fn render_loop(&self) -> RenderLoopConfig {
        RenderLoopConfig {
            poll_interval: self.render_poll(),
            report_capacity: self.frame.report_channel_capacity,
            ..RenderLoopConfig::default()
        }
    }

    /// Submission group limits.
    #[must_use]
    pub fn submission_limits(&self) -> SubmissionLimits {
        SubmissionLimits {
            max_per_group: self.submissions.max_per_group,
            constant_arena_bytes: self.submissions.constant_arena_bytes,
            max_constant_buffers: self.submissions.max_constant_buffers,
            max_textures: self.submissions.max_textures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.render_stall_timeout(), None);
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            [workers]
            count = 0

            [frame]
            render_stall_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.workers.count, 0);
        assert_eq!(config.workers.idle_poll_ms, 10);
        assert_eq!(config.render_stall_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.worker_pool().worker_count, 0);
    }

    #[test]
    fn test_zero_poll_rejected() {
        let err = EngineConfig::from_toml_str("[frame]\nrender_poll_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "frame.render_poll_ms", .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_toml_str("[workers]\nthreads = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_sample_config_shows_defaults() {
        let sample = include_str!("../../../config/magnet.toml");
        let config = EngineConfig::from_toml_str(sample).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.render_stall_timeout(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
