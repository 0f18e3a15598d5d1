//! Logging initialization.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::AppError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,magnet=debug";

/// Installs a `tracing` subscriber writing to stderr.
///
/// Filtering comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// Thread names are included, which tells worker, update and render
/// output apart.
///
/// # Errors
///
/// Returns [`AppError::Logging`] if a global subscriber is already set.
///
/// # Example
///
/// ```no_run
/// magnet::logging::init_logging().unwrap();
/// tracing::info!("pipeline starting");
/// ```
pub fn init_logging() -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| AppError::Logging(err.to_string()))
}
