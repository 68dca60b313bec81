//! Tracing subscriber setup for the server and CLI.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

static INIT: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}

/// Installs a stdout subscriber filtered by `RUST_LOG` (default `info`).
///
/// Subsequent calls are no-ops.
pub fn init() -> Result<(), LoggingError> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stdout));
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = INIT.set(());

    tracing::debug!("Logging initialized");
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
