//! Tracing setup.
//!
//! The subscriber is installed once at startup with [`DEFAULT_LEVEL`]; the
//! level from the loaded config is applied afterwards through a reload handle,
//! so configuration errors are already logged by a working subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level used until the configuration has been read.
pub const DEFAULT_LEVEL: &str = "info";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level(DEFAULT_LEVEL);
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set and valid.
pub fn init_tracing_with_level(level: &str) {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        None => EnvFilter::new(level),
    };

    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured `logging.level` unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::debug!("RUST_LOG is set, ignoring logging.level");
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    match handle.modify(|filter| *filter = EnvFilter::new(level)) {
        Ok(()) => tracing::info!(level, "Log level applied"),
        Err(e) => tracing::warn!(error = %e, level, "Failed to apply log level"),
    }
}
