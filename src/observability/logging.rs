//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level is used. The
//! filter can be swapped at runtime when the config file changes.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let (filter_layer, handle) = reload::Layer::new(filter);

    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok()
    {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Apply a new level. Ignored when `RUST_LOG` controls the filter.
pub fn set_log_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(e) = handle.reload(default_filter(level)) {
            tracing::warn!(error = %e, "Failed to apply log level");
        }
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("admission_guard={level},tower_http={level}"))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
