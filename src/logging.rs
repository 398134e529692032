//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging the async dispatch
//! pipeline. Initialization is idempotent and tolerant of host applications
//! that have already installed a global tracing subscriber.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with an environment-driven filter.
///
/// The filter is read from `STEGBOT_LOG`, then `RUST_LOG`, defaulting to
/// `info` for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("STEGBOT_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "stegbot_core=info".to_string());

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(filter)),
        );

        // A host (or another test) may already have installed a subscriber.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
