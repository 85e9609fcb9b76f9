//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging long-running ingestion
//! pipelines and scheduler activity.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(log_level)),
        );

        // Use try_init to avoid panic if a global subscriber already exists
        // (embedding applications commonly install their own).
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Detect the current environment from GITHARVEST_ENV, falling back to development
fn get_environment() -> String {
    std::env::var("GITHARVEST_ENV").unwrap_or_else(|_| "development".to_string())
}

/// Resolve the log filter: RUST_LOG wins, otherwise environment defaults apply
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }

    match environment {
        "production" => "githarvest=info".to_string(),
        "test" => "githarvest=warn".to_string(),
        _ => "githarvest=debug".to_string(),
    }
}
