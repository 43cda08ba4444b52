//! # Structured Logging Module
//!
//! Environment-aware structured logging for the bridge's poll loop, dispatch workers
//! and publish path. Embedding hosts that already installed a global subscriber keep it.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` wins over the environment-derived level. `TASKER_LOG_FORMAT=json`
/// switches the console layer to JSON lines.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("TASKER_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A global subscriber may already be set by the embedding engine
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
pub(crate) fn get_environment() -> String {
    std::env::var("TASKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a change of the subscribed topic set
pub fn log_registration_change(
    operation: &str,
    deployment_id: &str,
    topics: &std::collections::BTreeSet<String>,
) {
    tracing::info!(
        operation = %operation,
        deployment_id = %deployment_id,
        topic_count = topics.len(),
        topics = ?topics,
        timestamp = %Utc::now().to_rfc3339(),
        "📚 REGISTRATION_CHANGE"
    );
}

/// Log the outcome of delivering one record to one deployment
pub fn log_dispatch_outcome(
    topic: &str,
    deployment_id: &str,
    signal_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        topic = %topic,
        deployment_id = %deployment_id,
        signal_name = %signal_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📨 DISPATCH"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
