use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured logging for the bot process.
///
/// JSON output with span context, filtered through RUST_LOG with an info
/// default.
pub fn init_telemetry() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("obfusbot telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking the events of one update
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping the handling of a single polled update
pub fn create_update_span(update_id: i64, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "update",
        update.id = update_id,
        correlation.id = correlation_id,
    )
}
