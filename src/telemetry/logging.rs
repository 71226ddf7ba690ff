use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;
use crate::error::Error;
use crate::types::Result;

/// Initialize the logging system
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = parse_level(&config.level);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));

    let registry = Registry::default().with(filter);

    let result = if config.format.eq_ignore_ascii_case("json") {
        let fmt_layer = fmt::Layer::default()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .json();
        registry.with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::Layer::default()
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true);
        registry.with(fmt_layer).try_init()
    };

    result.map_err(|e| Error::Internal(format!("Failed to set global default subscriber: {}", e)))
}

/// Map a configured level name; unknown names fall back to info
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
