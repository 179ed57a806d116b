use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{Layer, Registry};

use crate::common::config::LoggingConfig;

fn parse_level(level: Option<&str>) -> Result<LevelFilter, anyhow::Error> {
    match level {
        Some(level) => level
            .parse()
            .with_context(|| format!("invalid log level: {}", level)),
        None => Ok(LevelFilter::INFO),
    }
}

fn parse_env_filter(default_level: LevelFilter) -> Result<EnvFilter, anyhow::Error> {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()
        .with_context(|| "failed to create env filter")
}

/// Installs the global console subscriber. Calling it again is harmless, the first
/// subscriber stays.
pub fn init(config: &LoggingConfig) -> Result<(), anyhow::Error> {
    let level = parse_level(config.level.as_deref())?;
    let console_filter = parse_env_filter(level)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    if Registry::default().with(console_layer).try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}
