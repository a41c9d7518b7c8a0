//! Logging initialization for the batch binary.

use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-field human-readable lines
    #[default]
    Full,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    /// Parse format from string; unknown values fall back to `Full`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            _ => LogFormat::Full,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// Include module path
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Full,
            default_level: "info".to_string(),
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    ///
    /// Reads:
    /// - `LOG_FORMAT`: full or compact
    /// - `LOG_LEVEL`: default filter (fallback if RUST_LOG not set)
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            ..Default::default()
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(config.include_target);

    match config.format {
        LogFormat::Full => registry.with(layer).try_init()?,
        LogFormat::Compact => registry.with(layer.compact()).try_init()?,
    }
    Ok(())
}
