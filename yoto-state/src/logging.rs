//! Logging setup for applications embedding yoto-sdk
//!
//! The crates only emit `tracing` events. Installing a subscriber is left to
//! the application; these helpers cover the common setups.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at info level
    Development,
    /// Verbose output with source locations
    Debug,
    /// One JSON object per line, for log shipping
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// # Examples
///
/// ```rust,ignore
/// yoto_state::logging::init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `YOTO_LOG_LEVEL`: Override the filter (e.g. "warn" or "yoto_dispatch=debug")
/// - `RUST_LOG`: Used when `YOTO_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact())
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Parses a `YOTO_LOG_MODE` value
pub fn parse_mode(raw: &str) -> Result<LoggingMode, LoggingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "silent" | "" => Ok(LoggingMode::Silent),
        "development" | "dev" => Ok(LoggingMode::Development),
        "debug" => Ok(LoggingMode::Debug),
        "json" => Ok(LoggingMode::Json),
        other => Err(LoggingError::InvalidEnv(format!("YOTO_LOG_MODE={other}"))),
    }
}

/// Initialize logging from environment variables
///
/// Reads `YOTO_LOG_MODE` ("silent", "development", "debug" or "json").
/// Defaults to silent when unset.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("YOTO_LOG_MODE") {
        Ok(raw) => parse_mode(&raw)?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    // YOTO_LOG_LEVEL, then RUST_LOG, then default
    let directives = std::env::var("YOTO_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{directives}: {e}")))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("Debug").unwrap(), LoggingMode::Debug);
        assert_eq!(parse_mode("json").unwrap(), LoggingMode::Json);
        assert_eq!(parse_mode("").unwrap(), LoggingMode::Silent);
        assert!(matches!(parse_mode("loud"), Err(LoggingError::InvalidEnv(_))));
    }
}
