//! # Logging Utilities
//!
//! Logging infrastructure for symflat using `tracing`.
//!
//! The core crate only emits `tracing` events; this module installs the
//! subscriber that formats and routes them:
//! - Pretty (development) or JSON (production) output
//! - Filtering through `RUST_LOG`, or an explicit level from the command line
//! - Optional file output through `tracing-appender`
//!
//! Console output goes to stderr so that command output on stdout stays
//! machine-readable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symflat_utils::init_logging;
//!
//! // Keep the guard alive until exit so buffered file output is flushed
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=symflat_core=debug`)
//! - `SYMFLAT_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `SYMFLAT_LOG_FILE`: Optional log file; a directory gets a dated file
//!   (`YYYY-MM-DD-symflat.log`) inside it

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "SYMFLAT_LOG_FORMAT";

/// Environment variable naming an optional log file or directory.
pub const LOG_FILE_ENV: &str = "SYMFLAT_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (default for production)
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!("{s}. Use 'pretty' or 'json'"))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig
{
    /// Explicit level; overrides `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Log file, or a directory to hold a dated log file.
    pub file: Option<PathBuf>,
}

impl LoggingConfig
{
    /// Read `SYMFLAT_LOG_FORMAT` and `SYMFLAT_LOG_FILE`.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] if the format variable is set
    /// to something unknown.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match std::env::var(LOG_FORMAT_ENV) {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::default(),
        };
        let file = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from);
        Ok(Self {
            level: None,
            format,
            file,
        })
    }

    /// Set an explicit level.
    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        self.level = level;
        self
    }
}

/// Keeps the background file writer alive.
///
/// Dropping it flushes and stops file output, so hold it until exit.
#[derive(Debug)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `SYMFLAT_LOG_FORMAT` is invalid
/// - The log file cannot be created
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_with(&LoggingConfig::from_env()?)
}

/// Initialize logging with explicit settings
///
/// ## Example
///
/// ```rust,no_run
/// use symflat_utils::{init_logging_with, LogFormat, LogLevel, LoggingConfig};
///
/// let config = LoggingConfig {
///     level: Some(LogLevel::Debug),
///     format: LogFormat::Json,
///     file: None,
/// };
/// let _guard = init_logging_with(&config).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file cannot
/// be created.
pub fn init_logging_with(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError>
{
    let env_filter = build_filter(config.level);

    let console_layer = format_layer(config.format, io::stderr, true).with_filter(env_filter.clone());

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let log_file = resolve_log_file(path);
            if let Some(parent) = log_file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            // The date is already in dated file names, so the file never rolls.
            let file_appender = tracing_appender::rolling::never(
                log_file.parent().unwrap_or_else(|| Path::new(".")),
                log_file.file_name().unwrap_or_default(),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = format_layer(config.format, non_blocking, false).with_filter(env_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// Path of the log file for a configured path.
///
/// A directory (existing, or written with a trailing separator) gets a file
/// named after today's date; anything else is used as is.
pub fn resolve_log_file(path: &Path) -> PathBuf
{
    let names_directory = path.is_dir() || path.as_os_str().to_string_lossy().ends_with(std::path::MAIN_SEPARATOR);
    if names_directory {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-symflat.log"))
    } else {
        path.to_path_buf()
    }
}

/// Explicit level first, then `RUST_LOG` (which may hold per-crate filters
/// like `symflat_core=debug`), then INFO.
fn build_filter(level: Option<LogLevel>) -> EnvFilter
{
    match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn format_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
    }

    #[test]
    fn test_resolve_log_file()
    {
        let dir = std::env::temp_dir();
        let resolved = resolve_log_file(&dir);
        assert_eq!(resolved.parent(), Some(dir.as_path()));
        assert!(resolved.to_string_lossy().ends_with("-symflat.log"));

        let file = dir.join("custom.log");
        assert_eq!(resolve_log_file(&file), file);
    }

    #[test]
    fn test_config_with_level()
    {
        let config = LoggingConfig::default().with_level(Some(LogLevel::Debug));
        assert_eq!(config.level, Some(LogLevel::Debug));
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }
}
