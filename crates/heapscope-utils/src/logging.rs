//! # Logging Utilities
//!
//! `tracing` setup for heapscope.
//!
//! The engine is normally loaded into a host debugger whose stdout and stderr
//! belong to the user's console, so there are two modes:
//! - **Console** (`init_logging`, `init_logging_with_level`): stderr, plus an
//!   optional log file. For tests and standalone tooling.
//! - **Host-embedded** (`init_logging_for_host`): file only, one file per day.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `RUST_LOG=heapscope_core=trace`)
//! - `HEAPSCOPE_LOG_FORMAT`: `json` or `pretty` (default `pretty`)
//! - `HEAPSCOPE_LOG_FILE`: extra log file in console mode
//!
//! Round-trip timings from [`Stopwatch`](crate::Stopwatch) are emitted at
//! `trace`, so `RUST_LOG=heapscope_core=trace` shows where a slow summary
//! spends its queries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use heapscope_utils::{init_logging_with_level, LogFormat, LogLevel};
//!
//! init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("Failed to initialize logging");
//! tracing::debug!("layout cache miss");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const FORMAT_VAR: &str = "HEAPSCOPE_LOG_FORMAT";
const FILE_VAR: &str = "HEAPSCOPE_LOG_FILE";
const HOST_LOG_DIR: &str = ".heapscope";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Failures only
    Error,
    /// Suspicious runtime answers, failed commands
    Warn,
    /// Default
    Info,
    /// Cache misses and provider selection
    Debug,
    /// Per-query round-trip timings
    Trace,
}

impl LogLevel
{
    /// Filter directive for this level.
    pub fn as_str(self) -> &'static str
    {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
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
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Resolved logging settings.
///
/// An explicit level wins over `RUST_LOG`; without either, `info` is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings
{
    level: Option<LogLevel>,
    format: LogFormat,
    file: Option<PathBuf>,
}

impl LogSettings
{
    /// Settings from `HEAPSCOPE_LOG_FORMAT` and `HEAPSCOPE_LOG_FILE`.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        Self {
            level: None,
            format: lookup(FORMAT_VAR)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            file: lookup(FILE_VAR).filter(|value| !value.is_empty()).map(PathBuf::from),
        }
    }

    /// Force a level, ignoring `RUST_LOG`.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    /// Also write to `path`.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.file = Some(path.into());
        self
    }

    /// Output format.
    pub fn format(&self) -> LogFormat
    {
        self.format
    }

    /// Extra log file, if any.
    pub fn file(&self) -> Option<&Path>
    {
        self.file.as_deref()
    }

    fn filter(&self) -> EnvFilter
    {
        match self.level {
            Some(level) => EnvFilter::new(level.as_str()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LogLevel::Info.as_str())),
        }
    }
}

/// Initialize console logging from the environment.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging() -> Result<(), LoggingError>
{
    init_console(&LogSettings::from_env())
}

/// Initialize console logging with an explicit level and format.
///
/// `HEAPSCOPE_LOG_FILE` is still honoured.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_console(&LogSettings::from_env().with_level(level).with_format(format))
}

/// Initialize file-only logging for use inside a host debugger.
///
/// Writes to [`host_log_file`] and returns that path.
///
/// ## Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_logging_for_host(level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    let mut settings = LogSettings::from_env();
    if let Some(level) = level {
        settings = settings.with_level(level);
    }

    let log_file = host_log_file(env::var_os("HOME").map(PathBuf::from).as_deref());
    let directory = directory_of(&log_file);
    std::fs::create_dir_all(&directory)?;

    // The date is already in the file name.
    let appender = tracing_appender::rolling::never(directory, file_name_of(&log_file));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The engine stays loaded until the host exits, so the flush guard does too.
    std::mem::forget(guard);

    Registry::default()
        .with(layer(settings.format(), writer, false, settings.filter()))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    tracing::info!(path = %log_file.display(), "heapscope logging started");
    Ok(log_file)
}

/// Today's host-mode log file: `<home>/.heapscope/YYYY-MM-DD-heapscope.log`,
/// or the same name under the temp directory without a home.
pub fn host_log_file(home: Option<&Path>) -> PathBuf
{
    let name = format!("{}-heapscope.log", Utc::now().format("%Y-%m-%d"));
    match home {
        Some(home) => home.join(HOST_LOG_DIR).join(name),
        None => env::temp_dir().join(name),
    }
}

fn init_console(settings: &LogSettings) -> Result<(), LoggingError>
{
    let console = layer(settings.format(), io::stderr, true, settings.filter());
    let result = match settings.file() {
        Some(path) => {
            let appender = tracing_appender::rolling::daily(directory_of(path), file_name_of(path));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            std::mem::forget(guard);
            Registry::default()
                .with(console)
                .with(layer(settings.format(), writer, false, settings.filter()))
                .try_init()
        }
        None => Registry::default().with(console).try_init(),
    };

    result.map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

fn layer<S, W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => base.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn directory_of(path: &Path) -> PathBuf
{
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn file_name_of(path: &Path) -> PathBuf
{
    path.file_name().map_or_else(|| PathBuf::from("heapscope.log"), PathBuf::from)
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown format name
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Unknown level name
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// The log directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
