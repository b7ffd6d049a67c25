//! # heapscope utilities
//!
//! Shared logging and timing helpers for the heapscope workspace.
//!
//! The engine runs inside a host debugger, so the default logging mode writes
//! to a file rather than to the debugger console.

pub mod logging;
pub mod timing;

// Re-export commonly used logging functions for convenience
pub use logging::{
    host_log_file, init_logging, init_logging_for_host, init_logging_with_level, LogFormat, LogLevel, LogSettings, LoggingError,
};
pub use timing::Stopwatch;
pub use tracing::{debug, error, info, trace, warn};
