use thiserror::Error;

use crate::logger::format::LoggerFormat;

/// Why the process-wide logger could not be set up.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    UnknownFormat(String),
    #[error("journald logging needs Linux and the `journald` feature")]
    JournaldUnavailable,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
    #[error("cannot install the {format} logger: {reason}")]
    Install { format: LoggerFormat, reason: String },
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}
