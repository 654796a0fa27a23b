//! Error types for logging setup

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid filter directives '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("invalid console level '{0}'")]
    InvalidLevel(String),

    #[error("cannot create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file appender: {0}")]
    Appender(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

pub type LoggingResult<T> = Result<T, LoggingError>;
