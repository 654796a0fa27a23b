//! # Agora Logging
//!
//! Structured logging setup shared by every Agora process.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development
//! - **File Rotation**: Daily, hourly, or single-file output via tracing-appender
//! - **Filtering**: `RUST_LOG` overrides, otherwise the configured level plus
//!   per-target directives
//!
//! # Quick Start
//!
//! ```ignore
//! use agora_logging::{AgoraSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = AgoraSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = AgoraSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! flushed; dropping it flushes and stops the background writer.

pub mod config;
pub mod error;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::{LoggingError, LoggingResult};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::str::FromStr;

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync + 'static>;

/// Builder for configuring and installing the Agora logging subscriber
///
/// Console output is JSONL unless the config asks for pretty output.
pub struct AgoraSubscriberBuilder {
    config: LogConfig,
}

impl AgoraSubscriberBuilder {
    /// Builder with [`LogConfig::default`]
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Also write JSONL to rotating files
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber, reporting problems on stderr instead of failing
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured.
    pub fn try_init(self) -> LoggingResult<Option<WorkerGuard>> {
        let env_filter = self.env_filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let console = &self.config.console;
        if console.enabled {
            let layer = if console.pretty {
                fmt::layer()
                    .with_ansi(console.ansi)
                    .with_target(true)
                    .boxed()
            } else {
                json_layer(&self.config.jsonl, std::io::stdout)
            };
            layers.push(match &console.level {
                Some(level) => {
                    let ceiling = LevelFilter::from_str(level)
                        .map_err(|_| LoggingError::InvalidLevel(level.clone()))?;
                    layer.with_filter(ceiling).boxed()
                }
                None => layer,
            });
        }

        let mut guard = None;
        if let Some(file) = &self.config.file {
            let (writer, file_guard) = file_writer(file)?;
            layers.push(json_layer(&self.config.jsonl, writer));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(env_filter)
            .with(layers)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }

    fn env_filter(&self) -> LoggingResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directives = self.config.filter_directives();
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
            directives,
            reason: e.to_string(),
        })
    }
}

impl Default for AgoraSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn json_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(jsonl.include_current_span)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_writer(writer)
        .boxed()
}

fn file_writer(config: &FileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::Directory {
        path: config.directory.clone(),
        source,
    })?;

    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Install development logging, ignoring an already-installed subscriber
pub fn init_development() {
    let _ = AgoraSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .try_init();
}

/// Install warn-level logging for tests; safe to call from every test
pub fn init_testing() {
    let _ = AgoraSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
