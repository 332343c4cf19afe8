//! ``src/logging.rs``
//! ============================================================================
//! # Logging: Tracing Subscriber Setup
//!
//! Builds the global `tracing` subscriber: an `EnvFilter` (honouring
//! `RUST_LOG`, falling back to the configured level) plus either a
//! non-blocking file writer or stderr. The returned [`WorkerGuard`] must be
//! held for the lifetime of the session or buffered lines are lost on exit.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. Returns the appender guard when
    /// logging to a file, `None` when logging to stderr.
    pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

        match &config.directory {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, "arcman.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init()?;

                Ok(Some(guard))
            }
            None => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init()?;

                Ok(None)
            }
        }
    }
}
