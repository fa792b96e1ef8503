//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "splitter.log";

/// `RUST_LOG` wins over the configured directive.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .with_context(|| format!("Invalid log filter {:?}", config.filter))
}

/// Install the global subscriber.
///
/// When `config.directory` is set, logs are also written to a daily-rotated
/// file there. Keep the returned guard alive for the life of the process or
/// buffered file output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config)?;

    let (file_writer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Failed to create log directory {directory:?}"))?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .with(file_writer.map(|w| fmt::layer().json().with_writer(w).with_ansi(false)))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .with(file_writer.map(|w| fmt::layer().with_writer(w).with_ansi(false)))
            .try_init()
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(env_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_second_install_fails() {
        let config = LoggingConfig::default();
        let first = init_tracing(&config);
        // The global default can only be set once per process.
        if first.is_ok() {
            assert!(init_tracing(&config).is_err());
        }
    }
}
