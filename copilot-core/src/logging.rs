//! Logging for the host process
//!
//! Output goes to a daily-rotated file under `~/.local/state/copilot/`.
//! Nothing is ever written to stdout: the stdio host uses stdout as its
//! message channel.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Overrides `logging.level` when set, using `EnvFilter` directive syntax.
pub const LOG_ENV: &str = "COPILOT_LOG";

/// Install the global subscriber. Keep the guard alive for the process lifetime.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("copilot.log")
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter(config, std::env::var(LOG_ENV).ok().as_deref()))
        .with(layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_file = %Config::log_path().display(),
        level = %config.level,
        "Logging initialized"
    );
    Ok(LoggingGuard { _guard: guard })
}

/// Directive from the environment when it parses, otherwise the configured level.
fn filter(config: &LoggingConfig, env: Option<&str>) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(&config.level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Flushes pending log lines when dropped.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_env_directive_wins() {
        let filter = filter(&config("info"), Some("copilot_core=trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_falls_back_to_config_level() {
        let hint = |env| filter(&config("debug"), env).max_level_hint();
        assert_eq!(hint(None), Some(LevelFilter::DEBUG));
        assert_eq!(hint(Some("copilot_core=loud")), Some(LevelFilter::DEBUG));
    }
}
