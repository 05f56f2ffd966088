use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the global subscriber: stdout always, plus `<YYYY-MM-DD>.log`
/// files under `loggingPath` rotated daily when `logToFile` is set. The
/// returned guard flushes the file writer and must outlive the server.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>, InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false);

    if !config.log_to_file {
        // A second init (tests, embedding) keeps the existing subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stdout)
            .try_init();
        return Ok(None);
    }

    let appender = daily_appender(&config.logging_path)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init();
    tracing::info!(path = %config.logging_path.display(), "logging to file");
    Ok(Some(guard))
}

fn daily_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_suffix("log")
        .build(dir)
}
