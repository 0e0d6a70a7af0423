use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use sharc_core::config::{AppConfig, LoggingConfig};

use crate::error::CliError;

/// Install the global subscriber: stderr always, plus a daily-rotated file
/// under the data dir when enabled. Keep the returned guard alive until
/// exit so buffered file output is flushed.
pub fn init(config: &LoggingConfig, verbose: u8) -> Result<Option<WorkerGuard>, CliError> {
    let directive = match verbose {
        0 => config.filter.as_str(),
        1 => "sharc=debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive)
            .map_err(|e| CliError::Usage(format!("invalid log filter `{directive}`: {e}")))?,
    };

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed();

    let (file, guard) = if config.file {
        let dir = AppConfig::log_dir();
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::daily(&dir, "sharc.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| CliError::Usage(format!("logging already initialized: {e}")))?;

    Ok(guard)
}
