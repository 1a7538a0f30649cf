use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "freedomwall.log";

/// Initialise logging into `LOG_FILE_NAME` inside `log_dir`.
///
/// The level is `info` unless `debug` is set, in which case it is `debug`
/// and `RUST_LOG` may override it. The returned guard flushes the writer
/// when dropped, so keep it alive for the lifetime of the process.
pub fn init(log_dir: &Path, debug: bool) -> WorkerGuard {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    guard
}
