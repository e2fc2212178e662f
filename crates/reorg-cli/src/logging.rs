use std::env;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the dual-layer subscriber: pretty, ANSI output on stdout
/// for the operator plus a plain non-blocking file log for later
/// inspection of a run. The returned guard flushes the file writer on
/// drop and must be held for the lifetime of the process.
///
/// `REORG_LOG` sets the filter (default `info`); `REORG_LOG_FILE` sets
/// the log file path.
pub fn init_logger() -> impl Drop {
    let filter_layer =
        EnvFilter::new(env::var("REORG_LOG").unwrap_or_else(|_| "info".to_string()));

    let log_file =
        env::var("REORG_LOG_FILE").unwrap_or_else(|_| "./logs/reorg.log".to_string());
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never("./", &log_file));

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .pretty()
        .with_file(false)
        .without_time()
        .with_ansi(true);
    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter_layer)
        .init();

    debug!("logging to stdout and {}", log_file);

    guard
}
