use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "airbar.log";

/// Routes tracing output to a daily rolling log file under `log_dir`.
///
/// `RUST_LOG` overrides the default filter of `airbar=info`. Keep the
/// returned guard alive for the life of the process or buffered lines are
/// lost on exit.
pub fn initialize_logging(log_dir: impl AsRef<Path>) -> WorkerGuard {
    let log_dir = log_dir.as_ref();
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Could not create log directory {}: {}", log_dir.display(), e);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("airbar=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(false))
        .init();

    tracing::info!("Logging to {}/{}.", log_dir.display(), LOG_FILE_PREFIX);
    guard
}
