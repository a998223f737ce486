//! Log setup: a per-run file under the log directory plus optional stderr output

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info";

fn log_file_name(timestamp: &str) -> String {
    format!("{}.log", timestamp)
}

/// Log file of the run stamped `timestamp`
pub fn log_file_path(log_dir: &Path, timestamp: &str) -> PathBuf {
    log_dir.join(log_file_name(timestamp))
}

/// Install the global subscriber.
///
/// Every event passing `RUST_LOG` (default `info`) goes to
/// `<log_dir>/<timestamp>.log`; pass the run's own timestamp so the log file
/// and the artifact directory share a name. With `verbose` the same events are
/// also printed to stderr. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init_logging(log_dir: &Path, timestamp: &str, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, log_file_name(timestamp));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter());

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;
    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_named_after_run_timestamp() {
        assert_eq!(
            log_file_path(Path::new("logs"), "01_02_2026_03_04_05"),
            Path::new("logs/01_02_2026_03_04_05.log")
        );
    }
}
