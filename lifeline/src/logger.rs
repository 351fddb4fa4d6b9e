use anyhow::{anyhow, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter(fallback_level: Option<&str>) -> Result<(EnvFilter, String)> {
    let filter_str = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| fallback_level.map(str::to_string))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow!("failed to parse log filter '{}': {}", filter_str, e))?;
    Ok((filter, filter_str))
}

/// Logs to stderr so job output on stdout stays clean.
pub fn init_foreground_logging(fallback_level: Option<&str>) -> Result<()> {
    let (filter, _) = env_filter(fallback_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing subscriber: {}", e))
}

/// Daily rolling `lifeline.log` in `log_directory`. Keep the guard alive
/// until exit or buffered lines are lost.
pub fn init_daemon_logging(
    log_directory: &Path,
    fallback_level: Option<&str>,
) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_directory, "lifeline.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let (filter, filter_str) = env_filter(fallback_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        "Logging initialized. Log directory: {}",
        log_directory.display()
    );
    tracing::info!("Log filter: '{}'", filter_str);

    Ok(guard)
}
