use crate::config::AppConfig;
use crate::logger;
use daemonize::Daemonize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to daemonize: {0}")]
    Daemonize(#[from] daemonize::Error),
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaemonConfig {
    pub pid_file: PathBuf,
    pub log_directory: PathBuf,
    pub working_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            pid_file: PathBuf::from("/tmp/lifeline.pid"),
            log_directory: PathBuf::from("/tmp/lifeline"),
            working_dir: PathBuf::from("/"),
        }
    }
}

/// Detaches from the terminal, switches logging to files and runs `core_logic_fn`.
pub fn run_as_daemon<F>(config: Arc<RwLock<AppConfig>>, core_logic_fn: F) -> Result<(), DaemonError>
where
    F: FnOnce() + Send + 'static,
{
    let (daemon_config, log_level) = {
        let config_guard = config.blocking_read();
        (
            config_guard.to_daemonize_config(),
            config_guard.log_level.clone(),
        )
    };

    println!("Starting lifeline scheduler as a daemon");
    println!("PID file: {:?}", daemon_config.pid_file);
    println!("Log directory: {:?}", daemon_config.log_directory);
    std::fs::create_dir_all(&daemon_config.log_directory)?;

    Daemonize::new()
        .pid_file(&daemon_config.pid_file)
        .chown_pid_file(false)
        .working_directory(&daemon_config.working_dir)
        .umask(0o027)
        .start()?;

    let log_guard = logger::init_daemon_logging(&daemon_config.log_directory, log_level.as_deref())
        .map_err(|e| DaemonError::Logging(e.to_string()))?;

    core_logic_fn();

    // Flush buffered log lines before the process goes away.
    drop(log_guard);
    std::thread::sleep(std::time::Duration::from_millis(100));
    Ok(())
}
