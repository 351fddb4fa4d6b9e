use crate::config::AppConfig;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Owns the shared configuration and swaps it on reload.
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config: Arc<RwLock<AppConfig>>, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Re-reads the file. The current configuration is kept if it fails to load.
    pub async fn reload_config(&self) -> Result<()> {
        info!(target: "lifeline_sched", path = %self.config_path.display(), "reloading configuration");
        // Load before taking the lock so no IO happens while it is held.
        let load_start = Instant::now();
        let load_result = AppConfig::load_from_file(&self.config_path);
        debug!(
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "load_from_file completed"
        );

        match load_result {
            Ok(new_config) => {
                let mut config_guard =
                    tokio::time::timeout(Duration::from_secs(3), self.config.write())
                        .await
                        .map_err(|_| anyhow::anyhow!("timed out waiting for the config write lock"))?;
                *config_guard = new_config;
                info!(target: "lifeline_sched", "configuration reloaded");
                Ok(())
            }
            Err(e) => {
                error!(target: "lifeline_sched", error = %e, "failed to reload configuration");
                Err(e.context("failed to reload configuration"))
            }
        }
    }
}
