use crate::{
    config::AppConfig,
    config_manager::ConfigManager,
    scheduler::{Launcher, Scheduler},
    signal_handler::{SignalEvent, SignalHandler},
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info};

/// Runs the scheduler on its own tokio runtime until SIGINT/SIGTERM.
pub fn async_runtime(app_config: Arc<RwLock<AppConfig>>, config_path: PathBuf) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("lifeline")
        .build()?;

    rt.block_on(scheduler_core_logic(app_config, config_path))
}

async fn scheduler_core_logic(config: Arc<RwLock<AppConfig>>, config_path: PathBuf) -> Result<()> {
    info!(target: "lifeline_sched", "scheduler starting");

    let mut signals = SignalHandler::new()?;
    let launcher = Launcher::current_exe(&config_path)?;
    let config_manager = ConfigManager::new(Arc::clone(&config), config_path);
    let mut scheduler = Scheduler::new(launcher);

    {
        let config_guard = config.read().await;
        scheduler.reconcile(&config_guard.jobs).await?;
    }
    info!(target: "lifeline_sched", jobs = ?scheduler.running_job_names(), "initial reconciliation completed");

    loop {
        match signals.next().await {
            SignalEvent::ConfigReload => {
                if let Err(e) = config_manager.reload_config().await {
                    error!(target: "lifeline_sched", error = %e, "keeping previous configuration");
                    continue;
                }
                let config_guard = config.read().await;
                if let Err(e) = scheduler.reconcile(&config_guard.jobs).await {
                    error!(target: "lifeline_sched", error = %e, "failed to reconcile scheduled jobs");
                }
            }
            SignalEvent::Shutdown => break,
        }
    }

    scheduler.shutdown().await;
    info!(target: "lifeline_sched", "scheduler stopped");
    Ok(())
}
