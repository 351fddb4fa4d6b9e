// src/scheduler.rs

use crate::config::JobConfig;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How a scheduled tick starts a lifeline task.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    base_args: Vec<String>,
}

impl Launcher {
    /// Launches `<program> <base_args..>` for every tick, without a task name.
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Launches `lifeline --config <path> run-task <task>` with the running binary.
    pub fn current_exe(config_path: &Path) -> Result<Self> {
        let program = std::env::current_exe().context("cannot locate the lifeline executable")?;
        Ok(Self::new(
            program,
            vec![
                "--config".to_string(),
                config_path.display().to_string(),
                "run-task".to_string(),
            ],
        ))
    }

    fn command_for(&self, task: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg(task)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        cmd
    }

    /// Starts the child and hands it to a task that waits for it.
    pub fn launch(&self, task: &str) -> Result<u32> {
        let mut child = self
            .command_for(task)
            .spawn()
            .with_context(|| format!("failed to launch {}", task))?;
        let pid = child.id().unwrap_or_default();
        let task_name = task.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(target: "lifeline_sched", task = %task_name, pid, "launched task finished")
                }
                Ok(status) => {
                    warn!(target: "lifeline_sched", task = %task_name, pid, status = %status, "launched task failed")
                }
                Err(e) => {
                    error!(target: "lifeline_sched", task = %task_name, pid, error = %e, "failed to wait for launched task")
                }
            }
        });
        Ok(pid)
    }
}

struct JobTicker {
    namespace: String,
    interval_secs: u64,
    launcher: Launcher,
}

impl JobTicker {
    async fn run(self) {
        let task = format!("{}:lifeline", self.namespace);
        let period = Duration::from_secs(self.interval_secs);
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(target: "lifeline_sched", task = %task, interval_secs = self.interval_secs, "ticker started");
        loop {
            interval.tick().await;
            match self.launcher.launch(&task) {
                Ok(pid) => debug!(target: "lifeline_sched", task = %task, pid, "launched"),
                Err(e) => error!(target: "lifeline_sched", task = %task, error = %e, "launch failed"),
            }
        }
    }
}

struct RunningTicker {
    interval_secs: u64,
    handle: JoinHandle<()>,
}

/// Keeps one ticker per scheduled, enabled job.
pub struct Scheduler {
    launcher: Launcher,
    running: HashMap<String, RunningTicker>,
}

impl Scheduler {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            running: HashMap::new(),
        }
    }

    /// Starts, restarts and stops tickers so they match `jobs`.
    pub async fn reconcile(&mut self, jobs: &[JobConfig]) -> Result<()> {
        info!(target: "lifeline_sched", "reconciling scheduled jobs");
        let desired: HashMap<String, u64> = jobs
            .iter()
            .filter(|j| j.enabled)
            .filter_map(|j| {
                j.schedule
                    .as_ref()
                    .map(|s| (j.namespace.clone(), s.interval_secs))
            })
            .collect();

        let to_stop: Vec<String> = self
            .running
            .iter()
            .filter(|(name, ticker)| desired.get(*name) != Some(&ticker.interval_secs))
            .map(|(name, _)| name.clone())
            .collect();
        for name in to_stop {
            if let Some(ticker) = self.running.remove(&name) {
                info!(target: "lifeline_sched", namespace = %name, "stopping ticker");
                ticker.handle.abort();
            }
        }

        for (name, interval_secs) in desired {
            let should_start = match self.running.get(&name) {
                Some(ticker) => ticker.handle.is_finished(),
                None => true,
            };
            if should_start {
                let ticker = JobTicker {
                    namespace: name.clone(),
                    interval_secs,
                    launcher: self.launcher.clone(),
                };
                let handle = tokio::spawn(ticker.run());
                self.running.insert(
                    name,
                    RunningTicker {
                        interval_secs,
                        handle,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn running_job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.running.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn shutdown(&mut self) {
        info!(target: "lifeline_sched", "shutting down tickers");
        for (name, ticker) in self.running.drain() {
            ticker.handle.abort();
            if time::timeout(Duration::from_secs(2), ticker.handle)
                .await
                .is_err()
            {
                warn!(target: "lifeline_sched", namespace = %name, "ticker did not stop within timeout");
            }
        }
    }
}
