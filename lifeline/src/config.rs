use crate::daemon_handler::DaemonConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// Top-level configuration

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub log_directory: Option<PathBuf>,
    pub pid_file_directory: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub listing: ListingSource,
    pub terminate_marker: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    #[default]
    Ps,
    Sysinfo,
}

#[derive(Deserialize, Debug, Clone)]
pub struct JobConfig {
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    pub run_as_user: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

impl JobConfig {
    pub fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Run {}", self.command))
    }
}

impl AppConfig {
    pub fn load_from_file(config_file_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_file_path)
            .with_context(|| format!("failed to read {}", config_file_path.display()))?;
        Self::from_yaml(&config_content)
            .with_context(|| format!("invalid configuration in {}", config_file_path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let loaded_config: AppConfig = serde_yaml::from_str(content)?;
        loaded_config.validate()?;
        Ok(loaded_config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.namespace.trim().is_empty() {
                bail!("job namespace must not be empty");
            }
            if job.namespace.contains(':') {
                bail!("job namespace '{}' must not contain ':'", job.namespace);
            }
            if !seen.insert(job.namespace.as_str()) {
                bail!("job namespace '{}' is defined twice", job.namespace);
            }
            if job.command.trim().is_empty() {
                bail!("job '{}' has an empty command", job.namespace);
            }
            if let Some(schedule) = &job.schedule {
                if schedule.interval_secs == 0 {
                    bail!("job '{}' has a zero schedule interval", job.namespace);
                }
            }
        }
        Ok(())
    }

    pub fn get_job(&self, namespace: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.namespace == namespace)
    }

    pub fn enabled_jobs(&self) -> impl Iterator<Item = &JobConfig> {
        self.jobs.iter().filter(|j| j.enabled)
    }

    pub fn to_daemonize_config(&self) -> DaemonConfig {
        DaemonConfig {
            pid_file: self
                .pid_file_directory
                .as_ref()
                .map(|dir| dir.join("lifeline.pid"))
                .unwrap_or_else(|| PathBuf::from("/tmp/lifeline.pid")),
            log_directory: self
                .log_directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("/tmp/lifeline")),
            working_dir: self
                .working_directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}
