//! Forceful termination of running lifeline instances.
//!
//! Candidates are found by plain substring matching on the command line, so
//! this stays independent of the uniqueness decision made by the guard.
//! `run-task` and `exec` put themselves in their own process group (see
//! [`crate::job::lead_process_group`]), which is what lets a kill take the
//! running job command down too.

use crate::snapshot::ProcessLister;
use anyhow::{anyhow, Result};
use lifeline_common::{ProcessEntry, ProcessSnapshot};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, Pid};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub trait Terminator: Send + Sync {
    /// Kills every process belonging to `scope` and reports what happened.
    fn terminate(&self, scope: &str) -> Result<TerminateReport>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillResult {
    Killed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedProcess {
    pub pid: u32,
    pub command: String,
    pub result: KillResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateReport {
    pub scope: String,
    pub processes: Vec<TerminatedProcess>,
}

impl fmt::Display for TerminateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.processes.is_empty() {
            return write!(f, "no running process matched '{}'", self.scope);
        }
        for (i, p) in self.processes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match &p.result {
                KillResult::Killed => write!(f, "killed {} ({})", p.pid, p.command)?,
                KillResult::Failed(e) => {
                    write!(f, "failed to kill {} ({}): {}", p.pid, p.command, e)?
                }
            }
        }
        Ok(())
    }
}

/// File name of the running executable, used to recognise our own runtime.
pub fn default_marker() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

pub struct SignalTerminator {
    lister: Arc<dyn ProcessLister>,
    marker: String,
    self_pid: u32,
    signal: Signal,
}

impl SignalTerminator {
    pub fn new(lister: Arc<dyn ProcessLister>, marker: impl Into<String>) -> Self {
        Self {
            lister,
            marker: marker.into(),
            self_pid: std::process::id(),
            signal: Signal::SIGKILL,
        }
    }

    pub fn with_self_pid(mut self, pid: u32) -> Self {
        self.self_pid = pid;
        self
    }

    /// Processes whose command mentions both `scope` and the runtime marker.
    pub fn candidates(&self, snapshot: &ProcessSnapshot, scope: &str) -> Vec<ProcessEntry> {
        snapshot
            .entries()
            .iter()
            .filter(|e| e.pid != self.self_pid)
            .filter(|e| e.command.contains(scope) && e.command.contains(&self.marker))
            .cloned()
            .collect()
    }

    /// Signals the whole process group when `pid` leads one, so the job
    /// command it is waiting on dies with it. Our own group is never hit.
    fn send(&self, pid: u32) -> KillResult {
        let raw = match i32::try_from(pid) {
            Ok(raw) => raw,
            Err(_) => return KillResult::Failed(format!("pid {pid} out of range")),
        };
        let target = Pid::from_raw(raw);
        let own_group = getpgid(None).ok();
        let sent = match getpgid(Some(target)) {
            Ok(pgid) if pgid == target && Some(pgid) != own_group => {
                debug!(target: "lifeline_task", pgid = raw, "signalling process group");
                killpg(pgid, self.signal)
            }
            _ => kill(target, self.signal),
        };
        match sent {
            Ok(()) => KillResult::Killed,
            Err(errno) => KillResult::Failed(errno.to_string()),
        }
    }
}

impl Terminator for SignalTerminator {
    fn terminate(&self, scope: &str) -> Result<TerminateReport> {
        let snapshot = self
            .lister
            .snapshot()
            .ok_or_else(|| anyhow!("no process data available to locate '{}'", scope))?;

        let processes = self
            .candidates(&snapshot, scope)
            .into_iter()
            .map(|entry| {
                let result = self.send(entry.pid);
                match &result {
                    KillResult::Killed => {
                        info!(target: "lifeline_task", scope = %scope, pid = entry.pid, signal = %self.signal, "sent termination signal")
                    }
                    KillResult::Failed(e) => {
                        warn!(target: "lifeline_task", scope = %scope, pid = entry.pid, error = %e, "failed to signal process")
                    }
                }
                TerminatedProcess {
                    pid: entry.pid,
                    command: entry.command,
                    result,
                }
            })
            .collect();

        Ok(TerminateReport {
            scope: scope.to_string(),
            processes,
        })
    }
}
