use crate::snapshot::ProcessLister;
use lifeline_common::ProcessSnapshot;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Usage error: `guard` was called without a unit of work.
    #[error("missing required block of work")]
    MissingWork,

    /// Environment error: the listing was unavailable or empty.
    #[error("no process data available")]
    NoProcessData,

    /// Environment error: the calling pid is not in the snapshot.
    #[error("could not find own process (pid {pid}) among processes: {entries}")]
    SelfNotFound { pid: u32, entries: String },
}

impl GuardError {
    pub fn is_usage(&self) -> bool {
        matches!(self, GuardError::MissingWork)
    }

    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            GuardError::NoProcessData | GuardError::SelfNotFound { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No other process runs the same command.
    Proceed,
    /// At least one other pid runs exactly `command`.
    AlreadyRunning { command: String, others: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    Executed(T),
    SkippedDuplicate { pid: u32, others: Vec<u32> },
}

impl<T> GuardOutcome<T> {
    pub fn is_executed(&self) -> bool {
        matches!(self, GuardOutcome::Executed(_))
    }

    pub fn into_executed(self) -> Option<T> {
        match self {
            GuardOutcome::Executed(value) => Some(value),
            GuardOutcome::SkippedDuplicate { .. } => None,
        }
    }
}

/// Decides whether `pid` is the only process running its command.
pub fn decide(snapshot: Option<&ProcessSnapshot>, pid: u32) -> Result<GuardDecision, GuardError> {
    let snapshot = match snapshot {
        Some(s) if !s.is_empty() => s,
        _ => return Err(GuardError::NoProcessData),
    };

    let me = snapshot.find_pid(pid).ok_or_else(|| GuardError::SelfNotFound {
        pid,
        entries: snapshot.to_string(),
    })?;

    let others: Vec<u32> = snapshot.command_twins(me).map(|e| e.pid).collect();
    if others.is_empty() {
        Ok(GuardDecision::Proceed)
    } else {
        Ok(GuardDecision::AlreadyRunning {
            command: me.command.clone(),
            others,
        })
    }
}

/// Runs work only when no other process shares the caller's command line.
///
/// Stateless between calls: every `guard` takes a fresh snapshot. The
/// exclusion is best-effort, two processes started close enough together
/// may both see themselves as unique.
#[derive(Debug, Clone)]
pub struct LifelineGuard<L> {
    lister: L,
    pid: u32,
}

impl<L: ProcessLister> LifelineGuard<L> {
    pub fn new(lister: L, pid: u32) -> Self {
        Self { lister, pid }
    }

    pub fn for_current_process(lister: L) -> Self {
        Self::new(lister, std::process::id())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn decide(&self) -> Result<GuardDecision, GuardError> {
        let snapshot = self.lister.snapshot();
        decide(snapshot.as_ref(), self.pid)
    }

    /// Runs `work` once if this process is unique.
    ///
    /// Errors returned by `work` come back untouched; guard failures are
    /// converted through `E: From<GuardError>`.
    pub fn guard<F, T, E>(&self, work: Option<F>) -> Result<GuardOutcome<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<GuardError>,
    {
        let work = work.ok_or(GuardError::MissingWork)?;

        let decision = self.decide().inspect_err(|e| {
            error!(target: "lifeline_guard", pid = self.pid, lister = %self.lister.name(), error = %e, "guard cannot proceed");
        })?;

        match decision {
            GuardDecision::Proceed => {
                debug!(target: "lifeline_guard", pid = self.pid, "no duplicate found, running work");
                work().map(GuardOutcome::Executed)
            }
            GuardDecision::AlreadyRunning { command, others } => {
                info!(target: "lifeline_guard", pid = self.pid, command = %command, others = ?others, "another instance is already running, skipping");
                Ok(GuardOutcome::SkippedDuplicate {
                    pid: self.pid,
                    others,
                })
            }
        }
    }
}
