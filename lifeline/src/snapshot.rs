// src/snapshot.rs

use lifeline_common::{ProcessEntry, ProcessSnapshot};
use std::process::{Command, Stdio};
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, RefreshKind, System, UpdateKind};
use tracing::{debug, warn};

use crate::config::ListingSource;

/// Source of process table snapshots.
///
/// `None` means the listing facility could not be reached at all, which is
/// different from a listing that returned zero processes.
pub trait ProcessLister: Send + Sync {
    fn snapshot(&self) -> Option<ProcessSnapshot>;

    fn name(&self) -> String;
}

impl<L: ProcessLister + ?Sized> ProcessLister for Arc<L> {
    fn snapshot(&self) -> Option<ProcessSnapshot> {
        (**self).snapshot()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Shells out to `ps` and parses its output.
#[derive(Debug, Clone)]
pub struct PsLister {
    program: String,
    args: Vec<String>,
}

impl Default for PsLister {
    fn default() -> Self {
        Self {
            program: "ps".to_string(),
            args: vec!["-eo".to_string(), "pid=,args=".to_string()],
        }
    }
}

impl PsLister {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ProcessLister for PsLister {
    fn snapshot(&self) -> Option<ProcessSnapshot> {
        let output = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(target: "lifeline_guard", program = %self.program, error = %e, "process listing unavailable");
                return None;
            }
        };

        if output.stdout.is_empty() && !output.status.success() {
            warn!(target: "lifeline_guard", program = %self.program, status = %output.status, "process listing returned nothing");
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let snapshot = ProcessSnapshot::parse(&text);
        debug!(target: "lifeline_guard", lister = "ps", entries = snapshot.len(), "captured process snapshot");
        Some(snapshot)
    }

    fn name(&self) -> String {
        self.program.clone()
    }
}

/// Reads the process table through `sysinfo` instead of spawning `ps`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoLister;

impl ProcessLister for SysinfoLister {
    fn snapshot(&self) -> Option<ProcessSnapshot> {
        let process_kind = ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always);
        let rk = RefreshKind::nothing().with_processes(process_kind);
        let sys = System::new_with_specifics(rk);

        let mut rows: Vec<(u32, String)> = sys
            .processes()
            .values()
            // Threads carry their parent's command line and would look like twins.
            .filter(|p| p.thread_kind().is_none())
            .map(|p| {
                let cmd = command_line(p.cmd().iter().map(|part| part.to_string_lossy()));
                let command = if cmd.trim().is_empty() {
                    command_line(std::iter::once(p.name().to_string_lossy()))
                } else {
                    cmd
                };
                (p.pid().as_u32(), command)
            })
            .collect();
        rows.sort_by_key(|(pid, _)| *pid);

        // Same text contract as `ps`, so both sources normalise identically.
        let listing = rows
            .iter()
            .map(|(pid, command)| format!("{pid} {command}"))
            .collect::<Vec<_>>()
            .join("\n");
        let snapshot = ProcessSnapshot::parse(&listing);
        debug!(target: "lifeline_guard", lister = "sysinfo", entries = snapshot.len(), "captured process snapshot");
        Some(snapshot)
    }

    fn name(&self) -> String {
        "sysinfo".to_string()
    }
}

/// Joins argv into one listing line. Control characters become spaces so an
/// argument can never start a row of its own.
fn command_line<'a>(parts: impl Iterator<Item = std::borrow::Cow<'a, str>>) -> String {
    parts
        .map(|part| part.replace(|c: char| c.is_control(), " "))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canned snapshot, used by tests and by callers embedding the guard.
#[derive(Debug, Clone, Default)]
pub struct FixedLister {
    snapshot: Option<ProcessSnapshot>,
}

impl FixedLister {
    pub fn new(entries: Vec<ProcessEntry>) -> Self {
        Self {
            snapshot: Some(ProcessSnapshot::new(entries)),
        }
    }

    /// A listing facility that never answers.
    pub fn unavailable() -> Self {
        Self { snapshot: None }
    }

    pub fn from_listing(listing: &str) -> Self {
        Self {
            snapshot: Some(ProcessSnapshot::parse(listing)),
        }
    }
}

impl ProcessLister for FixedLister {
    fn snapshot(&self) -> Option<ProcessSnapshot> {
        self.snapshot.clone()
    }

    fn name(&self) -> String {
        "fixed".to_string()
    }
}

pub fn lister_for(source: ListingSource) -> Arc<dyn ProcessLister> {
    match source {
        ListingSource::Ps => Arc::new(PsLister::default()),
        ListingSource::Sysinfo => Arc::new(SysinfoLister),
    }
}
