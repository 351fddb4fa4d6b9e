use crate::binder::{BoundTasks, TaskBinder};
use crate::config::{AppConfig, JobConfig};
use crate::registry::TaskRegistry;
use crate::snapshot::lister_for;
use crate::terminate::{default_marker, SignalTerminator};
use anyhow::{anyhow, bail, Context, Result};
use nix::unistd::{setpgid, Pid};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};
use users::get_user_by_name;

/// Makes the calling process the leader of a new process group.
///
/// Job commands inherit the group, so terminating the group stops them
/// together with the lifeline process. Fails for session leaders, which
/// already lead their group.
pub fn lead_process_group() {
    match setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
        Ok(()) => debug!(target: "lifeline_task", pid = std::process::id(), "leading own process group"),
        Err(e) => debug!(target: "lifeline_task", error = %e, "could not start a process group"),
    }
}

/// Runs `program` in the foreground and waits for it.
pub fn run_program(
    program: &str,
    args: &[String],
    working_dir: Option<&Path>,
    run_as_user: Option<&str>,
) -> Result<ExitStatus> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    if let Some(username) = run_as_user {
        let user =
            get_user_by_name(username).ok_or_else(|| anyhow!("user '{}' not found", username))?;
        command.uid(user.uid());
        command.gid(user.primary_group_id());
        info!(target: "lifeline_task", program = %program, user = %username, uid = %user.uid(), "dropping privileges for job");
    }

    debug!(target: "lifeline_task", program = %program, args = ?args, "spawning job command");
    command
        .status()
        .with_context(|| format!("failed to start '{}'", program))
}

/// Body for `<namespace>:run` of a configured job.
pub fn run_job(job: &JobConfig) -> Result<()> {
    let status = run_program(
        &job.command,
        &job.args,
        job.working_dir.as_deref(),
        job.run_as_user.as_deref(),
    )?;
    if status.success() {
        info!(target: "lifeline_task", namespace = %job.namespace, "job finished");
        Ok(())
    } else {
        warn!(target: "lifeline_task", namespace = %job.namespace, status = %status, "job failed");
        bail!("job '{}' exited with {}", job.namespace, status)
    }
}

/// Builds the task registry for every enabled job in `config`.
pub fn registry_from_config(config: &AppConfig) -> Result<(TaskRegistry, Vec<BoundTasks>)> {
    let lister = lister_for(config.listing);
    let marker = config
        .terminate_marker
        .clone()
        .unwrap_or_else(default_marker);
    let terminator = Arc::new(SignalTerminator::new(Arc::clone(&lister), marker));
    let binder = TaskBinder::new(lister, terminator);

    let mut registry = TaskRegistry::new();
    let mut bound = Vec::new();
    for job in config.enabled_jobs() {
        let job_for_body = job.clone();
        let tasks = binder.bind(
            &mut registry,
            &job.namespace,
            &job.description(),
            job.prerequisites.clone(),
            move |_: &TaskRegistry| run_job(&job_for_body),
        )?;
        bound.push(tasks);
    }
    Ok((registry, bound))
}
