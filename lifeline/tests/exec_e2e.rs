use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn lifeline_exec(script: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lifeline"));
    cmd.args(["exec", "--listing", "sysinfo", "--", "/bin/sh", "-c", script]);
    cmd.env("RUST_LOG", "info");
    cmd
}

fn line_count(path: &std::path::Path) -> usize {
    std::fs::read_to_string(path)
        .map(|c| c.lines().count())
        .unwrap_or(0)
}

fn wait_for_lines(path: &std::path::Path, n: usize, timeout: Duration) {
    let start = Instant::now();
    while line_count(path) < n && start.elapsed() < timeout {
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn second_identical_exec_is_skipped() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let marker = dir.path().join("runs.log");
    let script = format!("echo run >> {}; sleep 3", marker.display());

    let first = lifeline_exec(&script).spawn()?;
    wait_for_lines(&marker, 1, Duration::from_secs(5));
    assert_eq!(line_count(&marker), 1, "first instance should be running");

    let started = Instant::now();
    let second: Output = lifeline_exec(&script).output()?;
    assert!(second.status.success(), "skip is not an error: {second:?}");
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "second instance should return without running the job"
    );
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("already running"), "{stderr}");

    let first = first.wait_with_output()?;
    assert!(first.status.success());
    assert_eq!(line_count(&marker), 1);
    Ok(())
}

#[test]
fn different_arguments_are_not_duplicates() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let marker = dir.path().join("runs.log");
    let script_a = format!("echo a >> {}; sleep 2", marker.display());
    let script_b = format!("echo b >> {}; sleep 2", marker.display());

    let first = lifeline_exec(&script_a).spawn()?;
    wait_for_lines(&marker, 1, Duration::from_secs(5));
    let second = lifeline_exec(&script_b).output()?;
    assert!(second.status.success());

    first.wait_with_output()?;
    assert_eq!(line_count(&marker), 2);
    Ok(())
}

#[test]
fn exit_status_of_program_is_mirrored() -> anyhow::Result<()> {
    let output = lifeline_exec("exit 7").output()?;
    assert_eq!(output.status.code(), Some(7));
    Ok(())
}

#[test]
fn run_task_with_unknown_name_fails() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = dir.path().join("lifeline.yaml");
    std::fs::write(&config, "listing: sysinfo\njobs:\n  - namespace: demo\n    command: /bin/true\n")?;

    let ok = Command::new(env!("CARGO_BIN_EXE_lifeline"))
        .args(["--config", config.to_str().unwrap(), "run-task", "demo:lifeline"])
        .output()?;
    assert!(ok.status.success(), "{ok:?}");

    let bad = Command::new(env!("CARGO_BIN_EXE_lifeline"))
        .args(["--config", config.to_str().unwrap(), "run-task", "demo:nope"])
        .output()?;
    assert_eq!(bad.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&bad.stderr).contains("unknown task 'demo:nope'"));
    Ok(())
}
