use lifeline::config::{AppConfig, JobConfig};
use lifeline::scheduler::{Launcher, Scheduler};
use tempfile::TempDir;
use tokio::time::{sleep, Duration};

fn jobs(yaml: &str) -> Vec<JobConfig> {
    AppConfig::from_yaml(yaml).expect("valid config").jobs
}

#[tokio::test]
async fn reconcile_starts_and_stops_tickers() {
    let mut scheduler = Scheduler::new(Launcher::new("/bin/true", vec![]));

    let initial = jobs(
        "jobs:
  - namespace: backup
    command: /bin/true
    schedule: { interval_secs: 60 }
  - namespace: report
    command: /bin/true
    schedule: { interval_secs: 60 }
  - namespace: manual
    command: /bin/true
  - namespace: disabled
    command: /bin/true
    enabled: false
    schedule: { interval_secs: 60 }
",
    );
    scheduler
        .reconcile(&initial)
        .await
        .expect("initial reconcile should succeed");
    assert_eq!(
        scheduler.running_job_names(),
        vec!["backup".to_string(), "report".to_string()],
        "only enabled jobs with a schedule get a ticker"
    );

    let updated = jobs(
        "jobs:
  - namespace: report
    command: /bin/true
    schedule: { interval_secs: 30 }
",
    );
    scheduler
        .reconcile(&updated)
        .await
        .expect("second reconcile should succeed");
    assert_eq!(scheduler.running_job_names(), vec!["report".to_string()]);

    scheduler.shutdown().await;
    assert!(scheduler.running_job_names().is_empty());
}

#[tokio::test]
async fn ticker_launches_lifeline_task() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let marker = dir.path().join("ticks.log");
    let script = format!("echo \"$1\" >> {}", marker.display());
    let launcher = Launcher::new("/bin/sh", vec!["-c".into(), script, "sh".into()]);
    let mut scheduler = Scheduler::new(launcher);

    scheduler
        .reconcile(&jobs(
            "jobs:
  - namespace: backup
    command: /bin/true
    schedule: { interval_secs: 1 }
",
        ))
        .await?;

    sleep(Duration::from_millis(2600)).await;
    scheduler.shutdown().await;

    let content = std::fs::read_to_string(&marker)?;
    let lines: Vec<&str> = content.lines().collect();
    assert!(!lines.is_empty(), "ticker should have launched at least once");
    assert!(lines.iter().all(|l| *l == "backup:lifeline"), "{content}");
    Ok(())
}
