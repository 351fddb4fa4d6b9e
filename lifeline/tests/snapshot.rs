use lifeline::snapshot::{FixedLister, ProcessLister, PsLister, SysinfoLister};
use lifeline::ProcessEntry;

#[test]
fn missing_listing_program_yields_none() {
    let lister = PsLister::new("/nonexistent/definitely-not-ps", vec![]);
    assert!(lister.snapshot().is_none());
}

#[test]
fn failing_listing_without_output_yields_none() {
    let lister = PsLister::new("sh", vec!["-c".into(), "exit 3".into()]);
    assert!(lister.snapshot().is_none());
}

#[test]
fn successful_empty_listing_is_empty_not_none() {
    let lister = PsLister::new("true", vec![]);
    let snapshot = lister.snapshot().unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn listing_output_is_parsed_in_order() {
    let lister = PsLister::new(
        "printf",
        vec!["  PID COMMAND\n   12 cron -f\n    7 sshd: listener \nbogus\n".into()],
    );
    let snapshot = lister.snapshot().unwrap();
    assert_eq!(
        snapshot.entries(),
        &[
            ProcessEntry::new(12, "cron -f"),
            ProcessEntry::new(7, "sshd: listener"),
        ]
    );
}

#[test]
fn sysinfo_sees_the_current_process() {
    let snapshot = SysinfoLister.snapshot().unwrap();
    let me = snapshot
        .find_pid(std::process::id())
        .expect("own pid should be listed");
    assert!(!me.command.is_empty());
}

#[test]
fn fixed_lister_returns_its_snapshot() {
    let lister = FixedLister::from_listing("1 init\n");
    assert_eq!(lister.snapshot().unwrap().len(), 1);
    assert!(FixedLister::unavailable().snapshot().is_none());
    assert_eq!(lister.name(), "fixed");
}

#[test]
fn sysinfo_keeps_multiline_arguments_on_one_row() {
    let mut child = std::process::Command::new("sh")
        .args(["-c", "sleep 30; exit 0", "sh", "x\n42 foo"])
        .spawn()
        .unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    let entry = loop {
        let snapshot = SysinfoLister.snapshot().unwrap();
        match snapshot.find_pid(child.id()) {
            Some(e) if e.command.contains("exit 0") => break e.clone(),
            _ if std::time::Instant::now() > deadline => panic!("child never showed up"),
            _ => std::thread::sleep(std::time::Duration::from_millis(50)),
        }
    };
    let snapshot = SysinfoLister.snapshot().unwrap();
    child.kill().unwrap();
    child.wait().unwrap();

    assert!(entry.command.ends_with("x 42 foo"), "{:?}", entry.command);
    assert!(snapshot.entries().iter().all(|e| e.command != "foo"));
}
