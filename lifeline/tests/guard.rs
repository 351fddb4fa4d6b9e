use anyhow::anyhow;
use lifeline::guard::{decide, GuardDecision, GuardError, GuardOutcome, LifelineGuard};
use lifeline::snapshot::FixedLister;
use lifeline::{ProcessEntry, ProcessSnapshot};
use std::cell::Cell;

fn entry(pid: u32, command: &str) -> ProcessEntry {
    ProcessEntry::new(pid, command)
}

fn guard_with(entries: Vec<ProcessEntry>, pid: u32) -> LifelineGuard<FixedLister> {
    LifelineGuard::new(FixedLister::new(entries), pid)
}

type NoWork = fn() -> anyhow::Result<()>;

#[test]
fn single_instance_runs_work_once() {
    let calls = Cell::new(0);
    let guard = guard_with(vec![entry(10, "job")], 10);

    let outcome = guard
        .guard(Some(|| -> anyhow::Result<&str> {
            calls.set(calls.get() + 1);
            Ok("done")
        }))
        .unwrap();

    assert_eq!(outcome, GuardOutcome::Executed("done"));
    assert_eq!(calls.get(), 1);
}

#[test]
fn duplicate_command_skips_without_error() {
    let calls = Cell::new(0);
    let guard = guard_with(vec![entry(10, "job"), entry(11, "job")], 10);

    let outcome = guard
        .guard(Some(|| -> anyhow::Result<()> {
            calls.set(calls.get() + 1);
            Ok(())
        }))
        .unwrap();

    assert_eq!(
        outcome,
        GuardOutcome::SkippedDuplicate {
            pid: 10,
            others: vec![11]
        }
    );
    assert!(!outcome.is_executed());
    assert_eq!(calls.get(), 0);
}

#[test]
fn unavailable_listing_is_an_environment_error() {
    let calls = Cell::new(0);
    let guard = LifelineGuard::new(FixedLister::unavailable(), 10);

    let err = guard
        .guard(Some(|| -> Result<(), GuardError> {
            calls.set(calls.get() + 1);
            Ok(())
        }))
        .unwrap_err();

    assert_eq!(err, GuardError::NoProcessData);
    assert!(err.is_environment());
    assert_eq!(calls.get(), 0);
}

#[test]
fn empty_listing_is_an_environment_error() {
    let guard = LifelineGuard::new(FixedLister::from_listing("  PID COMMAND\n"), 10);
    let err = guard
        .guard(Some(|| -> Result<(), GuardError> { panic!("work must not run") }))
        .unwrap_err();
    assert_eq!(err, GuardError::NoProcessData);
}

#[test]
fn self_not_found_reports_pid_and_entries() {
    let calls = Cell::new(0);
    let guard = guard_with(vec![entry(99, "other")], 10);

    let err = guard
        .guard(Some(|| -> Result<(), GuardError> {
            calls.set(calls.get() + 1);
            Ok(())
        }))
        .unwrap_err();

    assert!(err.is_environment());
    match &err {
        GuardError::SelfNotFound { pid, entries } => {
            assert_eq!(*pid, 10);
            assert!(entries.contains("99"));
            assert!(entries.contains("other"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("pid 10"), "{message}");
    assert!(message.contains("other"), "{message}");
    assert_eq!(calls.get(), 0);
}

#[test]
fn missing_work_is_a_usage_error_regardless_of_table() {
    for lister in [
        FixedLister::unavailable(),
        FixedLister::new(vec![]),
        FixedLister::new(vec![entry(10, "job")]),
        FixedLister::new(vec![entry(10, "job"), entry(11, "job")]),
    ] {
        let guard = LifelineGuard::new(lister, 10);
        let err = guard.guard::<NoWork, (), anyhow::Error>(None).unwrap_err();
        let guard_err = err.downcast_ref::<GuardError>().unwrap();
        assert_eq!(*guard_err, GuardError::MissingWork);
        assert!(guard_err.is_usage());
        assert_eq!(err.to_string(), "missing required block of work");
    }
}

#[test]
fn work_errors_propagate_unchanged() {
    #[derive(Debug, PartialEq)]
    enum JobError {
        Guard(GuardError),
        Broken(&'static str),
    }
    impl From<GuardError> for JobError {
        fn from(e: GuardError) -> Self {
            JobError::Guard(e)
        }
    }

    let guard = guard_with(vec![entry(10, "job")], 10);
    let err = guard
        .guard(Some(|| -> Result<(), JobError> { Err(JobError::Broken("disk full")) }))
        .unwrap_err();
    assert_eq!(err, JobError::Broken("disk full"));

    let err = guard
        .guard(Some(|| -> anyhow::Result<()> { Err(anyhow!("boom")) }))
        .unwrap_err();
    assert_eq!(format!("{err:#}"), "boom");
}

#[test]
fn arguments_are_part_of_the_command() {
    let guard = guard_with(
        vec![
            entry(10, "lifeline run-task backup:lifeline"),
            entry(11, "lifeline run-task report:lifeline"),
            entry(12, "lifeline run-task backup:lifeline --verbose"),
        ],
        10,
    );
    assert_eq!(guard.decide(), Ok(GuardDecision::Proceed));
}

#[test]
fn first_matching_pid_is_self() {
    // A recycled pid shows up twice; only the first row counts as self.
    let snapshot = ProcessSnapshot::new(vec![
        entry(10, "job"),
        entry(10, "stale"),
        entry(11, "stale"),
    ]);
    assert_eq!(decide(Some(&snapshot), 10), Ok(GuardDecision::Proceed));
}

#[test]
fn decide_lists_every_twin() {
    let snapshot = ProcessSnapshot::parse("10 job\n11 job\n12 other\n13 job\n");
    assert_eq!(
        decide(Some(&snapshot), 11),
        Ok(GuardDecision::AlreadyRunning {
            command: "job".to_string(),
            others: vec![10, 13],
        })
    );
    assert_eq!(decide(None, 11), Err(GuardError::NoProcessData));
}

#[test]
fn current_process_guard_uses_own_pid() {
    let me = std::process::id();
    let guard = LifelineGuard::for_current_process(FixedLister::new(vec![entry(me, "me")]));
    assert_eq!(guard.pid(), me);
    let outcome = guard
        .guard(Some(|| -> anyhow::Result<u32> { Ok(7) }))
        .unwrap();
    assert_eq!(outcome.into_executed(), Some(7));
}
