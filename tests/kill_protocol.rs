// tests/kill_protocol.rs
#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scriptrun::ScriptManager;
use scriptrun::process::{
    EscalationPolicy, KillSignal, ManagedProcess, ProcessTracker, TerminationOutcome, Terminator,
};
use scriptrun::types::ExitInfo;
use scriptrun_test_utils::builders::ConfigBuilder;
use scriptrun_test_utils::{init_tracing, with_timeout};
use scriptrun_test_utils::recording::{RecordingGroup, RecordingSink};
use tokio::sync::{mpsc, watch};

type TestResult = Result<(), Box<dyn Error>>;

const WAIT: Duration = Duration::from_secs(5);

fn fast_policy() -> EscalationPolicy {
    EscalationPolicy {
        term_grace: Duration::from_millis(50),
        kill_grace: Duration::from_millis(100),
    }
}

async fn wait_until_tracked(manager: &ScriptManager, key: &str) {
    with_timeout(async {
        while !manager.tracker().contains(key) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[test]
fn default_windows_are_800ms_and_2500ms() {
    let policy = EscalationPolicy::default();
    assert_eq!(policy.term_grace, Duration::from_millis(800));
    assert_eq!(policy.kill_grace, Duration::from_millis(2500));

    let from_config = EscalationPolicy::from(&ConfigBuilder::new().build());
    assert_eq!(from_config, policy);
}

#[tokio::test]
async fn unknown_key_returns_false() {
    init_tracing();
    let manager = ScriptManager::new(&ConfigBuilder::fast().build(), RecordingSink::new());
    assert!(!manager.kill_process("nobody").await);
}

#[tokio::test]
async fn already_exited_process_is_deregistered_without_signals() {
    init_tracing();
    let group = RecordingGroup::new();
    let terminator = Terminator::new(group.clone(), fast_policy());
    let tracker = ProcessTracker::new();

    let (_exit_tx, exit_rx) = watch::channel(Some(ExitInfo {
        code: Some(0),
        signal: None,
    }));
    let (direct_tx, _direct_rx) = mpsc::unbounded_channel();
    let process = ManagedProcess::new("done", tracker.next_generation(), Some(4242), exit_rx, direct_tx);
    tracker.register(process.clone());

    let outcome = terminator.terminate(&tracker, &process).await;

    assert_eq!(outcome, TerminationOutcome::AlreadyExited);
    assert!(group.signals().is_empty());
    assert!(!tracker.contains("done"));
}

#[tokio::test]
async fn unresponsive_process_escalates_then_is_evicted() {
    init_tracing();
    let group = RecordingGroup::new();
    let terminator = Terminator::new(group.clone(), fast_policy());
    let tracker = ProcessTracker::new();

    // The exit sender is kept alive but never fires: the process never
    // appears to exit.
    let (_exit_tx, exit_rx) = watch::channel(None);
    let (direct_tx, _direct_rx) = mpsc::unbounded_channel();
    let process = ManagedProcess::new("stuck", tracker.next_generation(), Some(4242), exit_rx, direct_tx);
    tracker.register(process.clone());

    let started = Instant::now();
    let outcome = terminator.terminate(&tracker, &process).await;

    assert_eq!(outcome, TerminationOutcome::Evicted);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(
        group.signals(),
        vec![(4242, KillSignal::Terminate), (4242, KillSignal::Kill)]
    );
    assert!(!tracker.contains("stuck"));
}

#[tokio::test]
async fn eviction_does_not_touch_a_newer_generation() {
    init_tracing();
    let terminator = Terminator::new(RecordingGroup::new(), fast_policy());
    let tracker = ProcessTracker::new();

    let (_old_tx, old_rx) = watch::channel(None);
    let (old_direct, _old_direct_rx) = mpsc::unbounded_channel();
    let old = ManagedProcess::new("slot", tracker.next_generation(), Some(1), old_rx, old_direct);

    let (_new_tx, new_rx) = watch::channel(None);
    let (new_direct, _new_direct_rx) = mpsc::unbounded_channel();
    let newer = ManagedProcess::new("slot", tracker.next_generation(), Some(2), new_rx, new_direct);
    tracker.register(newer.clone());

    terminator.terminate(&tracker, &old).await;

    assert!(tracker.is_current("slot", newer.generation()));
}

#[tokio::test]
async fn missing_pid_signals_the_handle_directly() {
    init_tracing();
    let group = RecordingGroup::new();
    let terminator = Terminator::new(group.clone(), fast_policy());
    let tracker = ProcessTracker::new();

    let (exit_tx, exit_rx) = watch::channel(None);
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel();
    let process = ManagedProcess::new("nopid", tracker.next_generation(), None, exit_rx, direct_tx);
    tracker.register(process.clone());

    // Stand-in driver: exits as soon as it is asked to terminate.
    tokio::spawn(async move {
        if direct_rx.recv().await == Some(KillSignal::Terminate) {
            let _ = exit_tx.send(Some(ExitInfo {
                code: None,
                signal: Some(15),
            }));
        }
    });

    let outcome = terminator.terminate(&tracker, &process).await;

    assert_eq!(outcome, TerminationOutcome::Terminated);
    assert!(group.signals().is_empty());
    assert!(!tracker.contains("nopid"));
}

#[tokio::test]
async fn persistent_process_is_terminated_and_removed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let manager = ScriptManager::new(&ConfigBuilder::fast().build(), sink.clone());

    let handle = manager
        .run_persistent(&["echo listening; sleep 30"], dir.path(), "k3", None)
        .await;
    assert!(sink.wait_for_output("k3", "listening", WAIT).await);
    assert_eq!(manager.tracker().pid_of("k3"), handle.pid());

    let started = Instant::now();
    assert!(manager.kill_process("k3").await);

    // SIGTERM is honoured, so no SIGKILL window is needed.
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert!(!manager.tracker().contains("k3"));
    assert!(!manager.kill_process("k3").await);
    Ok(())
}

#[tokio::test]
async fn sigterm_ignoring_process_is_force_killed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let config = ConfigBuilder::new().term_grace_ms(200).kill_grace_ms(2000).build();
    let manager = ScriptManager::new(&config, sink.clone());

    manager
        .run_persistent(&["trap '' TERM; echo armed; sleep 30"], dir.path(), "stubborn", None)
        .await;
    assert!(sink.wait_for_output("stubborn", "armed", WAIT).await);

    let started = Instant::now();
    assert!(manager.kill_process("stubborn").await);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "SIGKILL sent too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2000), "SIGKILL not observed: {elapsed:?}");
    assert!(!manager.tracker().contains("stubborn"));
    Ok(())
}

#[tokio::test]
async fn failing_tree_signal_falls_back_to_the_child_handle() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let group = RecordingGroup::failing();
    let manager =
        ScriptManager::with_process_group(&ConfigBuilder::fast().build(), sink.clone(), group.clone());

    let run = {
        let manager = manager.clone();
        let cwd = dir.path().to_path_buf();
        tokio::spawn(async move { manager.run_sequential(&["sleep 30"], &cwd, "seq", None).await })
    };
    wait_until_tracked(&manager, "seq").await;
    let pid = manager.tracker().pid_of("seq");

    assert!(manager.kill_process("seq").await);
    let outcome = with_timeout(run).await?;

    assert!(!outcome.success);
    let signals = group.signals();
    assert_eq!(signals.first().map(|(p, s)| (Some(*p), *s)), Some((pid, KillSignal::Terminate)));
    Ok(())
}

#[tokio::test]
async fn kill_all_signals_everything_and_clears_the_registry() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let group = RecordingGroup::new();
    let manager =
        ScriptManager::with_process_group(&ConfigBuilder::fast().build(), sink.clone(), group.clone());

    let a = manager.run_persistent(&["sleep 30"], dir.path(), "a", None).await;
    let b = manager.run_persistent(&["sleep 30"], dir.path(), "b", None).await;
    assert_eq!(manager.tracker().keys(), vec!["a".to_string(), "b".to_string()]);

    let started = Instant::now();
    manager.kill_all();

    assert!(started.elapsed() < Duration::from_millis(100), "kill_all must not wait");
    assert!(manager.tracker().is_empty());

    let mut signals = group.signals();
    signals.sort_by_key(|(pid, _)| *pid);
    let mut expected = vec![
        (a.pid().unwrap_or_default(), KillSignal::Terminate),
        (b.pid().unwrap_or_default(), KillSignal::Terminate),
    ];
    expected.sort_by_key(|(pid, _)| *pid);
    assert_eq!(signals, expected);

    // The recording group sent nothing real; clean up for good measure.
    for pid in [a.pid(), b.pid()].into_iter().flatten() {
        let _ = std::process::Command::new("kill").arg(pid.to_string()).status();
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_kills_on_one_key_are_serialised() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let manager = Arc::new(ScriptManager::new(&ConfigBuilder::fast().build(), RecordingSink::new()));

    manager.run_persistent(&["sleep 30"], dir.path(), "twice", None).await;

    let (first, second) = tokio::join!(manager.kill_process("twice"), manager.kill_process("twice"));

    // Exactly one caller found the process.
    assert!(first ^ second);
    assert!(manager.tracker().is_empty());
    assert_eq!(manager.tracker().key_lock_count(), 0);
    Ok(())
}

#[tokio::test]
async fn key_locks_are_released_after_use() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let manager = ScriptManager::new(&ConfigBuilder::fast().build(), RecordingSink::new());

    for i in 0..20 {
        let key = format!("checkout-{i}");
        manager.run_sequential(&["true"], dir.path(), &key, None).await;
        assert!(!manager.kill_process(&key).await);
    }

    assert_eq!(manager.tracker().key_lock_count(), 0);
    Ok(())
}

#[test]
fn held_key_lock_survives_release_by_another_caller() {
    let tracker = ProcessTracker::new();
    let held = tracker.key_lock("k");
    let other = tracker.key_lock("k");

    tracker.release_key_lock("k", other);
    assert_eq!(tracker.key_lock_count(), 1);
    assert!(Arc::ptr_eq(&held, &tracker.key_lock("k")));
}
