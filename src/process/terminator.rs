// src/process/terminator.rs

//! Kill protocol for managed processes.
//!
//! Strictly ordered:
//! 1. Already exited: deregister, done (no signal sent).
//! 2. SIGTERM to the process tree, wait `term_grace`.
//! 3. Still alive: SIGKILL to the tree, wait `kill_grace`.
//! 4. Still alive: evict the registry entry anyway. The OS process may
//!    outlive the tracker at this point.
//!
//! Tree signalling goes through [`ProcessGroup`]; if there is no pid or the
//! group signal fails, the child handle is signalled directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::process::group::{KillSignal, ProcessGroup};
use crate::process::tracker::{ManagedProcess, ProcessTracker};

/// Wait windows between escalation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub term_grace: Duration,
    pub kill_grace: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            term_grace: Duration::from_millis(800),
            kill_grace: Duration::from_millis(2500),
        }
    }
}

impl From<&ManagerConfig> for EscalationPolicy {
    fn from(cfg: &ManagerConfig) -> Self {
        Self {
            term_grace: cfg.term_grace(),
            kill_grace: cfg.kill_grace(),
        }
    }
}

/// How a kill sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had already exited; no signal was sent.
    AlreadyExited,
    /// Exited within the SIGTERM window.
    Terminated,
    /// Exited within the SIGKILL window.
    Killed,
    /// Never observed exiting; the entry was evicted regardless.
    Evicted,
}

#[derive(Debug, Clone)]
pub struct Terminator {
    group: Arc<dyn ProcessGroup>,
    policy: EscalationPolicy,
}

impl Terminator {
    pub fn new(group: Arc<dyn ProcessGroup>, policy: EscalationPolicy) -> Self {
        Self { group, policy }
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    /// Run the full escalation for `process` and deregister it.
    pub async fn terminate(
        &self,
        tracker: &ProcessTracker,
        process: &ManagedProcess,
    ) -> TerminationOutcome {
        let key = process.key();
        let generation = process.generation();

        if process.has_exited() {
            debug!(key, generation, "process already exited; deregistering");
            tracker.remove_if(key, generation);
            return TerminationOutcome::AlreadyExited;
        }

        process.mark_stopping();
        info!(key, generation, pid = ?process.pid(), "sending SIGTERM to process tree");
        self.deliver(process, KillSignal::Terminate);
        if process.wait_exit(self.policy.term_grace).await {
            tracker.remove_if(key, generation);
            return TerminationOutcome::Terminated;
        }

        warn!(
            key,
            generation,
            grace_ms = self.policy.term_grace.as_millis() as u64,
            "process ignored SIGTERM; sending SIGKILL"
        );
        self.deliver(process, KillSignal::Kill);
        if process.wait_exit(self.policy.kill_grace).await {
            tracker.remove_if(key, generation);
            return TerminationOutcome::Killed;
        }

        warn!(
            key,
            generation,
            pid = ?process.pid(),
            "process did not exit after SIGKILL; evicting tracker entry"
        );
        tracker.remove_if(key, generation);
        TerminationOutcome::Evicted
    }

    /// Send one signal to the process tree, falling back to the handle.
    ///
    /// Failures are logged and swallowed: the usual cause is a process that
    /// exited between the liveness check and the signal.
    pub fn deliver(&self, process: &ManagedProcess, signal: KillSignal) {
        let Some(pid) = process.pid() else {
            debug!(key = process.key(), ?signal, "no pid; signalling handle directly");
            process.signal_direct(signal);
            return;
        };

        if let Err(err) = self.group.signal_tree(pid, signal) {
            debug!(
                key = process.key(),
                pid,
                ?signal,
                error = %err,
                "tree signal failed; signalling handle directly"
            );
            if !process.signal_direct(signal) {
                debug!(key = process.key(), pid, "driver already finished; nothing to signal");
            }
        }
    }
}
