// src/manager.rs

//! [`ScriptManager`]: the entry point callers construct and share.
//!
//! It owns the process tracker, the terminator and the event sink. The three
//! runners live in `exec::{sequential, persistent, capture}` as further
//! `impl ScriptManager` blocks; this file holds construction, spawning under
//! a key, and the kill operations.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::errors::Result;
use crate::exec::driver::{Driver, ProcessExit};
use crate::exec::shell::spawn_shell;
use crate::process::{
    EscalationPolicy, KillSignal, ManagedProcess, ProcessGroup, ProcessTracker, Terminator,
    platform_group,
};
use crate::relay::EventSink;
use crate::types::{EnvMap, ExitInfo, ScriptEvent};

/// Capture-and-wait timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Per-command timeout when the caller passes none.
    pub default_timeout: Duration,
    /// SIGTERM -> SIGKILL window once a command timed out.
    pub kill_grace: Duration,
}

impl From<&ManagerConfig> for CapturePolicy {
    fn from(cfg: &ManagerConfig) -> Self {
        Self {
            default_timeout: cfg.capture_timeout(),
            kill_grace: cfg.capture_kill_grace(),
        }
    }
}

pub(crate) struct ManagerInner {
    pub tracker: Arc<ProcessTracker>,
    pub terminator: Terminator,
    pub sink: Arc<dyn EventSink>,
    pub capture: CapturePolicy,
}

/// Runs scripts for execution keys and manages their processes.
///
/// Cheap to clone; clones share the same registry and sink.
#[derive(Clone)]
pub struct ScriptManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl fmt::Debug for ScriptManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptManager")
            .field("tracked", &self.inner.tracker.keys())
            .field("escalation", &self.inner.terminator.policy())
            .field("capture", &self.inner.capture)
            .finish_non_exhaustive()
    }
}

/// A process registered under a key, plus the task driving it.
pub(crate) struct TrackedChild {
    pub process: ManagedProcess,
    pub driver: JoinHandle<ProcessExit>,
}

impl TrackedChild {
    /// Wait for the driver to finish. A panicked driver counts as exit code 1.
    pub async fn wait(self) -> ProcessExit {
        match self.driver.await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(key = self.process.key(), error = %e, "process driver task failed");
                ProcessExit {
                    info: ExitInfo::failure(),
                    evicted: false,
                }
            }
        }
    }
}

impl ScriptManager {
    /// Manager using the platform's process-group implementation.
    pub fn new(config: &ManagerConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::with_process_group(config, sink, platform_group())
    }

    pub fn with_process_group(
        config: &ManagerConfig,
        sink: Arc<dyn EventSink>,
        group: Arc<dyn ProcessGroup>,
    ) -> Self {
        let terminator = Terminator::new(group, EscalationPolicy::from(config));
        Self {
            inner: Arc::new(ManagerInner {
                tracker: Arc::new(ProcessTracker::new()),
                terminator,
                sink,
                capture: CapturePolicy::from(config),
            }),
        }
    }

    pub fn tracker(&self) -> &ProcessTracker {
        &self.inner.tracker
    }

    pub(crate) fn publish(&self, key: &str, event: ScriptEvent) {
        self.inner.sink.publish(key, &event);
    }

    /// Spawn `command` as the one live process for `key`.
    ///
    /// Any process already registered under `key` is terminated first. The
    /// check, kill, spawn and register steps run under the key's lock, so
    /// concurrent callers on one key cannot interleave them.
    pub(crate) async fn spawn_tracked(
        &self,
        key: &str,
        command: &str,
        cwd: &Path,
        extra_env: Option<&EnvMap>,
        detached: bool,
    ) -> Result<TrackedChild> {
        let tracker = &self.inner.tracker;
        let lock = tracker.key_lock(key);
        let spawned = {
            let _guard = lock.lock().await;
            self.replace_and_spawn(key, command, cwd, extra_env, detached)
                .await
        };
        tracker.release_key_lock(key, lock);
        spawned
    }

    async fn replace_and_spawn(
        &self,
        key: &str,
        command: &str,
        cwd: &Path,
        extra_env: Option<&EnvMap>,
        detached: bool,
    ) -> Result<TrackedChild> {
        let tracker = &self.inner.tracker;
        if let Some(existing) = tracker.get(key) {
            info!(
                key,
                generation = existing.generation(),
                "key already has a process; terminating it before spawning"
            );
            self.inner.terminator.terminate(tracker, &existing).await;
        }

        let child = spawn_shell(command, cwd, extra_env, detached)?;

        let generation = tracker.next_generation();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();
        let process = ManagedProcess::new(key, generation, child.id(), exit_rx, direct_tx);

        // Register before the driver starts forwarding anything.
        tracker.register(process.clone());
        debug!(key, generation, pid = ?process.pid(), "registered process");

        let driver = Driver {
            process: process.clone(),
            tracker: Arc::clone(tracker),
            sink: Arc::clone(&self.inner.sink),
        };
        let driver = tokio::spawn(driver.run(child, direct_rx, exit_tx));

        Ok(TrackedChild { process, driver })
    }

    /// Stop the process tracked under `key` (SIGTERM, then SIGKILL, then
    /// eviction). Returns `false` only if nothing was tracked for `key`.
    pub async fn kill_process(&self, key: &str) -> bool {
        self.kill_matching(key, None).await
    }

    /// Like [`kill_process`](Self::kill_process), but only if `key` is still
    /// held by `generation`.
    pub(crate) async fn kill_generation(&self, key: &str, generation: u64) -> bool {
        self.kill_matching(key, Some(generation)).await
    }

    async fn kill_matching(&self, key: &str, generation: Option<u64>) -> bool {
        let tracker = &self.inner.tracker;
        let lock = tracker.key_lock(key);
        let killed = {
            let _guard = lock.lock().await;
            self.kill_locked(key, generation).await
        };
        tracker.release_key_lock(key, lock);
        killed
    }

    async fn kill_locked(&self, key: &str, generation: Option<u64>) -> bool {
        let tracker = &self.inner.tracker;
        let Some(process) = tracker.get(key) else {
            debug!(key, "kill requested but no process is tracked");
            return false;
        };

        if generation.is_some_and(|g| g != process.generation()) {
            debug!(key, "kill requested for a process that has since been replaced");
            return false;
        }

        let outcome = self.inner.terminator.terminate(tracker, &process).await;
        info!(key, ?outcome, "kill sequence finished");
        true
    }

    /// Shutdown path: SIGTERM every tracked process and clear the registry.
    ///
    /// Does not wait for exit and does not escalate to SIGKILL.
    pub fn kill_all(&self) {
        let drained = self.inner.tracker.drain();
        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "terminating all tracked processes");
        for process in &drained {
            process.mark_stopping();
            self.inner.terminator.deliver(process, KillSignal::Terminate);
        }
    }
}
