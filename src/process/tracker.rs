// src/process/tracker.rs

//! Keyed registry of live managed processes.
//!
//! Invariant: at most one [`ManagedProcess`] per execution key. Entries are
//! inserted right after spawn (before any output is forwarded) and removed
//! exactly once, by whichever comes first of:
//! - the process driver observing exit,
//! - a completed kill sequence,
//! - forced eviction after an unresponsive kill.
//!
//! Every entry carries a generation number. Removal is conditional on the
//! generation, so a late exit handler of a replaced process can never evict
//! its successor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::process::group::KillSignal;
use crate::types::{ExecutionKey, ExitInfo};

/// Handle to a child process owned by a driver task.
///
/// Cloning is cheap; all clones observe the same exit state.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    key: ExecutionKey,
    generation: u64,
    pid: Option<u32>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    direct_tx: mpsc::UnboundedSender<KillSignal>,
    stopping: Arc<AtomicBool>,
}

impl ManagedProcess {
    pub fn new(
        key: impl Into<ExecutionKey>,
        generation: u64,
        pid: Option<u32>,
        exit_rx: watch::Receiver<Option<ExitInfo>>,
        direct_tx: mpsc::UnboundedSender<KillSignal>,
    ) -> Self {
        Self {
            key: key.into(),
            generation,
            pid,
            exit_rx,
            direct_tx,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit information, once the driver has observed it.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// True once exit was observed, or once the owning driver is gone.
    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some() || self.exit_rx.has_changed().is_err()
    }

    /// Wait up to `within` for the process to exit. Returns whether it did.
    pub async fn wait_exit(&self, within: Duration) -> bool {
        let mut rx = self.exit_rx.clone();
        match timeout(within, rx.wait_for(|exit| exit.is_some())).await {
            Ok(Ok(_)) => true,
            // Driver dropped its sender: nothing owns the child any more.
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }

    /// Record that a kill sequence has started for this process.
    pub fn mark_stopping(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Whether a kill sequence was ever started for this process.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Ask the driver to signal the child handle directly (no tree).
    ///
    /// Returns false if the driver has already finished.
    pub fn signal_direct(&self, signal: KillSignal) -> bool {
        self.direct_tx.send(signal).is_ok()
    }
}

/// Registry of managed processes, one per execution key.
#[derive(Debug, Default)]
pub struct ProcessTracker {
    entries: Mutex<HashMap<ExecutionKey, ManagedProcess>>,
    key_locks: Mutex<HashMap<ExecutionKey, Arc<tokio::sync::Mutex<()>>>>,
    next_generation: AtomicU64,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ExecutionKey, ManagedProcess>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Async lock serialising check-kill-spawn-register sequences per key.
    pub fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the lock for `key` once no caller holds or awaits it.
    ///
    /// A later [`key_lock`](Self::key_lock) simply creates a fresh one, so the
    /// map only holds locks for keys that are in use.
    pub fn release_key_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    /// Number of per-key locks currently allocated.
    pub fn key_lock_count(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Insert `process` under its key, returning whatever it displaced.
    pub fn register(&self, process: ManagedProcess) -> Option<ManagedProcess> {
        self.entries().insert(process.key.clone(), process)
    }

    pub fn get(&self, key: &str) -> Option<ManagedProcess> {
        self.entries().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn pid_of(&self, key: &str) -> Option<u32> {
        self.entries().get(key).and_then(ManagedProcess::pid)
    }

    /// Whether `generation` is still the registered process for `key`.
    pub fn is_current(&self, key: &str, generation: u64) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|p| p.generation == generation)
    }

    /// Remove the entry for `key` only if it is still `generation`.
    pub fn remove_if(&self, key: &str, generation: u64) -> bool {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(p) if p.generation == generation => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Empty the registry, returning every entry that was in it.
    pub fn drain(&self) -> Vec<ManagedProcess> {
        self.entries().drain().map(|(_, p)| p).collect()
    }

    pub fn keys(&self) -> Vec<ExecutionKey> {
        let mut keys: Vec<_> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
