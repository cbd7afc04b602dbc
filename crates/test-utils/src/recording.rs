use std::sync::{Arc, Mutex};
use std::time::Duration;

use scriptrun::errors::{Result, ScriptError};
use scriptrun::process::{KillSignal, ProcessGroup};
use scriptrun::{EventSink, ScriptEvent};
use tokio::sync::Notify;

/// An event sink that records every `(key, event)` pair in publish order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, ScriptEvent)>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<(String, ScriptEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, key: &str) -> Vec<ScriptEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Commands announced via `command-start` for `key`, in order.
    pub fn started_commands(&self, key: &str) -> Vec<String> {
        self.events_for(key)
            .into_iter()
            .filter_map(|e| match e {
                ScriptEvent::CommandStart { command } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Concatenated `output` data for `key`.
    pub fn output_for(&self, key: &str) -> String {
        self.events_for(key)
            .into_iter()
            .filter_map(|e| match e {
                ScriptEvent::Output { data } => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Wait until `key` has received a `done` or `error` event, returning it.
    pub async fn wait_for_terminal(&self, key: &str, within: Duration) -> Option<ScriptEvent> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.events_for(key).into_iter().find(|e| e.is_terminal()) {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Wait until the concatenated output for `key` contains `needle`.
    pub async fn wait_for_output(&self, key: &str, needle: &str, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let notified = self.notify.notified();
            if self.output_for(key).contains(needle) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, key: &str, event: &ScriptEvent) {
        self.events
            .lock()
            .unwrap()
            .push((key.to_string(), event.clone()));
        self.notify.notify_waiters();
    }
}

/// A fake `ProcessGroup` that records every signal instead of sending it.
///
/// With `failing()` every tree signal errors, which forces the terminator
/// onto its direct-handle fallback.
#[derive(Debug, Default)]
pub struct RecordingGroup {
    signals: Mutex<Vec<(u32, KillSignal)>>,
    fail: bool,
}

impl RecordingGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            signals: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn signals(&self) -> Vec<(u32, KillSignal)> {
        self.signals.lock().unwrap().clone()
    }
}

impl ProcessGroup for RecordingGroup {
    fn signal_tree(&self, pid: u32, signal: KillSignal) -> Result<()> {
        self.signals.lock().unwrap().push((pid, signal));
        if self.fail {
            return Err(ScriptError::Signal {
                pid,
                reason: "tree signalling disabled in test".to_string(),
            });
        }
        Ok(())
    }
}
