// src/exec/persistent.rs

//! Persistent runner: one long-lived background process per key.

use std::fmt;
use std::path::Path;

use tracing::{debug, error, info};

use crate::manager::ScriptManager;
use crate::parse::{join_commands, parse_commands};
use crate::types::{EnvMap, ScriptEvent};

/// Returned by [`ScriptManager::run_persistent`].
#[derive(Clone)]
pub struct PersistentHandle {
    manager: ScriptManager,
    key: String,
    pid: Option<u32>,
    generation: Option<u64>,
}

impl fmt::Debug for PersistentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentHandle")
            .field("key", &self.key)
            .field("pid", &self.pid)
            .field("generation", &self.generation)
            .finish()
    }
}

impl PersistentHandle {
    /// OS pid of the shell process, if one was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the kill protocol for this process.
    ///
    /// Returns `false` if there is nothing to kill: no process was spawned,
    /// it is no longer tracked, or the key now belongs to a newer process
    /// (which is left alone).
    pub async fn kill(&self) -> bool {
        match self.generation {
            Some(generation) => self.manager.kill_generation(&self.key, generation).await,
            None => false,
        }
    }
}

impl ScriptManager {
    /// Start `scripts` as a single background process under `key`.
    ///
    /// Commands are joined with `&&`, so the shell stops at the first
    /// failure. Any process already registered under `key` is fully
    /// terminated before the new one is spawned. On POSIX the process leads
    /// its own process group so its whole tree can be signalled.
    ///
    /// Output streams as `output` events. When the process exits on its own,
    /// exit code 0 emits `done` and anything else emits `error`. A process
    /// that was killed or replaced emits nothing further.
    pub async fn run_persistent<S: AsRef<str>>(
        &self,
        scripts: &[S],
        cwd: &Path,
        key: &str,
        extra_env: Option<&EnvMap>,
    ) -> PersistentHandle {
        let commands = parse_commands(scripts);
        let mut handle = PersistentHandle {
            manager: self.clone(),
            key: key.to_string(),
            pid: None,
            generation: None,
        };

        if commands.is_empty() {
            debug!(key, "no commands for persistent run");
            self.publish(key, ScriptEvent::Done);
            return handle;
        }

        let line = join_commands(&commands);
        info!(key, command = %line, "starting persistent process");

        let tracked = match self
            .spawn_tracked(key, &line, cwd, extra_env, cfg!(unix))
            .await
        {
            Ok(tracked) => tracked,
            Err(err) => {
                error!(key, error = %err, "failed to start persistent process");
                self.publish(
                    key,
                    ScriptEvent::Error {
                        command: None,
                        exit_code: Some(1),
                    },
                );
                return handle;
            }
        };

        handle.pid = tracked.process.pid();
        handle.generation = Some(tracked.process.generation());

        let manager = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let exit = tracked.wait().await;
            if exit.evicted {
                debug!(key = %key, "persistent process was stopped externally; no terminal event");
                return;
            }

            let event = if exit.info.success() {
                ScriptEvent::Done
            } else {
                ScriptEvent::Error {
                    command: None,
                    exit_code: exit.info.code,
                }
            };
            manager.publish(&key, event);
        });

        handle
    }
}
