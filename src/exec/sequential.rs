// src/exec/sequential.rs

//! Sequential runner: one command at a time, halt on first failure.

use std::path::Path;

use tracing::{info, warn};

use crate::manager::ScriptManager;
use crate::parse::parse_commands;
use crate::types::{EnvMap, ExitInfo, RunOutcome, ScriptEvent};

impl ScriptManager {
    /// Run every parsed command under `key`, in order, streaming events.
    ///
    /// Emits `command-start` before each command and `output` while it runs.
    /// The first failing command produces an `error` event and ends the run;
    /// later commands are not started. A command that cannot be spawned is
    /// reported as exit code 1. If everything succeeds (including an empty
    /// command list), `done` is emitted.
    pub async fn run_sequential<S: AsRef<str>>(
        &self,
        scripts: &[S],
        cwd: &Path,
        key: &str,
        extra_env: Option<&EnvMap>,
    ) -> RunOutcome {
        let commands = parse_commands(scripts);
        info!(key, count = commands.len(), "starting sequential run");

        for command in &commands {
            self.publish(
                key,
                ScriptEvent::CommandStart {
                    command: command.clone(),
                },
            );

            let exit = match self.spawn_tracked(key, command, cwd, extra_env, false).await {
                Ok(tracked) => tracked.wait().await.info,
                Err(err) => {
                    warn!(key, error = %err, "spawn failed; reporting exit code 1");
                    ExitInfo::failure()
                }
            };

            if !exit.success() {
                self.publish(
                    key,
                    ScriptEvent::Error {
                        command: Some(command.clone()),
                        exit_code: exit.code,
                    },
                );
                let error = exit.to_error(command);
                info!(key, error = %error, "sequential run halted");
                return RunOutcome::failed(error);
            }
        }

        self.publish(key, ScriptEvent::Done);
        info!(key, "sequential run finished");
        RunOutcome::ok()
    }
}
